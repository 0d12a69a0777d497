use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for one data preparation run. Every field has a default so a
/// config file only needs to name what differs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the annotation store and the images it references
    pub root_dir: PathBuf,
    /// Store file name inside ``root_dir``
    pub annotation: String,
    /// Body model archive with the lsp landmark regressor
    pub model_path: PathBuf,
    /// Where meshes, point clouds and images are written
    pub output_dir: PathBuf,
    /// Rows read from every store field
    pub max_items: Option<usize>,
    /// Samples processed by the run
    pub case_num: usize,
    /// Side length of the uv position map in texels
    pub resolution: u32,
    /// Also paint meshes and joints over the source images
    pub visualize: bool,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("./data/human36m")
}
fn default_annotation() -> String {
    "annotation_large.npz".to_string()
}
fn default_model_path() -> PathBuf {
    PathBuf::from("./model_lsp.npz")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("_test_cache")
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            annotation: default_annotation(),
            model_path: default_model_path(),
            output_dir: default_output_dir(),
            max_items: Some(100),
            case_num: 10,
            resolution: 300,
            visualize: false,
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| crate::error::Error::from_open(e, path))?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn annotation_path(&self) -> PathBuf {
        self.root_dir.join(&self.annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, "root_dir = \"/data/h36m\"\nresolution = 64\n").unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/data/h36m"));
        assert_eq!(config.resolution, 64);
        assert_eq!(config.case_num, 10);
        assert_eq!(config.max_items, Some(100));
        assert_eq!(config.annotation_path(), PathBuf::from("/data/h36m/annotation_large.npz"));
    }

    #[test]
    fn missing_config_file() {
        let result = PipelineConfig::load("nonexistent_config_12345.toml");
        assert!(matches!(result, Err(Error::MissingFile { .. })));
    }

    #[test]
    fn malformed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "case_num = \"ten\"\n").unwrap();
        assert!(matches!(PipelineConfig::load(&path), Err(Error::Config(_))));
    }
}
