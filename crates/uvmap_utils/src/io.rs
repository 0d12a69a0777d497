use std::path::Path;
/// associating a extension with a enum
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, Display)]
pub enum FileType {
    Npz,
    Obj,
    Ply,
    Png,
    Unknown,
}
impl FileType {
    pub fn value(&self) -> &'static [&'static str] {
        match self {
            Self::Npz => &["npz"],
            Self::Obj => &["obj"],
            Self::Ply => &["ply"],
            Self::Png => &["png"],
            Self::Unknown => &[""],
        }
    }
    pub fn find_match(ext: &str) -> Self {
        Self::iter()
            .find(|filetype| filetype.value().contains(&(ext.to_lowercase()).as_str()))
            .unwrap_or(FileType::Unknown)
    }
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(FileType::Unknown, Self::find_match)
    }
    /// Canonical extension written for outputs of this type
    pub fn extension(&self) -> &'static str {
        self.value()[0]
    }
}

/// File name for the ``index``-th sample of an output kind, e.g.
/// ``real_mesh_3.obj``
pub fn indexed_file_name(stem: &str, index: usize, file_type: FileType) -> String {
    format!("{stem}_{index}.{}", file_type.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn matches_extension_case_insensitive() {
        assert_eq!(FileType::find_match("NPZ"), FileType::Npz);
        assert_eq!(FileType::find_match("ply"), FileType::Ply);
        assert_eq!(FileType::find_match("h5"), FileType::Unknown);
        assert_eq!(FileType::from_path(&PathBuf::from("data/annotation.npz")), FileType::Npz);
        assert_eq!(FileType::from_path(&PathBuf::from("no_extension")), FileType::Unknown);
    }

    #[test]
    fn indexed_names() {
        assert_eq!(indexed_file_name("real_mesh", 3, FileType::Obj), "real_mesh_3.obj");
        assert_eq!(indexed_file_name("UV_position_map", 0, FileType::Png), "UV_position_map_0.png");
    }
}
