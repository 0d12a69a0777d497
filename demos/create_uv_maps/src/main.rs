use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use uvmap_core::{pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "Poses the body model for the first annotated samples, aligns it to their keypoints and writes meshes, colored point clouds and UV position maps")]
struct Args {
    /// TOML run configuration. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Directory holding the annotation store and the images it references
    #[arg(long)]
    root_dir: Option<PathBuf>,
    /// Body model archive (.npz) with the LSP landmark regressor
    #[arg(short, long)]
    model: Option<PathBuf>,
    /// Where outputs are written
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Number of samples to process
    #[arg(short = 'n', long)]
    case_num: Option<usize>,
    /// Side length of the UV position map
    #[arg(short, long)]
    resolution: Option<u32>,
    /// Also paint meshes and keypoints over the source images
    #[arg(long)]
    visualize: bool,
}

impl Args {
    fn into_config(self) -> uvmap_core::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(root_dir) = self.root_dir {
            config.root_dir = root_dir;
        }
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(case_num) = self.case_num {
            config.case_num = case_num;
        }
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        config.visualize |= self.visualize;
        Ok(config)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let result = args.into_config().and_then(|config| {
        info!("Running with {config:?}");
        pipeline::run(&config)
    });
    match result {
        Ok(summary) => info!("Wrote {} files to {}", summary.files().len(), summary.output_dir.display()),
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    }
}
