//! End to end run: load annotations, pose and align the body model, export
//! meshes, point clouds and uv position maps for the first samples.

use crate::{
    alignment::procrustes::BatchAlignment,
    codec::{overlay, ply::write_ply, png::save_png},
    common::smpl_model::{MeshModel, SmplLsp},
    config::PipelineConfig,
    dataset::{accessor::AnnotationDataset, mesh_stage::MeshStage},
    error::Result,
    uv::position_map::UvExporter,
};
use log::{debug, info};
use ndarray as nd;
use ndarray::prelude::*;
use std::path::{Path, PathBuf};
use uvmap_utils::io::{indexed_file_name, FileType};

pub const REAL_MESH_STEM: &str = "real_mesh";
pub const COLORED_MESH_STEM: &str = "colored_mesh";
pub const UV_MAP_STEM: &str = "UV_position_map";
pub const RECON_MESH_STEM: &str = "recon_mesh";

/// Files written for one sample
#[derive(Clone, Debug)]
pub struct SampleReport {
    pub index: usize,
    pub real_mesh: PathBuf,
    pub colored_mesh: PathBuf,
    pub uv_map: PathBuf,
    pub recon_mesh: PathBuf,
    /// mean distance between aligned and reconstructed vertices
    pub recon_error: f32,
    pub covered_texels: usize,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub output_dir: PathBuf,
    pub samples: Vec<SampleReport>,
    pub overlays: Vec<PathBuf>,
}

impl RunSummary {
    pub fn files(&self) -> Vec<&Path> {
        self.samples
            .iter()
            .flat_map(|s| [s.real_mesh.as_path(), s.colored_mesh.as_path(), s.uv_map.as_path(), s.recon_mesh.as_path()])
            .chain(self.overlays.iter().map(PathBuf::as_path))
            .collect()
    }

    pub fn mean_recon_error(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.samples.len() as f32;
        Some(self.samples.iter().map(|s| s.recon_error).sum::<f32>() / n)
    }
}

/// Mean euclidean distance between corresponding rows
pub fn mean_vertex_distance(a: &nd::Array2<f32>, b: &nd::Array2<f32>) -> f32 {
    let diff = a - b;
    let dists = diff.map_axis(Axis(1), |row| row.dot(&row).sqrt());
    dists.mean().unwrap_or(0.0)
}

/// Loads the body model named in ``config`` and runs the whole pipeline
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let model = SmplLsp::new_from_npz(&config.model_path)?;
    run_with_model(config, &model)
}

/// Runs the pipeline on samples ``0..case_num`` with any body model whose uv
/// layout covers its mesh
pub fn run_with_model<M: MeshModel>(config: &PipelineConfig, model: &M) -> Result<RunSummary> {
    info!("Reading annotations from {}", config.annotation_path().display());
    let dataset = AnnotationDataset::open(config)?;
    let output_dir = config.output_dir.clone();
    std::fs::create_dir_all(&output_dir)?;
    info!("Processing {} of {} samples into {}", config.case_num, dataset.len(), output_dir.display());

    let records = dataset.get_batch(0..config.case_num)?;
    let batch = MeshStage::new(model).run(records)?;
    let gt2ds: Vec<nd::Array2<f32>> = batch.records.iter().map(|r| r.gt2d.clone()).collect();
    let gt3ds: Vec<nd::Array2<f32>> = batch.records.iter().map(|r| r.gt3d.clone()).collect();
    let alignment = BatchAlignment::fit(&batch.landmarks, &gt2ds, &gt3ds)?;
    let aligned = alignment.apply(&batch.meshes)?;

    let exporter = UvExporter::new(model.uv_layout());
    let mut samples = Vec::with_capacity(batch.len());
    for ((record, verts), transform) in batch.records.iter().zip(&aligned).zip(alignment.transforms()) {
        let i = record.index;
        debug!("sample {i}: aligned with scale {:.3}", transform.scale);
        let out = |stem: &str, file_type: FileType| output_dir.join(indexed_file_name(stem, i, file_type));

        let real_mesh = out(REAL_MESH_STEM, FileType::Obj);
        model.write_obj(verts, &real_mesh)?;

        let map = exporter.position_map(verts, config.resolution)?;
        let colored_mesh = out(COLORED_MESH_STEM, FileType::Ply);
        write_ply(&colored_mesh, verts, &map.vertex_colors)?;
        let uv_map = out(UV_MAP_STEM, FileType::Png);
        save_png(&map.side_by_side(), &uv_map)?;

        let recon = exporter.resample(&map)?;
        let recon_mesh = out(RECON_MESH_STEM, FileType::Obj);
        model.write_obj(&recon, &recon_mesh)?;

        let recon_error = mean_vertex_distance(&recon, verts);
        info!("sample {i}: {} texels covered, reconstruction error {recon_error:.4}", map.num_covered());
        samples.push(SampleReport {
            index: i,
            real_mesh,
            colored_mesh,
            uv_map,
            recon_mesh,
            recon_error,
            covered_texels: map.num_covered(),
        });
    }

    let overlays = if config.visualize {
        let imagenames: Vec<PathBuf> = batch.records.iter().map(|r| r.imagename.clone()).collect();
        let mesh_2d: Vec<nd::Array2<f32>> = aligned.iter().map(|v| v.slice(s![.., 0..2]).to_owned()).collect();
        overlay::visualize(&imagenames, &mesh_2d, &gt2ds, &output_dir)?
    } else {
        Vec::new()
    };

    let summary = RunSummary { output_dir, samples, overlays };
    if let Some(err) = summary.mean_recon_error() {
        info!("Finished {} samples, mean reconstruction error {err:.4}", summary.samples.len());
    }
    Ok(summary)
}
