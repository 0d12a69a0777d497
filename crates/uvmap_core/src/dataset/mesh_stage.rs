use super::accessor::AnnotationRecord;
use crate::{
    common::{betas::Betas, pose::Pose, smpl_model::MeshModel},
    error::Result,
};
use log::debug;
use ndarray as nd;

/// Records together with the meshes posed from their parameters
#[derive(Clone, Debug)]
pub struct PosedBatch {
    pub records: Vec<AnnotationRecord>,
    /// [``num_verts``, 3] per record
    pub meshes: Vec<nd::Array2<f32>>,
    /// [14, 3] per record
    pub landmarks: Vec<nd::Array2<f32>>,
}

impl PosedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Poses the body model with each record's shape and pose, at zero
/// translation. Nothing is cached between runs.
pub struct MeshStage<'a, M: MeshModel> {
    model: &'a M,
}

impl<'a, M: MeshModel> MeshStage<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    pub fn run(&self, records: Vec<AnnotationRecord>) -> Result<PosedBatch> {
        let mut meshes = Vec::with_capacity(records.len());
        let mut landmarks = Vec::with_capacity(records.len());
        for record in &records {
            let betas = Betas::new(record.shape.clone());
            let pose = Pose::from_flat(&record.pose)?;
            let output = self.model.forward(&betas, &pose)?;
            debug!(
                "posed sample {} from {} joint rotations, {} vertices",
                record.index,
                pose.num_active_joints(),
                output.verts.nrows()
            );
            meshes.push(output.verts);
            landmarks.push(output.landmarks);
        }
        Ok(PosedBatch { records, meshes, landmarks })
    }
}
