use crate::error::{Error, Result};
use ndarray as nd;

/// Axis-angle rotation per joint plus a global translation
#[derive(Clone, Debug)]
pub struct Pose {
    pub joint_poses: nd::Array2<f32>,
    pub global_trans: nd::Array1<f32>,
}
impl Pose {
    pub fn new(joint_poses: nd::Array2<f32>, global_trans: nd::Array1<f32>) -> Self {
        Self { joint_poses, global_trans }
    }
    pub fn new_empty(num_joints: usize) -> Self {
        Self {
            joint_poses: nd::Array2::<f32>::zeros((num_joints, 3)),
            global_trans: nd::Array1::<f32>::zeros(3),
        }
    }
    /// Builds a pose from the flat `[j0x, j0y, j0z, j1x, ...]` layout used by
    /// annotation stores, with zero translation
    pub fn from_flat(pose: &nd::Array1<f32>) -> Result<Self> {
        if pose.is_empty() || pose.len() % 3 != 0 {
            return Err(Error::schema(format!("pose of length {} is not a list of axis-angle triplets", pose.len())));
        }
        let joint_poses = pose
            .to_owned()
            .into_shape_with_order((pose.len() / 3, 3))
            .map_err(|e| Error::schema(format!("cannot reshape pose: {e}")))?;
        Ok(Self::new(joint_poses, nd::Array1::<f32>::zeros(3)))
    }
    pub fn num_active_joints(&self) -> usize {
        self.joint_poses.nrows()
    }
}
