use ndarray as nd;

/// Result of a forward pass of a body model
#[derive(Clone, Debug)]
pub struct SmplOutput {
    /// posed mesh vertices [``num_verts``, 3]
    pub verts: nd::Array2<f32>,
    /// posed skeleton joints [``num_joints``, 3]
    pub joints: nd::Array2<f32>,
    /// landmarks regressed from the posed mesh [``num_landmarks``, 3]
    pub landmarks: nd::Array2<f32>,
}
