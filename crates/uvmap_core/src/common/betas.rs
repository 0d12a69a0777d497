use ndarray as nd;

/// Smpl betas or shape parameters
#[derive(Clone, Debug)]
pub struct Betas {
    pub betas: nd::Array1<f32>,
}
impl Default for Betas {
    fn default() -> Self {
        Self::new_empty(super::metadata::SHAPE_SPACE_DIM)
    }
}

impl Betas {
    pub fn new(betas: nd::Array1<f32>) -> Self {
        Self { betas }
    }

    pub fn new_empty(num_betas: usize) -> Self {
        let betas = ndarray::Array1::<f32>::zeros(num_betas);
        Self { betas }
    }
}
