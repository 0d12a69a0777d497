pub mod betas;
pub mod metadata;
pub mod outputs;
pub mod pose;
pub mod smpl_model;
