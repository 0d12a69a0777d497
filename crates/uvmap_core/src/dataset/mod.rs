pub mod accessor;
pub mod mesh_stage;
pub mod store;
