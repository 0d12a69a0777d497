pub mod npz;
pub mod obj;
pub mod overlay;
pub mod ply;
pub mod png;
