//! ## Crate Items Overview
//!
//! Data preparation for uv position map learning: annotated samples are
//! posed with a body model, aligned to their ground truth keypoints and
//! rasterized into uv space.
//!
//! ### Modules
//! - [`dataset`](crate::dataset) - Annotation store, per sample access and the mesh stage.
//! - [`common`](crate::common) - Body model, shape and pose parameters.
//! - [`alignment`](crate::alignment) - Similarity fit of meshes to keypoints.
//! - [`uv`](crate::uv) - Uv layout, position map export and resampling.
//! - [`codec`](crate::codec) - Npz reading, OBJ/PLY/PNG writing and debug overlays.
//! - [`pipeline`](crate::pipeline) - The end to end run.

pub mod alignment;
pub mod codec;
pub mod common;
pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod uv;

pub use config::PipelineConfig;
pub use error::{Error, Result};
