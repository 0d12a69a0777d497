//! Error types for loading annotations and models, aligning meshes and
//! exporting uv position maps.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure aborts the run; nothing here is recovered locally.
#[derive(Debug, Error)]
pub enum Error {
    /// Annotation store or model archive is absent.
    #[error("file not found: {path}")]
    MissingFile {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Unexpected field layout in a store or model archive.
    #[error("schema error: {0}")]
    Schema(String),

    /// Sample access outside of the dataset.
    #[error("index {index} out of range for dataset of length {len}")]
    Index {
        /// Requested index (or range end).
        index: usize,
        /// Number of samples in the dataset.
        len: usize,
    },

    /// Uv position maps need at least one texel per side.
    #[error("invalid uv resolution: {resolution}")]
    InvalidResolution {
        /// Requested resolution.
        resolution: u32,
    },

    /// Transforms and meshes come from batches of different sizes.
    #[error("batch size mismatch: expected {expected}, got {got}")]
    BatchMismatch {
        /// Number of fitted transforms.
        expected: usize,
        /// Number of meshes supplied.
        got: usize,
    },

    /// Keypoint sets that do not determine a similarity transform.
    #[error("alignment failed: {0}")]
    Alignment(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("npz read error: {0}")]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),

    #[error("npz write error: {0}")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Create a `Schema` error with the given message.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Maps a `NotFound` io error on ``path`` to `MissingFile`.
    pub(crate) fn from_open(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::MissingFile { path: path.to_path_buf() }
        } else {
            Self::Io(err)
        }
    }
}
