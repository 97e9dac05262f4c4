// src/errors.rs

//! Crate-wide error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::grid::PatchCoord;
use crate::pipeline::Stage;

#[derive(Error, Debug)]
pub enum RaypatchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{stage} stage failed for patch(es) {failed:?}")]
    StageFailed {
        stage: Stage,
        failed: Vec<PatchCoord>,
    },

    #[error("missing patch output for {patch} at {path:?}")]
    MissingPatchOutput { patch: PatchCoord, path: PathBuf },

    #[error("patch {patch} is {actual:?} pixels, expected {expected:?}")]
    PatchSizeMismatch {
        patch: PatchCoord,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RaypatchError>;
