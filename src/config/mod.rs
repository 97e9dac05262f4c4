// src/config/mod.rs

//! Configuration loading and validation for raypatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model and the resolved run parameters
//!   (`model.rs`).
//! - Load a config file from disk, falling back to defaults (`loader.rs`).
//! - Validate basic invariants like nonzero dimensions (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, LimitsSection, OutputSection, Parameters, RenderSection, StageCommand,
    StageSection, parse_duration,
};
pub use validate::validate_config;
