// src/config/loader.rs

use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config file at {:?}", path))?;

    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

/// Load a configuration file if it exists, or fall back to built-in defaults.
///
/// The original tool was configured entirely by flags, so a missing config
/// file is the normal case, not an error.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if path.exists() {
        load_from_path(path)
    } else {
        debug!(path = ?path, "no config file found; using built-in defaults");
        Ok(ConfigFile::default())
    }
}

/// Load (or default) a configuration and run semantic validation.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_or_default(&path)?;
    validate_config(&config)?;
    Ok(config)
}
