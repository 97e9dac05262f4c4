// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every render parameter can be set on the command line; flags override the
//! corresponding value from the config file (if one is present).

use clap::{Parser, ValueEnum};

/// Command-line arguments for `raypatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "raypatch",
    version,
    about = "Build and render an image patch-by-patch through an external pipeline.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Raypatch.toml` in the current working directory. A missing
    /// file is not an error; built-in defaults apply.
    #[arg(long, value_name = "PATH", default_value = "Raypatch.toml")]
    pub config: String,

    /// Width of the final image in pixels.
    #[arg(long, value_name = "N")]
    pub image_width: Option<u32>,

    /// Height of the final image in pixels.
    #[arg(long, value_name = "N")]
    pub image_height: Option<u32>,

    /// Width of each patch in pixels.
    #[arg(long, value_name = "N")]
    pub patch_width: Option<u32>,

    /// Height of each patch in pixels.
    #[arg(long, value_name = "N")]
    pub patch_height: Option<u32>,

    /// Enable compile-time rendering in the configure stage.
    #[arg(long)]
    pub constexpr: bool,

    /// Maximum recursion depth passed to the renderer.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<u32>,

    /// Number of samples per pixel passed to the renderer.
    #[arg(long, value_name = "N")]
    pub num_samples: Option<u32>,

    /// Random seed passed to the renderer.
    ///
    /// If neither this flag nor the config file provides one, a fresh seed is
    /// derived for each run.
    #[arg(long, value_name = "SEED")]
    pub random_seed: Option<u64>,

    /// Maximum number of patch processes running at once.
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Idle timeout for reading one output line from a patch process
    /// (e.g. "1s", "250ms").
    #[arg(long, value_name = "DUR")]
    pub stdout_timeout: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RAYPATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the resolved parameters, grid, and stage commands, but don't
    /// execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
