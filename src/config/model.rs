// src/config/model.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{RaypatchError, Result};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [render]
/// image_width = 600
/// patch_width = 10
///
/// [limits]
/// max_workers = 8
/// stdout_timeout = "1s"
///
/// [stage.run]
/// cmd = "build/patch_{patch_x}_{patch_y}/ray_tracing"
/// ```
///
/// All sections are optional and have defaults matching the stock CMake
/// pipeline, so `raypatch` runs without any config file at all.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    /// Render parameters from `[render]`.
    #[serde(default)]
    pub render: RenderSection,

    /// Concurrency and timeout knobs from `[limits]`.
    #[serde(default)]
    pub limits: LimitsSection,

    /// Per-stage command templates from `[stage.<name>]`.
    #[serde(default)]
    pub stage: StageSection,

    /// Output file locations from `[output]`.
    #[serde(default)]
    pub output: OutputSection,
}

/// `[render]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderSection {
    #[serde(default = "default_image_width")]
    pub image_width: u32,

    #[serde(default = "default_image_height")]
    pub image_height: u32,

    #[serde(default = "default_patch_width")]
    pub patch_width: u32,

    #[serde(default = "default_patch_height")]
    pub patch_height: u32,

    /// Whether the configure stage enables compile-time rendering.
    #[serde(default)]
    pub constexpr: bool,

    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(default = "default_num_samples")]
    pub num_samples: u32,

    /// Seed forwarded to the renderer. When absent, a fresh seed is derived
    /// for each run.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_image_width() -> u32 {
    600
}

fn default_image_height() -> u32 {
    400
}

fn default_patch_width() -> u32 {
    10
}

fn default_patch_height() -> u32 {
    10
}

fn default_max_depth() -> u32 {
    50
}

fn default_num_samples() -> u32 {
    10
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            image_width: default_image_width(),
            image_height: default_image_height(),
            patch_width: default_patch_width(),
            patch_height: default_patch_height(),
            constexpr: false,
            max_depth: default_max_depth(),
            num_samples: default_num_samples(),
            random_seed: None,
        }
    }
}

/// `[limits]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    /// Maximum number of patch processes in flight at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Idle timeout for reading one line from a patch process, as a duration
    /// string (`"250ms"`, `"1s"`, `"2m"`).
    #[serde(default = "default_stdout_timeout")]
    pub stdout_timeout: String,
}

fn default_max_workers() -> usize {
    8
}

fn default_stdout_timeout() -> String {
    "1s".to_string()
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            stdout_timeout: default_stdout_timeout(),
        }
    }
}

/// `[stage.<name>]` sections: one shell command template per pipeline stage.
///
/// Templates are opaque to raypatch; `{placeholder}` markers are substituted
/// with the run parameters and the patch coordinate before execution. See
/// [`crate::pipeline::commands`] for the placeholder list.
#[derive(Debug, Clone, Deserialize)]
pub struct StageSection {
    #[serde(default = "default_configure_cmd")]
    pub configure: StageCommand,

    #[serde(default = "default_build_cmd")]
    pub build: StageCommand,

    #[serde(default = "default_run_cmd")]
    pub run: StageCommand,
}

/// A single stage command template.
#[derive(Debug, Clone, Deserialize)]
pub struct StageCommand {
    pub cmd: String,
}

fn default_configure_cmd() -> StageCommand {
    StageCommand {
        cmd: "cmake \
              -D CMAKE_BUILD_TYPE=Release \
              -D CONSTEXPR={constexpr} \
              -D IMAGE_WIDTH={image_width} \
              -D IMAGE_HEIGHT={image_height} \
              -D PATCH_WIDTH={patch_width} \
              -D PATCH_HEIGHT={patch_height} \
              -D PATCH_COORD_X={patch_x} \
              -D PATCH_COORD_Y={patch_y} \
              -D MAX_DEPTH={max_depth} \
              -D NUM_SAMPLES={num_samples} \
              -D RANDOM_SEED={random_seed} \
              -S . -B build/patch_{patch_x}_{patch_y}"
            .to_string(),
    }
}

fn default_build_cmd() -> StageCommand {
    StageCommand {
        cmd: "cmake --build build/patch_{patch_x}_{patch_y}".to_string(),
    }
}

fn default_run_cmd() -> StageCommand {
    StageCommand {
        cmd: "build/patch_{patch_x}_{patch_y}/ray_tracing".to_string(),
    }
}

impl Default for StageSection {
    fn default() -> Self {
        Self {
            configure: default_configure_cmd(),
            build: default_build_cmd(),
            run: default_run_cmd(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    /// Per-patch output file pattern. Must contain `{patch_x}` and
    /// `{patch_y}` so the patches don't collide.
    #[serde(default = "default_patch_path")]
    pub patch_path: String,

    /// Location of the stitched composite image.
    #[serde(default = "default_composite_path")]
    pub composite_path: String,
}

fn default_patch_path() -> String {
    "outputs/patch_{patch_x}_{patch_y}.ppm".to_string()
}

fn default_composite_path() -> String {
    "outputs/image.png".to_string()
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            patch_path: default_patch_path(),
            composite_path: default_composite_path(),
        }
    }
}

/// Immutable, fully-resolved run parameters.
///
/// Built once from the (override-applied) config and handed to every
/// component by reference. Serialized to JSON and logged at startup.
#[derive(Debug, Clone, Serialize)]
pub struct Parameters {
    pub image_width: u32,
    pub image_height: u32,
    pub patch_width: u32,
    pub patch_height: u32,
    pub constexpr: bool,
    pub max_depth: u32,
    pub num_samples: u32,
    pub random_seed: u64,
    pub max_workers: usize,
    pub stdout_timeout: Duration,
}

impl Parameters {
    /// Resolve the final parameter set from a validated config.
    ///
    /// The seed is drawn from the clock when not pinned, masked to 32 bits as
    /// the renderer expects.
    pub fn resolve(cfg: &ConfigFile) -> Result<Self> {
        let stdout_timeout = parse_duration(&cfg.limits.stdout_timeout).map_err(|e| {
            RaypatchError::Config(format!("invalid [limits].stdout_timeout: {e}"))
        })?;

        Ok(Self {
            image_width: cfg.render.image_width,
            image_height: cfg.render.image_height,
            patch_width: cfg.render.patch_width,
            patch_height: cfg.render.patch_height,
            constexpr: cfg.render.constexpr,
            max_depth: cfg.render.max_depth,
            num_samples: cfg.render.num_samples,
            random_seed: cfg.render.random_seed.unwrap_or_else(seed_from_clock),
            max_workers: cfg.limits.max_workers,
            stdout_timeout,
        })
    }
}

fn seed_from_clock() -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() ^ u64::from(now.subsec_nanos())) & 0xffff_ffff
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
