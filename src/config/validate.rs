// src/config/validate.rs

use tracing::warn;

use crate::config::model::{ConfigFile, parse_duration};
use crate::errors::{RaypatchError, Result};

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - all four image/patch dimensions are nonzero
/// - `max_workers >= 1`
/// - `stdout_timeout` parses to a nonzero duration
/// - no stage command template is empty
/// - the patch output pattern keeps patches from colliding
///
/// Non-divisible image/patch dimensions are *not* an error: the remainder
/// strip is silently dropped, and we only warn about it here.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_dimensions(cfg)?;
    validate_limits(cfg)?;
    validate_stage_templates(cfg)?;
    validate_output(cfg)?;
    warn_on_truncation(cfg);
    Ok(())
}

fn validate_dimensions(cfg: &ConfigFile) -> Result<()> {
    let r = &cfg.render;
    for (name, value) in [
        ("image_width", r.image_width),
        ("image_height", r.image_height),
        ("patch_width", r.patch_width),
        ("patch_height", r.patch_height),
    ] {
        if value == 0 {
            return Err(RaypatchError::Config(format!(
                "[render].{name} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn validate_limits(cfg: &ConfigFile) -> Result<()> {
    if cfg.limits.max_workers == 0 {
        return Err(RaypatchError::Config(
            "[limits].max_workers must be >= 1 (got 0)".to_string(),
        ));
    }

    let timeout = parse_duration(&cfg.limits.stdout_timeout)
        .map_err(|e| RaypatchError::Config(format!("invalid [limits].stdout_timeout: {e}")))?;
    if timeout.is_zero() {
        return Err(RaypatchError::Config(
            "[limits].stdout_timeout must be nonzero".to_string(),
        ));
    }

    Ok(())
}

fn validate_stage_templates(cfg: &ConfigFile) -> Result<()> {
    for (name, cmd) in [
        ("configure", &cfg.stage.configure.cmd),
        ("build", &cfg.stage.build.cmd),
        ("run", &cfg.stage.run.cmd),
    ] {
        if cmd.trim().is_empty() {
            return Err(RaypatchError::Config(format!(
                "[stage.{name}].cmd must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_output(cfg: &ConfigFile) -> Result<()> {
    let pattern = &cfg.output.patch_path;
    if !pattern.contains("{patch_x}") || !pattern.contains("{patch_y}") {
        return Err(RaypatchError::Config(format!(
            "[output].patch_path must contain {{patch_x}} and {{patch_y}} \
             so patch outputs don't collide (got '{pattern}')"
        )));
    }
    if cfg.output.composite_path.trim().is_empty() {
        return Err(RaypatchError::Config(
            "[output].composite_path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn warn_on_truncation(cfg: &ConfigFile) {
    let r = &cfg.render;
    if r.image_width % r.patch_width != 0 || r.image_height % r.patch_height != 0 {
        warn!(
            image_width = r.image_width,
            image_height = r.image_height,
            patch_width = r.patch_width,
            patch_height = r.patch_height,
            "image dimensions are not multiples of the patch dimensions; \
             the remainder region will not be rendered"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::ConfigFile;

    #[test]
    fn default_config_is_valid() {
        validate_config(&ConfigFile::default()).unwrap();
    }

    #[test]
    fn zero_patch_width_is_rejected() {
        let mut cfg = ConfigFile::default();
        cfg.render.patch_width = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut cfg = ConfigFile::default();
        cfg.limits.max_workers = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn patch_path_without_coordinates_is_rejected() {
        let mut cfg = ConfigFile::default();
        cfg.output.patch_path = "outputs/patch.ppm".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn empty_stage_template_is_rejected() {
        let mut cfg = ConfigFile::default();
        cfg.stage.build.cmd = "  ".to_string();
        assert!(validate_config(&cfg).is_err());
    }
}
