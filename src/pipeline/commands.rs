// src/pipeline/commands.rs

//! Stage command templates.
//!
//! Templates are opaque shell strings; raypatch only substitutes
//! `{placeholder}` markers and never interprets what the command does.
//!
//! Supported placeholders: `{image_width}`, `{image_height}`,
//! `{patch_width}`, `{patch_height}`, `{patch_x}`, `{patch_y}`,
//! `{constexpr}` (rendered `ON`/`OFF`), `{max_depth}`, `{num_samples}`,
//! `{random_seed}`.

use std::path::PathBuf;

use crate::config::{Parameters, StageSection};
use crate::exec::PatchTask;
use crate::grid::PatchCoord;
use crate::pipeline::stage::Stage;

/// The three per-stage command templates of one run.
#[derive(Debug, Clone)]
pub struct StageTemplates {
    configure: String,
    build: String,
    run: String,
}

impl StageTemplates {
    pub fn from_config(stage: &StageSection) -> Self {
        Self {
            configure: stage.configure.cmd.clone(),
            build: stage.build.cmd.clone(),
            run: stage.run.cmd.clone(),
        }
    }

    pub fn template(&self, stage: Stage) -> &str {
        match stage {
            Stage::Configure => &self.configure,
            Stage::Build => &self.build,
            Stage::Run => &self.run,
        }
    }

    /// Bind one stage template to one patch, yielding a runnable task.
    pub fn render(&self, stage: Stage, patch: PatchCoord, params: &Parameters) -> PatchTask {
        PatchTask {
            patch,
            cmd: expand(self.template(stage), patch, params),
        }
    }
}

fn expand(template: &str, patch: PatchCoord, params: &Parameters) -> String {
    template
        .replace("{image_width}", &params.image_width.to_string())
        .replace("{image_height}", &params.image_height.to_string())
        .replace("{patch_width}", &params.patch_width.to_string())
        .replace("{patch_height}", &params.patch_height.to_string())
        .replace("{patch_x}", &patch.x.to_string())
        .replace("{patch_y}", &patch.y.to_string())
        .replace("{constexpr}", if params.constexpr { "ON" } else { "OFF" })
        .replace("{max_depth}", &params.max_depth.to_string())
        .replace("{num_samples}", &params.num_samples.to_string())
        .replace("{random_seed}", &params.random_seed.to_string())
}

/// Expand the per-patch output path pattern for one coordinate.
pub fn patch_output_path(pattern: &str, patch: PatchCoord) -> PathBuf {
    PathBuf::from(
        pattern
            .replace("{patch_x}", &patch.x.to_string())
            .replace("{patch_y}", &patch.y.to_string()),
    )
}
