// src/pipeline/controller.rs

//! Pipeline controller: the Configure → Build → Run → Assemble state machine.

use std::sync::Arc;

use tracing::{info, warn};

use crate::assemble;
use crate::config::{OutputSection, Parameters};
use crate::errors::{RaypatchError, Result};
use crate::exec::launcher::{StageResult, run_batch};
use crate::exec::registry::ProcessRegistry;
use crate::exec::supervisor::TaskRunner;
use crate::grid::{self, PatchCoord};
use crate::pipeline::commands::{StageTemplates, patch_output_path};
use crate::pipeline::stage::PipelineState;

/// Drives one full run over a patch grid.
///
/// Each process stage renders one task per coordinate from its template and
/// hands the batch to the launcher; the controller advances only on stage
/// success. Any failure puts the machine into the absorbing `Failed` state
/// and skips everything that remains — no retry, no partial continuation.
pub struct Pipeline {
    params: Parameters,
    templates: StageTemplates,
    output: OutputSection,
    registry: Arc<ProcessRegistry>,
    runner: Arc<dyn TaskRunner>,
}

impl Pipeline {
    pub fn new(
        params: Parameters,
        templates: StageTemplates,
        output: OutputSection,
        registry: Arc<ProcessRegistry>,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            params,
            templates,
            output,
            registry,
            runner,
        }
    }

    /// Drive the pipeline to a terminal state.
    pub async fn run(&self) -> Result<()> {
        let patches = grid::partition(
            self.params.image_width,
            self.params.image_height,
            self.params.patch_width,
            self.params.patch_height,
        );
        let (cols, rows) = grid::grid_dims(
            self.params.image_width,
            self.params.image_height,
            self.params.patch_width,
            self.params.patch_height,
        );
        info!(cols, rows, patches = patches.len(), "partitioned image into patch grid");

        let mut state = PipelineState::Configure;
        let mut error: Option<RaypatchError> = None;

        while !state.is_terminal() {
            state = self.step(state, &patches, &mut error).await;
        }

        match state {
            PipelineState::Done => {
                info!("pipeline complete");
                Ok(())
            }
            _ => Err(error.unwrap_or_else(|| {
                RaypatchError::Config("pipeline failed without a recorded error".to_string())
            })),
        }
    }

    async fn step(
        &self,
        state: PipelineState,
        patches: &[PatchCoord],
        error: &mut Option<RaypatchError>,
    ) -> PipelineState {
        match state {
            PipelineState::Configure | PipelineState::Build => {
                self.process_stage(state, patches, error).await
            }
            PipelineState::Run => {
                // The external renderers write their patch files here; make
                // sure the directory exists before the first one launches.
                if let Err(err) = self.prepare_output_dir() {
                    *error = Some(err);
                    return PipelineState::Failed;
                }
                self.process_stage(state, patches, error).await
            }
            PipelineState::Assemble => {
                match assemble::compose(&self.params, &self.output, patches) {
                    Ok(path) => {
                        info!(composite = ?path, "composite image written");
                        state.on_success()
                    }
                    Err(err) => {
                        // The Run stage has fully settled by now, so there is
                        // nothing to kill; the failure just ends the run.
                        warn!(error = %err, "image assembly failed");
                        *error = Some(err);
                        PipelineState::Failed
                    }
                }
            }
            PipelineState::Done | PipelineState::Failed => state,
        }
    }

    async fn process_stage(
        &self,
        state: PipelineState,
        patches: &[PatchCoord],
        error: &mut Option<RaypatchError>,
    ) -> PipelineState {
        let Some(stage) = state.stage() else {
            return state;
        };

        info!(patches = patches.len(), "================ {} ================", stage);

        let tasks = patches
            .iter()
            .map(|patch| self.templates.render(stage, *patch, &self.params))
            .collect();

        let result = run_batch(
            Arc::clone(&self.runner),
            tasks,
            self.params.max_workers,
            Arc::clone(&self.registry),
            stage.name(),
        )
        .await;

        match result {
            StageResult::Success => {
                info!(stage = %stage, "stage succeeded");
                state.on_success()
            }
            StageResult::Failure { failed } => {
                warn!(stage = %stage, failed = ?failed, "stage failed; skipping remaining stages");
                *error = Some(RaypatchError::StageFailed { stage, failed });
                PipelineState::Failed
            }
        }
    }

    fn prepare_output_dir(&self) -> Result<()> {
        let probe = patch_output_path(&self.output.patch_path, PatchCoord::new(0, 0));
        if let Some(parent) = probe.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
