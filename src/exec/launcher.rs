// src/exec/launcher.rs

//! Bounded-concurrency launcher for one stage's batch of patch tasks.
//!
//! All tasks of a batch belong to the same stage. At most `max_workers` are
//! in the spawned-but-not-settled state at any instant; the rest queue on the
//! semaphore. Results are drained in completion order. The first failure
//! tears the whole batch down: every live process is killed through the
//! registry, unfinished sibling tasks are cancelled, and `Failure` is
//! returned without waiting for stragglers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::exec::registry::ProcessRegistry;
use crate::exec::supervisor::{PatchTask, TaskOutcome, TaskRunner};
use crate::grid::PatchCoord;

/// Aggregate result of one stage's batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    Success,
    Failure { failed: Vec<PatchCoord> },
}

impl StageResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success)
    }
}

/// Run `tasks` with at most `max_workers` in flight at once.
///
/// `label` names the batch (the stage) in log output.
pub async fn run_batch(
    runner: Arc<dyn TaskRunner>,
    tasks: Vec<PatchTask>,
    max_workers: usize,
    registry: Arc<ProcessRegistry>,
    label: &str,
) -> StageResult {
    let total = tasks.len();
    if total == 0 {
        debug!(label, "empty task batch; trivially successful");
        return StageResult::Success;
    }

    let semaphore = Arc::new(Semaphore::new(max_workers));
    let mut in_flight: JoinSet<(PatchCoord, TaskOutcome)> = JoinSet::new();
    let mut patch_of_task: HashMap<tokio::task::Id, PatchCoord> = HashMap::new();

    for task in tasks {
        let semaphore = Arc::clone(&semaphore);
        let runner = Arc::clone(&runner);
        let patch = task.patch;
        let handle = in_flight.spawn(async move {
            // The cap gates entry to the spawn-and-supervise section; the
            // permit spans the whole supervisor invocation.
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed; treat it as cancellation.
                Err(_) => return (patch, TaskOutcome::Cancelled),
            };
            let outcome = runner.run_task(task).await;
            (patch, outcome)
        });
        patch_of_task.insert(handle.id(), patch);
    }

    let mut settled = 0usize;
    while let Some(joined) = in_flight.join_next_with_id().await {
        let (patch, outcome) = match joined {
            Ok((_, result)) => result,
            Err(err) => {
                // A panicked supervisor counts as a failure of its patch.
                let patch = patch_of_task.get(&err.id()).copied();
                warn!(label, patch = ?patch, error = %err, "patch task aborted abnormally");
                cancel_batch(&registry, &mut in_flight, label);
                return StageResult::Failure {
                    failed: patch.into_iter().collect(),
                };
            }
        };

        settled += 1;
        match outcome {
            TaskOutcome::Success => {
                info!(label, patch = %patch, settled, total, "patch task succeeded");
            }
            TaskOutcome::Failed(code) => {
                warn!(
                    label,
                    patch = %patch,
                    exit_code = code,
                    "patch task failed; tearing down the rest of the batch"
                );
                cancel_batch(&registry, &mut in_flight, label);
                return StageResult::Failure {
                    failed: vec![patch],
                };
            }
            TaskOutcome::Cancelled => {
                debug!(label, patch = %patch, "patch task cancelled");
            }
        }
    }

    StageResult::Success
}

/// Kill every live process and cancel all unfinished sibling tasks.
///
/// Results that arrive after this point are discarded along with the join
/// set; they are never reported.
fn cancel_batch(
    registry: &ProcessRegistry,
    in_flight: &mut JoinSet<(PatchCoord, TaskOutcome)>,
    label: &str,
) {
    let drained = registry.kill_all();
    let cancelled = in_flight.len();
    in_flight.abort_all();
    warn!(
        label,
        killed_processes = drained.len(),
        cancelled_tasks = cancelled,
        "stage batch torn down after first failure"
    );
}
