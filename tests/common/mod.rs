// tests/common/mod.rs

//! Shared test doubles: a scriptable in-process `TaskRunner`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use raypatch::exec::{PatchTask, TaskOutcome, TaskRunner};
use raypatch::grid::PatchCoord;

/// A fake runner that never spawns a process.
///
/// Each task "runs" for a fixed delay and then reports a scripted outcome.
/// The runner records every started task and tracks the peak number of tasks
/// simultaneously in flight, which is what the launcher cap tests assert on.
#[derive(Default)]
pub struct FakeRunner {
    delay: Duration,
    /// Fail a task when its command contains the substring and its patch
    /// matches. An empty substring matches any command.
    failures: Vec<(String, PatchCoord)>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<(PatchCoord, String)>>,
}

impl FakeRunner {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Script a failure for `patch` whenever its command contains `when`.
    pub fn failing(mut self, when: &str, patch: PatchCoord) -> Self {
        self.failures.push((when.to_string(), patch));
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<(PatchCoord, String)> {
        self.started.lock().unwrap().clone()
    }
}

impl TaskRunner for FakeRunner {
    fn run_task(
        &self,
        task: PatchTask,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.started
                .lock()
                .unwrap()
                .push((task.patch, task.cmd.clone()));

            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let failed = self
                .failures
                .iter()
                .any(|(when, patch)| *patch == task.patch && task.cmd.contains(when));
            if failed {
                TaskOutcome::Failed(1)
            } else {
                TaskOutcome::Success
            }
        })
    }
}

/// One task per patch of a `cols × rows` grid, with a throwaway command.
pub fn batch_of(cols: u32, rows: u32) -> Vec<PatchTask> {
    let mut tasks = Vec::new();
    for y in 0..rows {
        for x in 0..cols {
            let patch = PatchCoord::new(x, y);
            tasks.push(PatchTask {
                patch,
                cmd: format!("echo {patch}"),
            });
        }
    }
    tasks
}
