// src/exec/registry.rs

//! Process-wide registry of spawned patch processes.
//!
//! Every process the supervisor spawns is registered here before control
//! returns to the caller, and stays registered until the next cleanup pass —
//! the supervisor records the final status but never removes entries. That
//! way a failure anywhere in the pipeline can still locate and kill every
//! live child. There is no partial-result salvage: cleanup simply discards
//! abandoned work.
//!
//! The registry is shared as an explicit `Arc<ProcessRegistry>` handle, not
//! as global state.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::grid::PatchCoord;

/// Opaque handle to one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(u64);

/// Lifecycle state of one spawned process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Succeeded,
    Failed(i32),
    Killed,
}

impl ProcessStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProcessStatus::Running)
    }
}

/// One registered process.
#[derive(Debug, Clone)]
pub struct RegisteredProcess {
    pub patch: PatchCoord,
    pub pid: Option<u32>,
    pub status: ProcessStatus,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    members: HashMap<u64, RegisteredProcess>,
}

/// Registry of all live patch processes.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    inner: Mutex<Inner>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock still holds consistent data; the critical sections
        // here never leave partial state behind.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a newly spawned process in the `Running` state.
    pub fn register(&self, patch: PatchCoord, pid: Option<u32>) -> ProcessId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.members.insert(
            id,
            RegisteredProcess {
                patch,
                pid,
                status: ProcessStatus::Running,
            },
        );
        debug!(patch = %patch, pid, "registered patch process");
        ProcessId(id)
    }

    /// Record the terminal status of a process.
    ///
    /// The entry stays in the set until the next cleanup pass; unknown ids
    /// (already cleaned up) are ignored.
    pub fn mark_exited(&self, id: ProcessId, status: ProcessStatus) {
        let mut inner = self.lock();
        if let Some(member) = inner.members.get_mut(&id.0) {
            member.status = status;
        }
    }

    /// Number of members still in the `Running` state.
    pub fn running_count(&self) -> usize {
        self.lock()
            .members
            .values()
            .filter(|m| m.status == ProcessStatus::Running)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().members.is_empty()
    }

    /// Snapshot of the current members, in no particular order.
    pub fn snapshot(&self) -> Vec<RegisteredProcess> {
        self.lock().members.values().cloned().collect()
    }

    /// Kill every member still running and clear the set.
    ///
    /// The member set is drained under the lock in one pass; signals are sent
    /// afterwards so the lock is never held while signalling. "No such
    /// process" is a benign race (the child exited between the snapshot and
    /// the signal) and is ignored. Returns the drained members with their
    /// final statuses, for logging and inspection.
    pub fn kill_all(&self) -> Vec<RegisteredProcess> {
        let mut drained: Vec<RegisteredProcess> = {
            let mut inner = self.lock();
            inner.members.drain().map(|(_, member)| member).collect()
        };

        let mut killed = 0usize;
        for member in drained.iter_mut() {
            if member.status != ProcessStatus::Running {
                continue;
            }
            // Whether the signal landed or the child beat us to the grave,
            // the process is terminal now.
            if let Some(pid) = member.pid {
                if kill_pid(pid) {
                    killed += 1;
                    warn!(patch = %member.patch, pid, "killed live patch process");
                }
            }
            member.status = ProcessStatus::Killed;
        }

        if !drained.is_empty() {
            debug!(
                drained = drained.len(),
                killed, "process registry cleanup complete"
            );
        }
        drained
    }
}

#[cfg(unix)]
fn kill_pid(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(err) => {
            warn!(pid, error = %err, "failed to kill patch process");
            false
        }
    }
}

#[cfg(not(unix))]
fn kill_pid(pid: u32) -> bool {
    warn!(
        pid,
        "process kill not supported on this platform; relying on kill_on_drop"
    );
    false
}
