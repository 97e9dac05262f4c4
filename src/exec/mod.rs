// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the per-patch commands,
//! using `tokio::process::Command`, and for the bookkeeping that makes a
//! pipeline-wide emergency stop possible.
//!
//! - [`registry`] tracks every live spawned process and owns kill-all.
//! - [`supervisor`] spawns and monitors exactly one process per task.
//! - [`launcher`] fans a stage's task batch out under a concurrency cap and
//!   aggregates the outcomes.

pub mod launcher;
pub mod registry;
pub mod supervisor;

pub use launcher::{StageResult, run_batch};
pub use registry::{ProcessId, ProcessRegistry, ProcessStatus, RegisteredProcess};
pub use supervisor::{PatchTask, ProcessRunner, TaskOutcome, TaskRunner};
