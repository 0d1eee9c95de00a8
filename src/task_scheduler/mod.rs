//! Lookup of a scheduled job's last-run state on a target machine.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

pub mod schtasks;

pub use schtasks::SchtasksInspector;

/// Timestamp used when a job has never run, and by the check tracker for "never checked".
pub const NEVER: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Other(String),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Running => write!(f, "Running"),
            RunState::Other(state) => write!(f, "{state}"),
        }
    }
}

/// Snapshot of a job as reported by the scheduler. Not cached beyond one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteJobState {
    pub state: RunState,
    pub last_run: DateTime<Utc>,
    pub last_result: i64,
}

#[derive(Error, Debug)]
pub enum InspectError {
    #[error("The scheduled task {job} on machine {machine} could not be found.")]
    NotFound { job: String, machine: String },
    #[error("Failed to query scheduled task: {0}")]
    Query(String),
}

#[async_trait]
pub trait JobInspector: Send + Sync {
    async fn inspect(&self, job_name: &str, machine: &str) -> Result<RemoteJobState, InspectError>;
}
