use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::task_scheduler::NEVER;

/// Remembers, per job name, up to which point runs have already been evaluated.
///
/// Keyed by job name only: two watches with the same name on different machines
/// share one entry. Lives only as long as the engine that owns it.
#[derive(Debug, Default)]
pub struct CheckTracker {
    last_checked: HashMap<String, DateTime<Utc>>,
}

impl CheckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored timestamp, or [`NEVER`] when the job has not been evaluated yet.
    pub fn last_checked(&self, name: &str) -> DateTime<Utc> {
        self.last_checked.get(name).copied().unwrap_or(NEVER)
    }

    /// Overwrites the stored timestamp for `name`.
    pub fn mark_checked(&mut self, name: &str, at: DateTime<Utc>) {
        self.last_checked.insert(name.to_string(), at);
    }

    pub fn is_new_run(&self, name: &str, last_run: DateTime<Utc>) -> bool {
        last_run > self.last_checked(name)
    }

    pub fn len(&self) -> usize {
        self.last_checked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_checked.is_empty()
    }
}
