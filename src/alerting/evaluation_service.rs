use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::check_tracker::CheckTracker;
use crate::config::{EmailSettings, JobWatch};
use crate::notifications::{Alert, Notifier};
use crate::task_scheduler::{InspectError, JobInspector, RunState};

/// What happened to one job watch during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job is executing right now; nothing was evaluated.
    Running,
    /// The last run was already evaluated on an earlier tick.
    AlreadyChecked,
    /// A new run finished with the expected result.
    Passed,
    /// A new run finished with an unexpected result and an alert was attempted.
    Alerted,
    NotFound,
    QueryFailed,
}

impl JobOutcome {
    /// Whether this outcome attempted to send an email.
    pub fn raised_alert(self) -> bool {
        matches!(
            self,
            JobOutcome::Alerted | JobOutcome::NotFound | JobOutcome::QueryFailed
        )
    }
}

/// Decides, per job watch, whether its last run needs an alert.
pub struct EvaluationService {
    inspector: Arc<dyn JobInspector>,
    notifier: Arc<dyn Notifier>,
}

impl EvaluationService {
    pub fn new(inspector: Arc<dyn JobInspector>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inspector,
            notifier,
        }
    }

    pub async fn evaluate_job(
        &self,
        tracker: &mut CheckTracker,
        watch: &JobWatch,
        email: &EmailSettings,
    ) -> JobOutcome {
        debug!(job = %watch.name, machine = %watch.machine, "Checking scheduled task.");

        let remote = match self.inspector.inspect(&watch.name, &watch.machine).await {
            Ok(remote) => remote,
            Err(e) => {
                error!(job = %watch.name, machine = %watch.machine, error = %e, "Error checking scheduled task.");
                let outcome = match e {
                    InspectError::NotFound { .. } => JobOutcome::NotFound,
                    InspectError::Query(_) => JobOutcome::QueryFailed,
                };
                self.deliver(email, &Alert::inspection_failed(&e)).await;
                return outcome;
            }
        };

        if remote.state == RunState::Running {
            debug!(job = %watch.name, machine = %watch.machine, "Task is running; skipping.");
            return JobOutcome::Running;
        }

        if !tracker.is_new_run(&watch.name, remote.last_run) {
            debug!(
                job = %watch.name,
                last_run = %remote.last_run,
                last_checked = %tracker.last_checked(&watch.name),
                "Last run already evaluated."
            );
            return JobOutcome::AlreadyChecked;
        }

        // Committed before comparing or sending, so a failed delivery never re-alerts this run.
        // Never below the run itself, in case the remote clock is ahead of ours.
        tracker.mark_checked(&watch.name, Utc::now().max(remote.last_run));

        if remote.last_result == watch.expected_result {
            info!(
                job = %watch.name,
                machine = %watch.machine,
                result = remote.last_result,
                "Task completed with the expected result."
            );
            return JobOutcome::Passed;
        }

        let alert = Alert::result_mismatch(watch, &remote);
        error!(job = %watch.name, machine = %watch.machine, "{}", alert.body);
        self.deliver(email, &alert).await;
        JobOutcome::Alerted
    }

    async fn deliver(&self, email: &EmailSettings, alert: &Alert) {
        match self.notifier.send(email, alert).await {
            Ok(()) => info!(subject = %alert.subject, "Alert email sent."),
            Err(e) => error!(subject = %alert.subject, error = %e, "Failed to send alert email."),
        }
    }
}
