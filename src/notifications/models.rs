use chrono::{DateTime, Local, Utc};

use crate::config::JobWatch;
use crate::task_scheduler::{InspectError, RemoteJobState};

pub const INSPECTION_FAILED_SUBJECT: &str = "Error checking scheduled task.";

/// A single email alert before transport formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

/// Renders a run timestamp the way it appears in alert bodies (machine-local time).
pub fn format_run_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Alert {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// The job's last run finished with a result other than the configured one.
    pub fn result_mismatch(watch: &JobWatch, remote: &RemoteJobState) -> Self {
        Self::new(
            format!("Scheduled Task '{}' did not complete correctly.", watch.name),
            format!(
                "The scheduled task '{}' on machine '{}' which ran on {} did not exit with the expected result.\r\n It exited with '{}'. It should have been '{}'.",
                watch.name,
                watch.machine,
                format_run_time(&remote.last_run),
                remote.last_result,
                watch.expected_result,
            ),
        )
    }

    /// The job could not be inspected at all.
    pub fn inspection_failed(error: &InspectError) -> Self {
        Self::new(
            INSPECTION_FAILED_SUBJECT,
            format!(
                "The following error occured trying to check the status of a scheduled task: {error}"
            ),
        )
    }
}

/// Footer appended to every email body.
pub fn footer(generated_at: DateTime<Local>, host: &str) -> String {
    format!(
        "\r\n \r\n This email was generated at {} from server {}. ",
        generated_at.format("%Y-%m-%d %H:%M:%S"),
        host
    )
}
