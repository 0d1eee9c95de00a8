//! Job inspector backed by the Windows `schtasks` command line tool.
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{InspectError, JobInspector, NEVER, RemoteJobState, RunState};

const DEFAULT_QUERY_TIMEOUT_SECONDS: u64 = 60;

// Column positions in `schtasks /query /fo CSV /v` output.
const STATUS_COLUMN: usize = 3;
const LAST_RUN_COLUMN: usize = 5;
const LAST_RESULT_COLUMN: usize = 6;

const LAST_RUN_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

pub struct SchtasksInspector {
    program: PathBuf,
    query_timeout: Duration,
}

impl Default for SchtasksInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl SchtasksInspector {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("schtasks"),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECONDS),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    fn query_args(job_name: &str, machine: &str) -> Vec<String> {
        let mut args = vec!["/query".to_string()];
        if !is_local_machine(machine) {
            args.push("/s".to_string());
            args.push(machine.to_string());
        }
        args.extend(
            ["/tn", job_name, "/fo", "CSV", "/v", "/nh"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }
}

fn is_local_machine(machine: &str) -> bool {
    let machine = machine.trim();
    machine.is_empty() || machine == "." || machine.eq_ignore_ascii_case("localhost")
}

#[async_trait]
impl JobInspector for SchtasksInspector {
    async fn inspect(&self, job_name: &str, machine: &str) -> Result<RemoteJobState, InspectError> {
        let args = Self::query_args(job_name, machine);
        debug!(program = ?self.program, ?args, "Querying task scheduler.");

        let output = tokio::time::timeout(
            self.query_timeout,
            Command::new(&self.program)
                .args(&args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            InspectError::Query(format!(
                "schtasks did not answer within {}s",
                self.query_timeout.as_secs()
            ))
        })?
        .map_err(|e| InspectError::Query(format!("Failed to run {:?}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found_message(&stderr) {
                return Err(InspectError::NotFound {
                    job: job_name.to_string(),
                    machine: machine.to_string(),
                });
            }
            return Err(InspectError::Query(format!(
                "schtasks exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_query_output(&String::from_utf8_lossy(&output.stdout))
    }
}

fn is_not_found_message(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("cannot find") || lower.contains("does not exist")
}

/// Parses the first record of verbose CSV output into a job state.
pub fn parse_query_output(stdout: &str) -> Result<RemoteJobState, InspectError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| InspectError::Query("schtasks returned no output".to_string()))?;

    let fields = split_csv_line(line);
    let field = |index: usize, name: &str| {
        fields.get(index).map(String::as_str).ok_or_else(|| {
            InspectError::Query(format!(
                "schtasks output has {} columns, missing '{name}'",
                fields.len()
            ))
        })
    };

    let state = parse_run_state(field(STATUS_COLUMN, "Status")?);
    let last_run = parse_last_run(field(LAST_RUN_COLUMN, "Last Run Time")?)?;
    let last_result = parse_result_code(field(LAST_RESULT_COLUMN, "Last Result")?)?;

    Ok(RemoteJobState {
        state,
        last_run,
        last_result,
    })
}

fn parse_run_state(raw: &str) -> RunState {
    match raw.trim() {
        s if s.eq_ignore_ascii_case("ready") => RunState::Idle,
        s if s.eq_ignore_ascii_case("running") => RunState::Running,
        other => RunState::Other(other.to_string()),
    }
}

fn parse_last_run(raw: &str) -> Result<DateTime<Utc>, InspectError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("n/a") || raw.eq_ignore_ascii_case("never") {
        return Ok(NEVER);
    }
    let naive = LAST_RUN_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| InspectError::Query(format!("Unrecognised last run time '{raw}'")))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| InspectError::Query(format!("Last run time '{raw}' is not a valid local time")))
}

/// Hex results are 32-bit HRESULTs and are sign-extended, so `0x80070002` and
/// `-2147024894` compare equal against an expected result.
fn parse_result_code(raw: &str) -> Result<i64, InspectError> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).map(|code| i64::from(code as i32)),
        None => raw.parse::<i64>(),
    };
    parsed.map_err(|e| InspectError::Query(format!("Unrecognised last result '{raw}': {e}")))
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
