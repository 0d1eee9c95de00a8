#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

use task_alert_service::alerting::{EvaluationService, PollScheduler};
use task_alert_service::config::{ConfigError, ConfigSource, EmailSettings, JobWatch, MonitorConfig};
use task_alert_service::notifications::{Alert, Notifier, SenderError};
use task_alert_service::task_scheduler::{InspectError, JobInspector, RemoteJobState, RunState};

#[derive(Clone)]
pub enum FakeJob {
    State(RemoteJobState),
    NotFound,
    QueryError(String),
}

/// Inspector answering from a table keyed by `(job, machine)`.
#[derive(Default)]
pub struct FakeInspector {
    jobs: Mutex<HashMap<(String, String), FakeJob>>,
    calls: Mutex<Vec<(String, String)>>,
    gate: Option<Gate>,
}

/// Lets a test hold an inspection open until it releases it.
pub struct Gate {
    pub entered: Notify,
    pub release: Semaphore,
}

impl FakeInspector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Gate {
                entered: Notify::new(),
                release: Semaphore::new(0),
            }),
            ..Default::default()
        })
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().expect("inspector was not built with a gate")
    }

    pub fn set(&self, job: &str, machine: &str, answer: FakeJob) {
        self.jobs
            .lock()
            .unwrap()
            .insert((job.to_string(), machine.to_string()), answer);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl JobInspector for FakeInspector {
    async fn inspect(&self, job_name: &str, machine: &str) -> Result<RemoteJobState, InspectError> {
        self.calls
            .lock()
            .unwrap()
            .push((job_name.to_string(), machine.to_string()));

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.acquire().await.unwrap().forget();
        }

        let answer = self
            .jobs
            .lock()
            .unwrap()
            .get(&(job_name.to_string(), machine.to_string()))
            .cloned()
            .unwrap_or(FakeJob::NotFound);
        match answer {
            FakeJob::State(state) => Ok(state),
            FakeJob::NotFound => Err(InspectError::NotFound {
                job: job_name.to_string(),
                machine: machine.to_string(),
            }),
            FakeJob::QueryError(msg) => Err(InspectError::Query(msg)),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Alert>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, _settings: &EmailSettings, alert: &Alert) -> Result<(), SenderError> {
        self.sent.lock().unwrap().push(alert.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SenderError::SendFailed(
                "Email gateway returned non-success status: 500 Internal Server Error".to_string(),
            ));
        }
        Ok(())
    }
}

/// In-memory config source whose content tests can swap between ticks.
pub struct SharedConfig {
    current: Mutex<Option<MonitorConfig>>,
    loads: AtomicUsize,
}

impl SharedConfig {
    pub fn new(config: MonitorConfig) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Some(config)),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, config: MonitorConfig) {
        *self.current.lock().unwrap() = Some(config);
    }

    pub fn break_it(&self) {
        *self.current.lock().unwrap() = None;
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ConfigSource for SharedConfig {
    fn load(&self) -> Result<MonitorConfig, ConfigError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ConfigError::Invalid("config file is corrupt".to_string()))
    }
}

pub fn email() -> EmailSettings {
    EmailSettings {
        from: "alerts@example.com".to_string(),
        to: "ops@example.com".to_string(),
        api_url: "http://localhost/messages".to_string(),
        api_key: "key-123".to_string(),
    }
}

pub fn watch(name: &str, machine: &str, expected_result: i64) -> JobWatch {
    JobWatch {
        name: name.to_string(),
        machine: machine.to_string(),
        expected_result,
    }
}

pub fn config(poll_interval_seconds: u64, jobs: Vec<JobWatch>) -> MonitorConfig {
    MonitorConfig {
        poll_interval_seconds,
        jobs,
        email: email(),
    }
}

pub fn idle(last_run: DateTime<Utc>, last_result: i64) -> FakeJob {
    FakeJob::State(RemoteJobState {
        state: RunState::Idle,
        last_run,
        last_result,
    })
}

pub fn running(last_run: DateTime<Utc>, last_result: i64) -> FakeJob {
    FakeJob::State(RemoteJobState {
        state: RunState::Running,
        last_run,
        last_result,
    })
}

pub fn t1() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 2, 0, 0).unwrap()
}

pub fn scheduler(
    config: Arc<SharedConfig>,
    inspector: Arc<FakeInspector>,
    notifier: Arc<RecordingNotifier>,
    initial_interval: Duration,
) -> PollScheduler {
    PollScheduler::new(
        config,
        EvaluationService::new(inspector, notifier),
        initial_interval,
    )
}
