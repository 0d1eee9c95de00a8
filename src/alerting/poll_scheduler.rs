//! Fixed-interval driver for the evaluation pass.
//!
//! Each scheduler owns a single-flight guard: a `tokio::sync::Mutex` around the
//! [`CheckTracker`]. A tick only runs if it can take the guard without waiting, so
//! a tick that overruns the interval causes later ticks to be dropped rather than
//! queued. `stop` waits on the same guard, so once it returns no tick is in flight.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::check_tracker::CheckTracker;
use super::evaluation_service::EvaluationService;
use crate::config::{ConfigSource, MAX_POLL_INTERVAL_SECONDS};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Poll scheduler is already running.")]
    AlreadyRunning,
    #[error("Poll scheduler must be started from within a Tokio runtime.")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick held the guard, or the engine was stopped before this tick started.
    Skipped,
    /// The configuration could not be loaded; no jobs were evaluated.
    ConfigFailed,
    Completed { jobs: usize, alerts: usize },
}

struct Driver {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    config_source: Arc<dyn ConfigSource>,
    evaluator: EvaluationService,
    tick_guard: Mutex<CheckTracker>,
    active: AtomicBool,
    interval_tx: watch::Sender<Duration>,
    driver: StdMutex<Option<Driver>>,
}

#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<Inner>,
}

impl PollScheduler {
    /// `initial_interval` is used until a loaded configuration supplies its own.
    pub fn new(
        config_source: Arc<dyn ConfigSource>,
        evaluator: EvaluationService,
        initial_interval: Duration,
    ) -> Self {
        let (interval_tx, _) = watch::channel(initial_interval);
        Self {
            inner: Arc::new(Inner {
                config_source,
                evaluator,
                tick_guard: Mutex::new(CheckTracker::new()),
                active: AtomicBool::new(false),
                interval_tx,
                driver: StdMutex::new(None),
            }),
        }
    }

    pub fn start(&self) -> Result<(), EngineError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let mut driver = self
            .inner
            .driver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if driver.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval_rx = self.inner.interval_tx.subscribe();
        self.inner.active.store(true, Ordering::SeqCst);
        let handle = runtime.spawn(drive(Arc::clone(&self.inner), shutdown_rx, interval_rx));
        *driver = Some(Driver {
            shutdown_tx,
            handle,
        });

        info!(interval_seconds = self.current_interval().as_secs(), "Poll scheduler started.");
        Ok(())
    }

    /// Stops ticking and waits for any in-flight tick to finish. A no-op when already stopped.
    pub async fn stop(&self) {
        let driver = self
            .inner
            .driver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(driver) = driver {
            let _ = driver.shutdown_tx.send(true);
            if let Err(e) = driver.handle.await {
                error!(error = ?e, "Poll scheduler driver task ended abnormally.");
            }
        }

        let _guard = self.inner.tick_guard.lock().await;
        // A start() that slipped in while we waited for the guard owns the engine now.
        let driver = self
            .inner
            .driver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if driver.is_some() {
            debug!("Poll scheduler restarted while stopping; leaving it running.");
            return;
        }
        if self.inner.active.swap(false, Ordering::SeqCst) {
            info!("Poll scheduler stopped.");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn current_interval(&self) -> Duration {
        *self.inner.interval_tx.borrow()
    }

    /// Runs one evaluation pass now, subject to the same single-flight guard as scheduled ticks.
    pub async fn run_tick(&self) -> TickOutcome {
        self.inner.tick(false).await
    }

    /// Timestamp currently stored for `name`, waiting for any in-flight tick.
    pub async fn last_checked(&self, name: &str) -> chrono::DateTime<chrono::Utc> {
        self.inner.tick_guard.lock().await.last_checked(name)
    }
}

impl Inner {
    async fn tick(&self, scheduled: bool) -> TickOutcome {
        let Ok(mut tracker) = self.tick_guard.try_lock() else {
            warn!("Previous tick is still running. Skipping this tick.");
            return TickOutcome::Skipped;
        };
        if scheduled && !self.active.load(Ordering::SeqCst) {
            debug!("Scheduler stopped before tick started. Skipping.");
            return TickOutcome::Skipped;
        }

        let config = match self.config_source.load() {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "Failed to load monitor config. Skipping this tick.");
                return TickOutcome::ConfigFailed;
            }
        };

        let period = Duration::from_secs(config.poll_interval_seconds);
        self.interval_tx.send_if_modified(|current| {
            if *current == period {
                return false;
            }
            *current = period;
            true
        });

        let mut alerts = 0;
        for watch in &config.jobs {
            let outcome = self
                .evaluator
                .evaluate_job(&mut tracker, watch, &config.email)
                .await;
            if outcome.raised_alert() {
                alerts += 1;
            }
        }

        debug!(jobs = config.jobs.len(), alerts, "Tick complete.");
        TickOutcome::Completed {
            jobs: config.jobs.len(),
            alerts,
        }
    }
}

const MIN_PERIOD: Duration = Duration::from_secs(1);
const MAX_PERIOD: Duration = Duration::from_secs(MAX_POLL_INTERVAL_SECONDS);

fn ticker(period: Duration) -> Interval {
    let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn drive(
    inner: Arc<Inner>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut interval_rx: watch::Receiver<Duration>,
) {
    let mut period = *interval_rx.borrow_and_update();
    let mut timer = ticker(period);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                debug!("Shutdown signal received, poll driver exiting.");
                break;
            }

            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = *interval_rx.borrow_and_update();
                if next != period {
                    info!(
                        old_seconds = period.as_secs(),
                        new_seconds = next.as_secs(),
                        "Poll interval changed."
                    );
                    period = next;
                    timer = ticker(period);
                }
            }

            _ = timer.tick() => {
                // Spawned so an overrunning tick leaves the driver free to observe
                // (and drop) the ticks that fall due meanwhile.
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    inner.tick(true).await;
                });
            }
        }
    }
}
