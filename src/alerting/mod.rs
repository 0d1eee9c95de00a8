pub mod check_tracker;
pub mod evaluation_service;
pub mod poll_scheduler;

pub use check_tracker::CheckTracker;
pub use evaluation_service::{EvaluationService, JobOutcome};
pub use poll_scheduler::{EngineError, PollScheduler, TickOutcome};
