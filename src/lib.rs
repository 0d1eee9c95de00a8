pub mod alerting;
pub mod config;
pub mod logging;
pub mod notifications;
pub mod task_scheduler;
pub mod version;
