use async_trait::async_trait;
use thiserror::Error;

use super::models::Alert;
use crate::config::EmailSettings;

pub mod mailgun;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Delivers an alert to the recipients named in the current email settings.
///
/// Delivery is awaited inline by the evaluator, so implementations should
/// return once the gateway has accepted or rejected the message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, settings: &EmailSettings, alert: &Alert) -> Result<(), SenderError>;
}
