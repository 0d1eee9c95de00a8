use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use sysinfo::System;
use tracing::debug;

use super::{Notifier, SenderError};
use crate::config::EmailSettings;
use crate::notifications::models::{Alert, footer};

const API_USER: &str = "api";
const UNKNOWN_HOST: &str = "unknown-host";

/// Sends alerts through a Mailgun-style HTTP gateway
/// (`application/x-www-form-urlencoded`, basic auth as `api:<key>`).
pub struct MailgunSender {
    client: Client,
    host_name: String,
}

impl Default for MailgunSender {
    fn default() -> Self {
        Self::new()
    }
}

impl MailgunSender {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            host_name: System::host_name().unwrap_or_else(|| UNKNOWN_HOST.to_string()),
        }
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    /// Form fields in send order: `from`, `subject`, `text`, then one `to` per recipient.
    pub fn form_fields(&self, settings: &EmailSettings, alert: &Alert) -> Vec<(String, String)> {
        let text = format!("{}{}", alert.body, footer(Local::now(), &self.host_name));
        let mut fields = vec![
            ("from".to_string(), settings.from.clone()),
            ("subject".to_string(), alert.subject.clone()),
            ("text".to_string(), text),
        ];
        fields.extend(
            settings
                .recipients()
                .into_iter()
                .map(|to| ("to".to_string(), to.to_string())),
        );
        fields
    }
}

#[async_trait]
impl Notifier for MailgunSender {
    async fn send(&self, settings: &EmailSettings, alert: &Alert) -> Result<(), SenderError> {
        if settings.recipients().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "No recipients configured".to_string(),
            ));
        }
        if settings.api_url.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Email gateway URL is empty".to_string(),
            ));
        }

        debug!(subject = %alert.subject, body = %alert.body, "Sending email.");

        let response = self
            .client
            .post(&settings.api_url)
            .basic_auth(API_USER, Some(&settings.api_key))
            .form(&self.form_fields(settings, alert))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Email gateway returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
