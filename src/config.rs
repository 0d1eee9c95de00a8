//! Monitoring configuration: which jobs to watch, what they should return, and where alerts go.
//!
//! The configuration is re-read in full on every tick, so every type here is an
//! immutable snapshot. Files are TOML by default; `.json` files are accepted too,
//! including the field names of the older JSON layout.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 60;
pub const MAX_POLL_INTERVAL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("Failed to parse JSON config: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECONDS
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval", alias = "CheckIntervalInSeconds")]
    pub poll_interval_seconds: u64,
    #[serde(default, alias = "ScheduledTasks")]
    pub jobs: Vec<JobWatch>,
    #[serde(alias = "EmailConfig")]
    pub email: EmailSettings,
}

/// One job to watch on one machine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JobWatch {
    #[serde(alias = "ScheduledTaskName")]
    pub name: String,
    #[serde(default, alias = "MachineName")]
    pub machine: String,
    #[serde(default, alias = "ExpectedResult")]
    pub expected_result: i64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    #[serde(alias = "FromEmailAddress")]
    pub from: String,
    /// Comma-separated recipient list.
    #[serde(alias = "ToEmailAddressNotify")]
    pub to: String,
    #[serde(alias = "MailGunApiUrl")]
    pub api_url: String,
    #[serde(alias = "MailGunApiKey")]
    pub api_key: String,
}

impl fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSettings")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl EmailSettings {
    pub fn recipients(&self) -> Vec<&str> {
        self.to
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl MonitorConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_seconds > MAX_POLL_INTERVAL_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_seconds must not exceed {MAX_POLL_INTERVAL_SECONDS}"
            )));
        }
        if self.email.recipients().is_empty() {
            return Err(ConfigError::Invalid(
                "email.to must list at least one recipient".to_string(),
            ));
        }
        if self.email.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("email.api_url must be set".to_string()));
        }
        Ok(())
    }

    /// Job names that appear with more than one machine. The check tracker is keyed
    /// by name alone, so these watches share one dedup entry.
    pub fn colliding_job_names(&self) -> Vec<&str> {
        let mut machines_by_name: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for job in &self.jobs {
            machines_by_name
                .entry(job.name.as_str())
                .or_default()
                .insert(job.machine.as_str());
        }
        machines_by_name
            .into_iter()
            .filter(|(_, machines)| machines.len() > 1)
            .map(|(name, _)| name)
            .collect()
    }
}

/// Supplies the current configuration on demand.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<MonitorConfig, ConfigError>;
}

/// Reads the configuration from a file on every call.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<MonitorConfig, ConfigError> {
        debug!(path = ?self.path, "Loading monitor config.");
        let raw = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.display().to_string(),
            source,
        })?;

        let config = if self.is_json() {
            MonitorConfig::from_json_str(&raw)?
        } else {
            MonitorConfig::from_toml_str(&raw)?
        };

        for name in config.colliding_job_names() {
            warn!(
                job = %name,
                "Job name is watched on more than one machine; these watches share a single dedup entry."
            );
        }
        Ok(config)
    }
}
