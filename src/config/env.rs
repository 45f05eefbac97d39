use std::{path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    /// Local Bot API server; `None` talks to api.telegram.org.
    pub telegram_api_url: Option<Url>,
    pub target_group: GroupTarget,
    pub sender_username: Option<String>,
    pub known_chat_ids: Vec<i64>,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone)]
pub struct GroupTarget {
    pub name: String,
    pub id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub downloads_dir: String,
    pub db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub urls_file: PathBuf,
    pub send_delay: Duration,
    pub on_failure: SendFailurePolicy,
}

/// What the dispatch loop does when a single send fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendFailurePolicy {
    /// Stop the run and report the error.
    #[default]
    Abort,
    /// Log the failure and move on to the next URL.
    Skip,
}

impl FromStr for SendFailurePolicy {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(()),
        }
    }
}

impl AppConfig {
    /// Sender filter for the capture workflow, which cannot run without one.
    pub fn require_sender(&self) -> Result<&str, ConfigError> {
        self.sender_username
            .as_deref()
            .ok_or(ConfigError::Missing("SENDER_USERNAME"))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
