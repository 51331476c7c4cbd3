use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use streambuf_api::StoreLimits;
use streambuf_sender_http::HttpSenderConfig;

use crate::error::EngineError;
use crate::scheduler::FlushStrategy;

/// Root configuration, parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Store backend.
    #[serde(default)]
    pub storage: StorageKind,

    /// Namespaces the database file: `<data_dir>/<storage_id>.db`.
    #[serde(default = "default_storage_id")]
    pub storage_id: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Per-stream send window, in records.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Cache cap in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Per-stream send window, in bytes. Falls back to `max_bytes`.
    #[serde(default)]
    pub window_max_bytes: Option<u64>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Automatic flush period. `0` disables the timer.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    pub sender: HttpSenderConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    Memory,
}

fn default_storage_id() -> String {
    "default".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_max_records() -> usize {
    500
}
fn default_max_bytes() -> u64 {
    5 * 1024 * 1024
}
fn default_max_retries() -> u32 {
    3
}
fn default_flush_interval_secs() -> u64 {
    30
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| EngineError::Io { path: path.to_string(), source })?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.limits().validate().map_err(EngineError::Config)?;
        if self.sender.endpoint.is_empty() {
            return Err(EngineError::Config("sender.endpoint must not be empty".into()));
        }
        if self.storage == StorageKind::Sqlite && self.storage_id.is_empty() {
            return Err(EngineError::Config("storage_id must not be empty".into()));
        }
        Ok(())
    }

    pub fn limits(&self) -> StoreLimits {
        StoreLimits {
            max_bytes: self.max_bytes,
            window_max_records: self.max_records,
            window_max_bytes: self.window_max_bytes.unwrap_or(self.max_bytes),
        }
    }

    pub fn flush_strategy(&self) -> FlushStrategy {
        match self.flush_interval_secs {
            0 => FlushStrategy::Manual,
            secs => FlushStrategy::Interval(Duration::from_secs(secs)),
        }
    }
}
