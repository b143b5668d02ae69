//! Client configuration: JSON file, then environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attachment::AttachmentLimits;
use crate::request_client::RetryPolicy;

pub const ENV_ENDPOINT: &str = "NEEDLELOG_ENDPOINT";
pub const ENV_TOKEN: &str = "NEEDLELOG_TOKEN";
pub const ENV_MAX_RETRIES: &str = "NEEDLELOG_MAX_RETRIES";
pub const ENV_RETRY_DELAY_MS: &str = "NEEDLELOG_RETRY_DELAY_MS";
pub const ENV_QUEUE_PATH: &str = "NEEDLELOG_QUEUE_PATH";
pub const ENV_QUEUE_CAPACITY: &str = "NEEDLELOG_QUEUE_CAPACITY";
pub const ENV_SYNC_INTERVAL_SECS: &str = "NEEDLELOG_SYNC_INTERVAL_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("no backend endpoint configured (set NEEDLELOG_ENDPOINT or `endpoint` in the config file)")]
    MissingEndpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub use_fallback: bool,
    pub retry_structural: bool,
    /// SQLite file for the offline queue; `None` uses the OS data directory.
    pub queue_path: Option<PathBuf>,
    pub queue_capacity: usize,
    pub sync_interval_secs: u64,
    pub max_image_bytes: u64,
    pub image_types: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            max_retries: 3,
            retry_delay_ms: 1000,
            use_fallback: true,
            retry_structural: false,
            queue_path: None,
            queue_capacity: 100,
            sync_interval_secs: 30,
            max_image_bytes: 5 * 1024 * 1024,
            image_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/jpg".to_string(),
            ],
        }
    }
}

impl ClientConfig {
    /// Load from an optional JSON file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env(|var| std::env::var(var).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_ENDPOINT) {
            self.endpoint = Some(v);
        }
        if let Some(v) = lookup(ENV_TOKEN) {
            self.token = Some(v).filter(|t| !t.is_empty());
        }
        if let Some(v) = lookup(ENV_MAX_RETRIES) {
            self.max_retries = parse_env(ENV_MAX_RETRIES, v)?;
        }
        if let Some(v) = lookup(ENV_RETRY_DELAY_MS) {
            self.retry_delay_ms = parse_env(ENV_RETRY_DELAY_MS, v)?;
        }
        if let Some(v) = lookup(ENV_QUEUE_PATH) {
            self.queue_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_QUEUE_CAPACITY) {
            self.queue_capacity = parse_env(ENV_QUEUE_CAPACITY, v)?;
        }
        if let Some(v) = lookup(ENV_SYNC_INTERVAL_SECS) {
            self.sync_interval_secs = parse_env(ENV_SYNC_INTERVAL_SECS, v)?;
        }
        Ok(self)
    }

    pub fn endpoint(&self) -> Result<&str, ConfigError> {
        self.endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(ConfigError::MissingEndpoint)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            use_fallback: self.use_fallback,
            retry_structural: self.retry_structural,
        }
    }

    pub fn attachment_limits(&self) -> AttachmentLimits {
        AttachmentLimits {
            max_bytes: self.max_image_bytes,
            allowed_types: self.image_types.clone(),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}
