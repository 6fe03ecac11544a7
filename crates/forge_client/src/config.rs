//! Client configuration types.
//!
//! Settings are resolved in layers: built-in defaults, then
//! `.forge/settings.toml` under the working directory, then the
//! `FORGE_API_URL` environment variable. The CLI applies its own flag last.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Environment variable holding the service base URL.
pub const API_URL_ENV: &str = "FORGE_API_URL";

/// Default suggested name for exported bundles.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "aegis_project.zip";

/// Retry and timeout policy for a single logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wall-clock budget for each attempt.
    pub timeout: Duration,
    /// Base unit of the linear backoff.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeout: Duration::from_secs(90),
            backoff_base: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// One attempt, no backoff. Used by the liveness probe.
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            timeout,
            backoff_base: Duration::ZERO,
        }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after a failed attempt `attempt` (0-based) before the next one:
    /// `backoff_base * (attempt + 1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt.saturating_add(1))
    }
}

/// User-facing settings, as stored in `.forge/settings.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeSettings {
    /// Base URL of the generation service (e.g. `http://localhost:8000`)
    pub api_url: Option<String>,
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Linear backoff unit in milliseconds
    pub backoff_base_ms: u64,
    /// Seconds between liveness probes
    pub probe_interval_secs: u64,
    /// Suggested file name for exported bundles
    pub export_file_name: String,
}

impl Default for ForgeSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_secs: 90,
            max_retries: 2,
            backoff_base_ms: 1000,
            probe_interval_secs: 15,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
        }
    }
}

impl ForgeSettings {
    /// Load settings for a workspace: file layer then environment layer.
    pub fn load(workspace_root: &Path) -> ClientResult<Self> {
        let mut settings = Self::from_file(workspace_root)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Read `.forge/settings.toml`, falling back to defaults when absent.
    pub fn from_file(workspace_root: &Path) -> ClientResult<Self> {
        let path = workspace_root.join(".forge").join("settings.toml");
        if !path.exists() {
            return Ok(Self::default());
        }

        debug!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ClientError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| ClientError::Configuration(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Override the base URL from `FORGE_API_URL` when it is set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_url = Some(url);
            }
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .max_retries(self.max_retries)
            .timeout(Duration::from_secs(self.timeout_secs))
            .backoff_base(Duration::from_millis(self.backoff_base_ms))
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }
}
