//! Security layer configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::origin::DEFAULT_TRUSTED_SCHEMES;
use crate::domain::policy::DEFAULT_SECURE_CHANNELS;
use crate::domain::replay::{EvictionPolicy, ReplayGuardConfig};

/// Upper bound on `max_cached_nonces`.
pub const MAX_CACHED_NONCES_LIMIT: usize = 1_000_000;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid window: {0}")]
    InvalidWindow(String),
    #[error("Invalid replay cache setting: {0}")]
    InvalidCache(String),
    #[error("Invalid origin setting: {0}")]
    InvalidOrigin(String),
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Main security layer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum accepted message age (default: 30s)
    pub freshness_window_ms: u64,
    /// Maximum accepted future timestamp offset (default: 5s)
    pub max_future_skew_ms: u64,
    /// Replay cache sweep interval (default: 5 minutes)
    pub sweep_interval_ms: u64,
    /// Nominal replay cache capacity (default: 1000)
    pub max_cached_nonces: usize,
    /// Whole-cache eviction clears above this share of capacity (default: 80)
    pub clear_threshold_percent: u8,
    /// Replay cache eviction strategy
    pub eviction: EvictionPolicy,
    /// URL schemes of content the application loads itself
    pub trusted_schemes: Vec<String>,
    /// Exact development-server origins, e.g. `http://localhost:5173`
    pub dev_origins: Vec<String>,
    /// Operations that require the authenticated envelope at startup
    pub secure_channels: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            freshness_window_ms: 30_000,
            max_future_skew_ms: 5_000,
            sweep_interval_ms: 5 * 60 * 1_000,
            max_cached_nonces: 1_000,
            clear_threshold_percent: 80,
            eviction: EvictionPolicy::TimeIndexed,
            trusted_schemes: DEFAULT_TRUSTED_SCHEMES.iter().map(|s| s.to_string()).collect(),
            dev_origins: Vec::new(),
            secure_channels: DEFAULT_SECURE_CHANNELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SecurityConfig {
    /// Parse from the host's JSON settings. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.freshness_window_ms == 0 {
            return Err(ConfigError::InvalidWindow(
                "freshness_window_ms cannot be 0".into(),
            ));
        }

        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidWindow(
                "sweep_interval_ms cannot be 0".into(),
            ));
        }

        if self.max_cached_nonces == 0 {
            return Err(ConfigError::InvalidCache(
                "max_cached_nonces cannot be 0".into(),
            ));
        }

        if self.max_cached_nonces > MAX_CACHED_NONCES_LIMIT {
            return Err(ConfigError::InvalidCache(format!(
                "max_cached_nonces must be at most {MAX_CACHED_NONCES_LIMIT}, got {}",
                self.max_cached_nonces
            )));
        }

        if self.clear_threshold_percent == 0 || self.clear_threshold_percent > 100 {
            return Err(ConfigError::InvalidCache(format!(
                "clear_threshold_percent must be in 1..=100, got {}",
                self.clear_threshold_percent
            )));
        }

        if self.trusted_schemes.is_empty() {
            return Err(ConfigError::InvalidOrigin(
                "trusted_schemes cannot be empty".into(),
            ));
        }

        if let Some(bad) = self
            .trusted_schemes
            .iter()
            .find(|s| s.is_empty() || s.contains(':') || s.contains('/'))
        {
            return Err(ConfigError::InvalidOrigin(format!(
                "trusted scheme '{bad}' must be a bare scheme name"
            )));
        }

        if let Some(bad) = self.dev_origins.iter().find(|o| !o.contains("://")) {
            return Err(ConfigError::InvalidOrigin(format!(
                "dev origin '{bad}' must be an absolute origin"
            )));
        }

        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn replay_guard_config(&self) -> ReplayGuardConfig {
        ReplayGuardConfig {
            freshness_window_ms: self.freshness_window_ms,
            max_future_skew_ms: self.max_future_skew_ms,
            max_entries: self.max_cached_nonces,
            clear_threshold_percent: self.clear_threshold_percent,
            eviction: self.eviction,
        }
    }
}
