//! # Controller Configuration
//!
//! Tunables of the decision engine, loaded from TOML.
//!
//! ```toml
//! [controller]
//! cache_expiry_ms = 30000
//! min_request_interval_ms = 1000
//! active_member_window_ms = 125000
//! recent_log_capacity = 25
//! credential_time_max_delta_ms = 3600000
//! rate_limit_retention_ms = 60000
//! circuit_test_ttl_ms = 300000
//! diagnostics_channel_capacity = 1024
//! ```

use super::errors::ConfigError;
use super::member::DEFAULT_RECENT_LOG_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Cache entries older than this are refreshed from the store.
pub const DEFAULT_CACHE_EXPIRY_MS: u64 = 30_000;

/// Minimum spacing of accepted requests per (network, node).
pub const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 1_000;

/// A member seen within this window counts as active.
pub const DEFAULT_ACTIVE_MEMBER_WINDOW_MS: u64 = 125_000;

/// Upper bound on accepted credential age.
pub const DEFAULT_CREDENTIAL_TIME_MAX_DELTA_MS: u64 = 3_600_000;

/// Idle rate-limit keys are purged after this long.
pub const DEFAULT_RATE_LIMIT_RETENTION_MS: u64 = 60_000;

/// Circuit tests are dropped after this long.
pub const DEFAULT_CIRCUIT_TEST_TTL_MS: u64 = 300_000;

/// Bounded capacity of the diagnostics channel.
pub const DEFAULT_DIAGNOSTICS_CHANNEL_CAPACITY: usize = 1_024;

/// Decision engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Cache entry lifetime
    pub cache_expiry_ms: u64,
    /// Per-requester minimum interval, `0` disables rate limiting
    pub min_request_interval_ms: u64,
    /// Liveness window for the active member count
    pub active_member_window_ms: u64,
    /// Activity log entries kept per member
    pub recent_log_capacity: usize,
    /// Default credential time delta handed to members
    pub credential_time_max_delta_ms: u64,
    /// Idle time before a rate-limit key is purged
    pub rate_limit_retention_ms: u64,
    /// Lifetime of a registered circuit test
    pub circuit_test_ttl_ms: u64,
    /// Diagnostics channel capacity
    pub diagnostics_channel_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cache_expiry_ms: DEFAULT_CACHE_EXPIRY_MS,
            min_request_interval_ms: DEFAULT_MIN_REQUEST_INTERVAL_MS,
            active_member_window_ms: DEFAULT_ACTIVE_MEMBER_WINDOW_MS,
            recent_log_capacity: DEFAULT_RECENT_LOG_CAPACITY,
            credential_time_max_delta_ms: DEFAULT_CREDENTIAL_TIME_MAX_DELTA_MS,
            rate_limit_retention_ms: DEFAULT_RATE_LIMIT_RETENTION_MS,
            circuit_test_ttl_ms: DEFAULT_CIRCUIT_TEST_TTL_MS,
            diagnostics_channel_capacity: DEFAULT_DIAGNOSTICS_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    controller: ControllerConfig,
}

impl ControllerConfig {
    /// Config for tests: no rate limiting.
    pub fn for_testing() -> Self {
        Self {
            min_request_interval_ms: 0,
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.controller.validate()?;
        Ok(file.controller)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recent_log_capacity == 0 {
            return Err(ConfigError::Invalid(
                "recent_log_capacity must be at least 1".to_string(),
            ));
        }
        if self.diagnostics_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "diagnostics_channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.cache_expiry_ms == 0 {
            return Err(ConfigError::Invalid(
                "cache_expiry_ms must be positive".to_string(),
            ));
        }
        if self.active_member_window_ms == 0 {
            return Err(ConfigError::Invalid(
                "active_member_window_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ControllerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.cache_expiry_ms, 30_000);
        assert_eq!(config.active_member_window_ms, 125_000);
        assert_eq!(config.recent_log_capacity, 25);
    }

    #[test]
    fn test_partial_override() {
        let config = ControllerConfig::from_toml_str(
            r#"
            [controller]
            min_request_interval_ms = 250
            recent_log_capacity = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.min_request_interval_ms, 250);
        assert_eq!(config.recent_log_capacity, 5);
        assert_eq!(config.cache_expiry_ms, DEFAULT_CACHE_EXPIRY_MS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = ControllerConfig::from_toml_str("[controller]\nrecent_log_capacity = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = ControllerConfig::from_toml_str("[controller]\ncache_expiry_ms = \"soon\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ControllerConfig::load("/nonexistent/oc-controller.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
