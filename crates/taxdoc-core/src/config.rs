//! Engine configuration
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! io_timeout_ms = 30000
//! retry_backoff_ms = 250
//! retrieval_url_ttl_secs = 900
//! mapping_cache_capacity = 64
//! max_dependent_rows = 4
//! log_format = "json"
//! ```

use crate::error::EngineError;
use crate::telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound on each mapping load, template fetch and artifact store call
    pub io_timeout_ms: u64,
    /// Pause before the single retry of a transient failure
    pub retry_backoff_ms: u64,
    /// Lifetime of issued retrieval URLs
    pub retrieval_url_ttl_secs: u64,
    /// Cached flattened mappings
    pub mapping_cache_capacity: u64,
    /// Dependent rows on the form; later dependents are not rendered
    pub max_dependent_rows: usize,
    /// Log output format
    pub log_format: LogFormat,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML
    ///
    /// # Errors
    /// `EngineError::Config` on malformed TOML or unknown value types.
    pub fn from_toml_str(raw: &str) -> Result<Self, EngineError> {
        toml::from_str(raw).map_err(|e| EngineError::Config {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `EngineError::Config` when the file is unreadable or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// With I/O timeout
    #[inline]
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    /// With retry backoff
    #[inline]
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With dependent row limit
    #[inline]
    #[must_use]
    pub fn with_max_dependent_rows(mut self, rows: usize) -> Self {
        self.max_dependent_rows = rows;
        self
    }

    #[inline]
    #[must_use]
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    #[inline]
    #[must_use]
    pub fn retrieval_url_ttl(&self) -> Duration {
        Duration::from_secs(self.retrieval_url_ttl_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            io_timeout_ms: 30_000,
            retry_backoff_ms: 250,
            retrieval_url_ttl_secs: 15 * 60,
            mapping_cache_capacity: taxdoc_mapping::DEFAULT_CACHE_CAPACITY,
            max_dependent_rows: 4,
            log_format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = EngineConfig::from_toml_str(
            "io_timeout_ms = 5000\nmax_dependent_rows = 2\nlog_format = \"json\"\n",
        )
        .unwrap();
        assert_eq!(config.io_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_dependent_rows, 2);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.retry_backoff(), Duration::from_millis(250));
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("io_timeout_ms = \"soon\"").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "retrieval_url_ttl_secs = 60\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.retrieval_url_ttl(), Duration::from_secs(60));

        let missing = EngineConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, EngineError::Config { .. }));
    }

    #[test]
    fn builders() {
        let config = EngineConfig::new()
            .with_io_timeout(Duration::from_millis(10))
            .with_retry_backoff(Duration::from_millis(5))
            .with_max_dependent_rows(3);
        assert_eq!(config.io_timeout(), Duration::from_millis(10));
        assert_eq!(config.retry_backoff_ms, 5);
        assert_eq!(config.max_dependent_rows, 3);
    }

    #[test]
    fn sub_second_timeout_kept() {
        let config = EngineConfig::new().with_io_timeout(Duration::from_millis(1_500));
        assert_eq!(config.io_timeout_ms, 1_500);
        assert_eq!(config.io_timeout(), Duration::from_millis(1_500));
        assert_eq!(EngineConfig::new().with_io_timeout(Duration::ZERO).io_timeout_ms, 1);
    }
}
