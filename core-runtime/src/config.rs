//! # Core Configuration Module
//!
//! Settings for a revocation run.
//!
//! ## Overview
//!
//! The configuration uses a builder pattern to construct a `RevokeConfig`.
//! Every numeric setting has a default; only the database path is required.
//! `build()` validates eagerly so a bad value is reported before any remote
//! call is made or any state is touched.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::RevokeConfig;
//! use std::time::Duration;
//!
//! let config = RevokeConfig::builder()
//!     .database_path("/path/to/state.db")
//!     .time_budget(Duration::from_secs(300))
//!     .page_size(100)
//!     .build()?;
//! # Ok::<(), core_runtime::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::RevokeConfig;
//!
//! // Panics: no database path
//! let config = RevokeConfig::builder()
//!     .build()
//!     .expect("Should fail - missing database path");
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Drive rejects page sizes above this.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Upper bound on attempts per remote operation.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Validated settings for one account's revocation run.
#[derive(Debug, Clone, PartialEq)]
pub struct RevokeConfig {
    /// SQLite file holding run state and the audit log
    pub database_path: PathBuf,

    /// Wall-clock budget for a single `continue` invocation
    pub time_budget: Duration,

    /// Delay between scheduled `continue` invocations
    pub schedule_interval: Duration,

    /// Items requested per listing page
    pub page_size: u32,

    /// Items between mid-phase checkpoints and progress logs
    pub checkpoint_interval: u64,

    /// Total attempts per remote operation, first try included
    pub max_attempts: u32,

    /// Backoff before the first retry
    pub base_delay: Duration,

    /// Factor applied to the backoff after each retry
    pub backoff_multiplier: f64,

    /// Ceiling for a single backoff delay
    pub max_delay: Duration,

    /// Pause after every successful remote call
    pub success_delay: Duration,

    /// Capacity of the event broadcast channel
    pub event_buffer_size: usize,
}

impl RevokeConfig {
    pub fn builder() -> RevokeConfigBuilder {
        RevokeConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.time_budget.is_zero() {
            return Err(Error::Config(
                "Time budget must be greater than zero".to_string(),
            ));
        }

        if self.schedule_interval.is_zero() {
            return Err(Error::Config(
                "Schedule interval must be greater than zero".to_string(),
            ));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.checkpoint_interval == 0 {
            return Err(Error::Config(
                "Checkpoint interval must be greater than zero".to_string(),
            ));
        }

        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(Error::Config(format!(
                "Max attempts must be between 1 and {}, got {}",
                MAX_ATTEMPTS_LIMIT, self.max_attempts
            )));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::Config(format!(
                "Backoff multiplier must be at least 1.0, got {}",
                self.backoff_multiplier
            )));
        }

        if self.max_delay < self.base_delay {
            return Err(Error::Config(
                "Max delay cannot be shorter than the base delay".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing [`RevokeConfig`] instances.
#[derive(Debug, Default)]
pub struct RevokeConfigBuilder {
    database_path: Option<PathBuf>,
    time_budget: Option<Duration>,
    schedule_interval: Option<Duration>,
    page_size: Option<u32>,
    checkpoint_interval: Option<u64>,
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
    backoff_multiplier: Option<f64>,
    max_delay: Option<Duration>,
    success_delay: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl RevokeConfigBuilder {
    /// Sets the database path (required).
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Defaults to 5 minutes.
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Defaults to 1 minute.
    pub fn schedule_interval(mut self, interval: Duration) -> Self {
        self.schedule_interval = Some(interval);
        self
    }

    /// Defaults to 100.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Defaults to 100.
    pub fn checkpoint_interval(mut self, items: u64) -> Self {
        self.checkpoint_interval = Some(items);
        self
    }

    /// Defaults to 5.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = Some(delay);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the database path is missing or any
    /// value is out of range.
    pub fn build(self) -> Result<RevokeConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let config = RevokeConfig {
            database_path,
            time_budget: self.time_budget.unwrap_or(Duration::from_secs(5 * 60)),
            schedule_interval: self.schedule_interval.unwrap_or(Duration::from_secs(60)),
            page_size: self.page_size.unwrap_or(100),
            checkpoint_interval: self.checkpoint_interval.unwrap_or(100),
            max_attempts: self.max_attempts.unwrap_or(5),
            base_delay: self.base_delay.unwrap_or(Duration::from_millis(100)),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(2.0),
            max_delay: self.max_delay.unwrap_or(Duration::from_secs(30)),
            success_delay: self.success_delay.unwrap_or(Duration::from_millis(100)),
            event_buffer_size: self.event_buffer_size.unwrap_or(100),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RevokeConfig::builder()
            .database_path("/tmp/state.db")
            .build()
            .unwrap();

        assert_eq!(config.time_budget, Duration::from_secs(300));
        assert_eq!(config.schedule_interval, Duration::from_secs(60));
        assert_eq!(config.page_size, 100);
        assert_eq!(config.checkpoint_interval, 100);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay, Duration::from_millis(100));
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.success_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_missing_database_path() {
        let result = RevokeConfig::builder().build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Database path is required"));
    }

    #[test]
    fn test_zero_time_budget_rejected() {
        let result = RevokeConfig::builder()
            .database_path("/tmp/state.db")
            .time_budget(Duration::ZERO)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_page_size_bounds() {
        for bad in [0, MAX_PAGE_SIZE + 1] {
            let result = RevokeConfig::builder()
                .database_path("/tmp/state.db")
                .page_size(bad)
                .build();
            assert!(result.is_err(), "page size {} accepted", bad);
        }

        let config = RevokeConfig::builder()
            .database_path("/tmp/state.db")
            .page_size(MAX_PAGE_SIZE)
            .build()
            .unwrap();
        assert_eq!(config.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_retry_settings_validated() {
        assert!(RevokeConfig::builder()
            .database_path("/tmp/state.db")
            .max_attempts(0)
            .build()
            .is_err());

        assert!(RevokeConfig::builder()
            .database_path("/tmp/state.db")
            .backoff_multiplier(0.5)
            .build()
            .is_err());

        assert!(RevokeConfig::builder()
            .database_path("/tmp/state.db")
            .base_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(1))
            .build()
            .is_err());
    }

    #[test]
    fn test_zero_checkpoint_interval_rejected() {
        let result = RevokeConfig::builder()
            .database_path("/tmp/state.db")
            .checkpoint_interval(0)
            .build();

        assert!(result.is_err());
    }
}
