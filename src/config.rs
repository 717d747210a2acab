//! Sink configuration
//!
//! Deserializable from structured config (TOML and friends) with sensible
//! defaults, plus chainable builders for programmatic construction.

use std::time::Duration;

use serde::Deserialize;

use crate::error::SinkError;
use crate::failover::DropPolicy;
use crate::schema::validate_identifier;

// =============================================================================
// Constants
// =============================================================================

/// Default interval between flush cycles
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Default retry attempts after the initial write
pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;

/// Default base delay for exponential backoff
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default cap on the backoff delay
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// Default failover buffer capacity, in batches
pub const DEFAULT_FAILOVER_CAPACITY: usize = 64;

/// Default number of pre-allocated pooled rows
pub const DEFAULT_POOL_SIZE: usize = 1024;

/// Default window for the final failover drain during shutdown
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of samples written between cancellation checks
pub const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 1000;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the sample sink
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Store URL (e.g. "http://localhost:8123")
    pub url: String,

    /// Database name
    pub database: String,

    /// Table name
    pub table: String,

    /// Username for authentication (optional)
    pub username: Option<String>,

    /// Password for authentication (optional)
    pub password: Option<String>,

    /// Registered schema name to convert samples with
    pub schema: String,

    /// Interval between flush cycles
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Retry attempts after the initial write
    pub retry_attempts: usize,

    /// Base delay for exponential backoff
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,

    /// Maximum backoff delay
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,

    /// Whether failed batches are parked for replay
    pub failover_enabled: bool,

    /// Failover buffer capacity, in batches
    pub failover_capacity: usize,

    /// Failover overflow policy
    pub failover_policy: DropPolicy,

    /// Number of pre-allocated pooled rows
    pub pool_size: usize,

    /// Skip table creation on start
    pub skip_schema_creation: bool,

    /// Window for the final failover drain during shutdown
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,

    /// Samples written between cancellation checks inside one transaction
    pub cancel_check_interval: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".into(),
            database: "default".into(),
            table: "samples".into(),
            username: None,
            password: None,
            schema: "default".into(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
            failover_enabled: true,
            failover_capacity: DEFAULT_FAILOVER_CAPACITY,
            failover_policy: DropPolicy::DropOldest,
            pool_size: DEFAULT_POOL_SIZE,
            skip_schema_creation: false,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}

impl SinkConfig {
    /// Set the store URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the database name
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set authentication credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the schema name
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Set the flush interval
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the number of retry attempts
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the backoff delays
    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }

    /// Set the failover capacity and policy
    pub fn with_failover(mut self, capacity: usize, policy: DropPolicy) -> Self {
        self.failover_enabled = true;
        self.failover_capacity = capacity;
        self.failover_policy = policy;
        self
    }

    /// Disable failover buffering; failed batches are lost
    pub fn without_failover(mut self) -> Self {
        self.failover_enabled = false;
        self
    }

    /// Skip table creation on start
    pub fn with_skip_schema_creation(mut self) -> Self {
        self.skip_schema_creation = true;
        self
    }

    /// Set the shutdown drain window
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SinkError> {
        if self.url.is_empty() {
            return Err(SinkError::Config("url must not be empty".into()));
        }
        validate_identifier(&self.database)?;
        validate_identifier(&self.table)?;
        if self.flush_interval.is_zero() {
            return Err(SinkError::Config("flush_interval must be non-zero".into()));
        }
        if self.failover_enabled && self.failover_capacity == 0 {
            return Err(SinkError::Config(
                "failover_capacity must be at least 1 when failover is enabled".into(),
            ));
        }
        if self.pool_size == 0 {
            return Err(SinkError::Config("pool_size must be at least 1".into()));
        }
        if self.cancel_check_interval == 0 {
            return Err(SinkError::Config(
                "cancel_check_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
