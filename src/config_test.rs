//! Tests for sink configuration

use std::time::Duration;

use super::*;

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn test_defaults() {
    let config = SinkConfig::default();

    assert_eq!(config.url, "http://localhost:8123");
    assert_eq!(config.database, "default");
    assert_eq!(config.table, "samples");
    assert!(config.username.is_none());
    assert!(config.password.is_none());
    assert_eq!(config.schema, "default");
    assert_eq!(config.flush_interval, Duration::from_secs(1));
    assert_eq!(config.retry_attempts, 3);
    assert_eq!(config.retry_base_delay, Duration::from_millis(100));
    assert_eq!(config.retry_max_delay, Duration::from_secs(10));
    assert!(config.failover_enabled);
    assert_eq!(config.failover_capacity, 64);
    assert_eq!(config.failover_policy, DropPolicy::DropOldest);
    assert_eq!(config.pool_size, 1024);
    assert!(!config.skip_schema_creation);
    assert_eq!(config.drain_timeout, Duration::from_secs(10));
    assert_eq!(config.cancel_check_interval, 1000);
    assert!(config.validate().is_ok());
}

// =============================================================================
// Builders
// =============================================================================

#[test]
fn test_builders() {
    let config = SinkConfig::default()
        .with_url("http://ch.internal:8123")
        .with_database("metrics")
        .with_table("load_samples")
        .with_credentials("writer", "secret")
        .with_schema("wide")
        .with_flush_interval(Duration::from_millis(250))
        .with_retry_attempts(5)
        .with_retry_delays(Duration::from_millis(50), Duration::from_secs(5))
        .with_failover(128, DropPolicy::DropNewest)
        .with_skip_schema_creation()
        .with_drain_timeout(Duration::from_secs(3));

    assert_eq!(config.url, "http://ch.internal:8123");
    assert_eq!(config.database, "metrics");
    assert_eq!(config.table, "load_samples");
    assert_eq!(config.username.as_deref(), Some("writer"));
    assert_eq!(config.password.as_deref(), Some("secret"));
    assert_eq!(config.schema, "wide");
    assert_eq!(config.flush_interval, Duration::from_millis(250));
    assert_eq!(config.retry_attempts, 5);
    assert_eq!(config.retry_base_delay, Duration::from_millis(50));
    assert_eq!(config.retry_max_delay, Duration::from_secs(5));
    assert!(config.failover_enabled);
    assert_eq!(config.failover_capacity, 128);
    assert_eq!(config.failover_policy, DropPolicy::DropNewest);
    assert!(config.skip_schema_creation);
    assert_eq!(config.drain_timeout, Duration::from_secs(3));
    assert!(config.validate().is_ok());
}

#[test]
fn test_without_failover() {
    let config = SinkConfig::default().without_failover();
    assert!(!config.failover_enabled);
    assert!(config.validate().is_ok());
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validate_rejects_empty_url() {
    let config = SinkConfig::default().with_url("");
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_bad_identifiers() {
    let config = SinkConfig::default().with_database("drop table; --");
    assert!(config.validate().is_err());

    let config = SinkConfig::default().with_table("1samples");
    assert!(config.validate().is_err());

    let config = SinkConfig::default().with_table("");
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_zero_flush_interval() {
    let config = SinkConfig::default().with_flush_interval(Duration::ZERO);
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_zero_failover_capacity() {
    let mut config = SinkConfig::default();
    config.failover_capacity = 0;
    assert!(config.validate().is_err());

    // Irrelevant once failover is off.
    let config = config.without_failover();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_zero_pool_size() {
    let mut config = SinkConfig::default();
    config.pool_size = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_zero_cancel_check_interval() {
    let mut config = SinkConfig::default();
    config.cancel_check_interval = 0;
    assert!(config.validate().is_err());
}

// =============================================================================
// Deserialization
// =============================================================================

#[test]
fn test_deserialize_full() {
    let toml = r#"
        url = "http://ch:8123"
        database = "metrics"
        table = "samples_v2"
        username = "writer"
        password = "secret"
        schema = "wide"
        flush_interval = "500ms"
        retry_attempts = 2
        retry_base_delay = "25ms"
        retry_max_delay = "2s"
        failover_enabled = true
        failover_capacity = 32
        failover_policy = "drop_newest"
        pool_size = 256
        skip_schema_creation = true
        drain_timeout = "5s"
        cancel_check_interval = 500
    "#;

    let config: SinkConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.url, "http://ch:8123");
    assert_eq!(config.database, "metrics");
    assert_eq!(config.table, "samples_v2");
    assert_eq!(config.username.as_deref(), Some("writer"));
    assert_eq!(config.schema, "wide");
    assert_eq!(config.flush_interval, Duration::from_millis(500));
    assert_eq!(config.retry_attempts, 2);
    assert_eq!(config.retry_base_delay, Duration::from_millis(25));
    assert_eq!(config.retry_max_delay, Duration::from_secs(2));
    assert_eq!(config.failover_capacity, 32);
    assert_eq!(config.failover_policy, DropPolicy::DropNewest);
    assert_eq!(config.pool_size, 256);
    assert!(config.skip_schema_creation);
    assert_eq!(config.drain_timeout, Duration::from_secs(5));
    assert_eq!(config.cancel_check_interval, 500);
}

#[test]
fn test_deserialize_partial_fills_defaults() {
    let config: SinkConfig = toml::from_str(r#"url = "http://ch:8123""#).unwrap();
    assert_eq!(config.url, "http://ch:8123");
    assert_eq!(config.table, "samples");
    assert_eq!(config.flush_interval, Duration::from_secs(1));
    assert!(config.failover_enabled);
}

#[test]
fn test_deserialize_empty_is_all_defaults() {
    let config: SinkConfig = toml::from_str("").unwrap();
    assert_eq!(config.url, "http://localhost:8123");
    assert!(config.validate().is_ok());
}
