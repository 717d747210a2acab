//! samplesink - resilient columnar-store relay for load-test telemetry
//!
//! Receives a continuous stream of time-series samples from concurrent
//! producer threads and durably relays them, in batches, to a columnar
//! analytical store. The hard part is staying correct when the store is
//! unreliable: writes are transactional, transient failures are retried
//! with capped exponential backoff, exhausted failures are parked in a
//! bounded in-memory failover buffer and replayed ahead of new data, and
//! commit-ambiguous outcomes are accepted rather than risk duplicates.
//! Delivery is at-least-once.
//!
//! # Architecture
//!
//! ```text
//! [Producers] --push--> [SampleBuffer] --timer tick--> [SampleSink::flush]
//!                                                           |
//!                    [FailoverBuffer] --replay first--------+
//!                           ^                               |
//!                           |  exhausted retries     [SampleSchema::convert]
//!                           +-------------------+           |
//!                                               |    [StoreTransaction]
//!                                               +----<------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use samplesink::{MetricKind, Sample, SampleSink, SchemaRegistry, SinkConfig};
//!
//! let registry = SchemaRegistry::with_defaults();
//! let config = SinkConfig::default()
//!     .with_url("http://localhost:8123")
//!     .with_database("loadtest")
//!     .with_table("samples");
//!
//! let sink = SampleSink::new(config, store, &registry)?;
//! sink.start().await?;
//!
//! sink.add(Sample::new("http_reqs", MetricKind::Counter, 1.0)
//!     .with_tag("url", "/api/health"));
//!
//! sink.stop().await?;
//! ```

/// Sink configuration with defaults and builders
pub mod config;

/// Error taxonomy and transient-failure classification
pub mod error;

/// Bounded failover buffer with configurable drop policy
pub mod failover;

/// Atomic sink metrics
pub mod metrics;

/// Pooled rows and tag maps
pub mod pool;

/// Bounded exponential-backoff retry engine
pub mod retry;

/// Sample types and the producer-facing buffer
pub mod sample;

/// Sample-to-row conversion contract and registry
pub mod schema;

/// The flush orchestrator and lifecycle controller
pub mod sink;

/// Store boundary traits
pub mod store;

// =============================================================================
// Public re-exports
// =============================================================================

pub use config::SinkConfig;
pub use error::{SinkError, StoreError};
pub use failover::{DropPolicy, Dropped, FailoverBuffer};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use pool::{PoolSnapshot, RowPool};
pub use retry::RetryPolicy;
pub use sample::{MetricKind, Sample, SampleBatch, SampleBuffer};
pub use schema::{
    ColumnValue, Row, SampleSchema, SchemaRegistry, TagMap, TagMapSchema, WideTagSchema,
};
pub use sink::SampleSink;
pub use store::{Store, StoreConnection, StoreTransaction};
