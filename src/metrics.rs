//! Sink metrics
//!
//! Atomic counters for tracking flush pipeline health. Counters only ever
//! increase and are read lock-free, so a monitoring reader never contends
//! with the write path.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the sample sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Samples confirmed (or optimistically assumed) written to the store
    pub samples_processed: AtomicU64,

    /// Samples skipped because they could not be converted to a row
    pub conversion_failures: AtomicU64,

    /// Row write calls that failed (one per failed attempt)
    pub insert_failures: AtomicU64,

    /// Flush cycles that exhausted their retry budget
    pub flush_failures: AtomicU64,

    /// Retry attempts across all flush cycles
    pub retry_count: AtomicU64,

    /// Samples lost to failover overflow or disabled buffering
    pub dropped_samples: AtomicU64,

    /// Batches parked in the failover buffer
    pub batches_buffered: AtomicU64,
}

impl SinkMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            samples_processed: AtomicU64::new(0),
            conversion_failures: AtomicU64::new(0),
            insert_failures: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            retry_count: AtomicU64::new(0),
            dropped_samples: AtomicU64::new(0),
            batches_buffered: AtomicU64::new(0),
        }
    }

    /// Record samples written to the store
    #[inline]
    pub fn record_processed(&self, count: u64) {
        self.samples_processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a sample that failed conversion
    #[inline]
    pub fn record_conversion_failure(&self) {
        self.conversion_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed row write
    #[inline]
    pub fn record_insert_failure(&self) {
        self.insert_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flush cycle that failed after retries
    #[inline]
    pub fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record samples lost
    #[inline]
    pub fn record_dropped(&self, count: u64) {
        self.dropped_samples.fetch_add(count, Ordering::Relaxed);
    }

    /// Record batches handed to the failover buffer
    #[inline]
    pub fn record_buffered(&self, count: u64) {
        self.batches_buffered.fetch_add(count, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot of all counters
    ///
    /// Failover occupancy fields are filled in by the sink, which owns the
    /// failover buffer.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_processed: self.samples_processed.load(Ordering::Relaxed),
            conversion_failures: self.conversion_failures.load(Ordering::Relaxed),
            insert_failures: self.insert_failures.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            retry_count: self.retry_count.load(Ordering::Relaxed),
            dropped_samples: self.dropped_samples.load(Ordering::Relaxed),
            batches_buffered: self.batches_buffered.load(Ordering::Relaxed),
            failover_len: 0,
            failover_dropped: 0,
        }
    }
}

/// Point-in-time snapshot of sink metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub samples_processed: u64,
    pub conversion_failures: u64,
    pub insert_failures: u64,
    pub flush_failures: u64,
    pub retry_count: u64,
    pub dropped_samples: u64,
    pub batches_buffered: u64,
    /// Batches currently parked in the failover buffer
    pub failover_len: usize,
    /// Cumulative failover entries dropped to overflow
    pub failover_dropped: u64,
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod metrics_test;
