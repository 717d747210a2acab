//! Lock-free pool of row vectors and tag maps
//!
//! Converting a sample allocates a positional row and usually a tag map.
//! At high sample rates that is one or two heap allocations per sample, so
//! both are pooled behind lock-free queues and recycled once the write
//! outcome for the row is known. Correctness never depends on reuse: an
//! empty pool simply falls back to fresh allocations.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

use crate::schema::{ColumnValue, Row, TagMap};

/// Pool of reusable rows and tag maps, sized to one schema's column count
pub struct RowPool {
    rows: ArrayQueue<Row>,
    tags: ArrayQueue<TagMap>,
    columns: usize,
    metrics: PoolMetrics,
}

/// Metrics for pool monitoring
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Pooled storage reused
    pub hits: AtomicU64,

    /// Fresh allocation because the pool was empty
    pub misses: AtomicU64,

    /// Rows returned to the pool
    pub returns: AtomicU64,

    /// Rows dropped because the pool was full
    pub drops: AtomicU64,
}

impl PoolMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            drops: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_drop(&self) {
        self.drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the pool counters
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of pool metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub returns: u64,
    pub drops: u64,
}

impl RowPool {
    /// Create a pool with `pool_size` pre-allocated rows and tag maps
    ///
    /// Each row vector is sized to `columns`, the schema's column count.
    pub fn new(pool_size: usize, columns: usize) -> Self {
        let rows = ArrayQueue::new(pool_size.max(1));
        let tags = ArrayQueue::new(pool_size.max(1));

        for _ in 0..pool_size {
            let _ = rows.push(Vec::with_capacity(columns));
            let _ = tags.push(TagMap::new());
        }

        Self {
            rows,
            tags,
            columns,
            metrics: PoolMetrics::new(),
        }
    }

    /// Get an empty row, recycled when possible
    #[inline]
    pub fn get_row(&self) -> Row {
        match self.rows.pop() {
            Some(row) => {
                self.metrics.record_hit();
                row
            }
            None => {
                self.metrics.record_miss();
                Vec::with_capacity(self.columns)
            }
        }
    }

    /// Get an empty tag map, recycled when possible
    #[inline]
    pub fn get_tags(&self) -> TagMap {
        self.tags.pop().unwrap_or_default()
    }

    /// Release a row back to the pool
    ///
    /// Any tag map carried by the row is cleared and returned to its own
    /// free list before the row vector is recycled. Must be called at most
    /// once per row, and only after the write outcome for that row is
    /// known, since the store client may retain references until then.
    pub fn put_row(&self, mut row: Row) {
        for value in row.drain(..) {
            if let ColumnValue::Tags(mut map) = value {
                map.clear();
                let _ = self.tags.push(map);
            }
        }

        match self.rows.push(row) {
            Ok(()) => self.metrics.record_return(),
            Err(_) => self.metrics.record_drop(),
        }
    }

    /// Rows currently available for reuse
    #[inline]
    pub fn available(&self) -> usize {
        self.rows.len()
    }

    /// Maximum number of pooled rows
    #[inline]
    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    /// Column count each pooled row is sized for
    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Get reference to pool metrics
    #[inline]
    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
