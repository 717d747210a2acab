//! Bounded failover buffer for undelivered batches
//!
//! When a flush exhausts its retry budget, the batch is parked here and
//! replayed ahead of new data on the next cycle. The buffer is a fixed
//! capacity ring: during a sustained outage it fills up and the configured
//! [`DropPolicy`] decides which data survives.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;

use crate::sample::SampleBatch;

/// Overflow policy for a full failover buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Evict the oldest entry to admit each new one; keeps the most recent
    /// data during a sustained outage
    #[default]
    DropOldest,
    /// Reject incoming entries when full; keeps the earliest data from the
    /// start of an outage
    DropNewest,
}

/// What a push discarded due to overflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dropped {
    /// Batches dropped (evicted or rejected)
    pub batches: usize,
    /// Samples contained in those batches
    pub samples: usize,
}

/// Bounded, thread-safe FIFO queue of not-yet-delivered sample batches
pub struct FailoverBuffer {
    inner: Mutex<Ring>,
    policy: DropPolicy,
    dropped: AtomicU64,
}

struct Ring {
    slots: Vec<Option<SampleBatch>>,
    head: usize,
    len: usize,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn push_back(&mut self, batch: SampleBatch) {
        let idx = (self.head + self.len) % self.capacity();
        self.slots[idx] = Some(batch);
        self.len += 1;
    }

    fn pop_front(&mut self) -> Option<SampleBatch> {
        if self.len == 0 {
            return None;
        }
        let batch = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        batch
    }
}

impl FailoverBuffer {
    /// Create a buffer holding at most `capacity` batches
    pub fn new(capacity: usize, policy: DropPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                len: 0,
            }),
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    /// Park batches for a later delivery attempt
    ///
    /// Each batch is evaluated independently against capacity, so one call
    /// may cause several evictions or rejections. Returns what was dropped;
    /// the cumulative entry count is also tracked in [`dropped_count`].
    ///
    /// [`dropped_count`]: FailoverBuffer::dropped_count
    pub fn push(&self, batches: Vec<SampleBatch>) -> Dropped {
        let mut ring = self.lock();
        let mut dropped = Dropped::default();

        for batch in batches {
            if ring.len < ring.capacity() {
                ring.push_back(batch);
                continue;
            }
            match self.policy {
                DropPolicy::DropOldest => {
                    if let Some(evicted) = ring.pop_front() {
                        dropped.batches += 1;
                        dropped.samples += evicted.len();
                    }
                    ring.push_back(batch);
                }
                DropPolicy::DropNewest => {
                    dropped.batches += 1;
                    dropped.samples += batch.len();
                }
            }
        }

        // Counted under the lock so a concurrent reset never loses a drop.
        if dropped.batches > 0 {
            self.dropped.fetch_add(dropped.batches as u64, Ordering::Relaxed);
        }
        dropped
    }

    /// Take every parked batch in FIFO order, leaving the buffer empty
    ///
    /// Slots are cleared so the buffer retains no stale references.
    pub fn pop_all(&self) -> Vec<SampleBatch> {
        let mut ring = self.lock();
        let mut batches = Vec::with_capacity(ring.len);
        while let Some(batch) = ring.pop_front() {
            batches.push(batch);
        }
        ring.head = 0;
        batches
    }

    /// Number of batches currently parked
    pub fn len(&self) -> usize {
        self.lock().len
    }

    /// True when nothing is parked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of batches the buffer can hold
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Cumulative count of entries dropped to overflow
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Configured overflow policy
    pub fn policy(&self) -> DropPolicy {
        self.policy
    }

    /// Clear contents and zero the drop counter
    pub fn reset(&self) {
        let mut ring = self.lock();
        for slot in ring.slots.iter_mut() {
            *slot = None;
        }
        ring.head = 0;
        ring.len = 0;
        self.dropped.store(0, Ordering::Relaxed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ring> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "failover_test.rs"]
mod failover_test;
