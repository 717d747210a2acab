//! Sample sink: flush orchestrator and lifecycle controller
//!
//! The sink collects samples from concurrent producers, and on each timer
//! tick drains them, converts them through the configured schema, and
//! writes them to the store inside one transaction. Failures are
//! classified: transient errors are retried with backoff, exhausted
//! failures are parked in the failover buffer for replay on a later cycle,
//! and commit-ambiguous failures are accepted rather than risk duplicate
//! delivery.
//!
//! Concurrency discipline:
//! - A compare-and-swap cycle guard keeps flush cycles from overlapping; a
//!   busy cycle makes the timer tick skip rather than queue.
//! - The lifecycle state lives behind a `RwLock`; a flush holds the read
//!   side for its whole cycle, so `stop()` taking the write side inherently
//!   waits out in-flight cycles.
//! - One `CancellationToken`, created at start and cancelled during stop,
//!   threads through the write loop and every backoff sleep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::failover::FailoverBuffer;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::pool::RowPool;
use crate::retry::{self, RetryPolicy};
use crate::sample::{Sample, SampleBatch, SampleBuffer};
use crate::schema::{Row, SampleSchema, SchemaRegistry};
use crate::store::{Store, StoreConnection};

// =============================================================================
// Lifecycle state
// =============================================================================

const STATE_CREATED: u8 = 0;
const STATE_STARTED: u8 = 1;
const STATE_STOPPING: u8 = 2;
const STATE_STOPPED: u8 = 3;

/// Shared state guarded by the flush/lifecycle lock
///
/// Flush cycles hold the read side; lifecycle mutation takes the write
/// side, which doubles as the wait for in-flight cycles.
struct SinkState {
    closed: bool,
    conn: Option<Arc<dyn StoreConnection>>,
}

/// Clears the cycle guard when a flush cycle ends, on every exit path
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// Sample sink
// =============================================================================

/// Durable relay from a sample stream to a columnar store
pub struct SampleSink {
    config: SinkConfig,
    schema: Arc<dyn SampleSchema>,
    insert_sql: String,
    store: Arc<dyn Store>,

    state: RwLock<SinkState>,
    lifecycle: AtomicU8,
    flush_active: AtomicBool,
    stop_lock: Mutex<()>,

    buffer: SampleBuffer,
    failover: Option<FailoverBuffer>,
    pool: RowPool,
    metrics: Arc<SinkMetrics>,

    shutdown: CancellationToken,
    timer_stop: CancellationToken,
    timer: std::sync::Mutex<Option<JoinHandle<()>>>,

    self_ref: std::sync::Weak<SampleSink>,
}

impl std::fmt::Debug for SampleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleSink").finish_non_exhaustive()
    }
}

impl SampleSink {
    /// Create a sink, resolving the configured schema from the registry
    ///
    /// Fails on invalid configuration or an unknown schema name. The sink
    /// does nothing until [`start`] is called.
    ///
    /// [`start`]: SampleSink::start
    pub fn new(
        config: SinkConfig,
        store: Arc<dyn Store>,
        registry: &SchemaRegistry,
    ) -> Result<Arc<Self>, SinkError> {
        config.validate()?;
        let schema = registry.resolve(&config.schema)?;
        let insert_sql = schema.insert_statement(&config.database, &config.table);
        let failover = config
            .failover_enabled
            .then(|| FailoverBuffer::new(config.failover_capacity, config.failover_policy));
        let pool = RowPool::new(config.pool_size, schema.column_count());

        Ok(Arc::new_cyclic(|weak| Self {
            config,
            schema,
            insert_sql,
            store,
            state: RwLock::new(SinkState {
                closed: false,
                conn: None,
            }),
            lifecycle: AtomicU8::new(STATE_CREATED),
            flush_active: AtomicBool::new(false),
            stop_lock: Mutex::new(()),
            buffer: SampleBuffer::new(),
            failover,
            pool,
            metrics: Arc::new(SinkMetrics::new()),
            shutdown: CancellationToken::new(),
            timer_stop: CancellationToken::new(),
            timer: std::sync::Mutex::new(None),
            self_ref: weak.clone(),
        }))
    }

    /// Get reference to the sink metrics
    pub fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    /// Get reference to the row pool
    pub fn pool(&self) -> &RowPool {
        &self.pool
    }

    /// Point-in-time snapshot of counters plus failover occupancy
    ///
    /// Safe to call at any time, including concurrently with flushes.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        if let Some(failover) = &self.failover {
            snapshot.failover_len = failover.len();
            snapshot.failover_dropped = failover.dropped_count();
        }
        snapshot
    }

    /// Human-readable description of the sink target
    pub fn describe(&self) -> String {
        format!(
            "columnar telemetry sink ({}/{}.{}, schema={})",
            self.config.url,
            self.config.database,
            self.config.table,
            self.schema.name()
        )
    }

    // =========================================================================
    // Producer API
    // =========================================================================

    /// Buffer one sample for the next flush cycle
    ///
    /// Never blocks the producer beyond the buffer's narrow lock.
    pub fn add(&self, sample: Sample) {
        self.buffer.push(sample);
    }

    /// Buffer a group of samples, preserving their order
    pub fn add_samples(&self, samples: impl IntoIterator<Item = Sample>) {
        self.buffer.push_all(samples);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the store connection, prepare the table and arm the flush timer
    ///
    /// Fails if the sink was already started or stopped, or if the store is
    /// unreachable. On failure the sink returns to its created state so a
    /// caller may retry.
    pub async fn start(&self) -> Result<(), SinkError> {
        if let Err(current) = self.lifecycle.compare_exchange(
            STATE_CREATED,
            STATE_STARTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            let reason = match current {
                STATE_STOPPED => "sink already stopped",
                _ => "sink already started",
            };
            return Err(SinkError::InvalidState(reason.into()));
        }

        match self.start_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.lifecycle.store(STATE_CREATED, Ordering::Release);
                Err(e)
            }
        }
    }

    async fn start_inner(&self) -> Result<(), SinkError> {
        let conn = self.store.connect().await?;
        conn.ping().await?;

        if !self.config.skip_schema_creation {
            self.schema
                .create_schema(conn.as_ref(), &self.config.database, &self.config.table)
                .await?;
        }

        {
            let mut state = self.state.write().await;
            state.conn = Some(conn);
            state.closed = false;
        }

        // The timer loop holds its own Arc so the task outlives the caller's
        // borrow; it ends when the timer token is cancelled during stop.
        let sink = self
            .self_ref
            .upgrade()
            .ok_or_else(|| SinkError::InvalidState("sink dropped during start".into()))?;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sink.config.flush_interval);
            loop {
                tokio::select! {
                    _ = sink.timer_stop.cancelled() => break,
                    _ = ticker.tick() => sink.flush().await,
                }
            }
        });
        *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        tracing::info!(
            url = %self.config.url,
            database = %self.config.database,
            table = %self.config.table,
            schema = %self.schema.name(),
            flush_interval_ms = self.config.flush_interval.as_millis() as u64,
            "sample sink started"
        );
        Ok(())
    }

    /// Stop the sink, delivering buffered data on a best-effort basis
    ///
    /// Idempotent and safe to call concurrently: teardown happens exactly
    /// once and every call returns success. Order of operations: halt the
    /// timer, run one final flush while the sink is still open, mark the
    /// sink closed (waiting out in-flight cycles), give any remaining
    /// failover data one bounded delivery attempt, then cancel the
    /// shutdown signal and close the connection.
    pub async fn stop(&self) -> Result<(), SinkError> {
        if self.lifecycle.load(Ordering::Acquire) == STATE_STOPPED {
            return Ok(());
        }
        let _stop = self.stop_lock.lock().await;
        if self.lifecycle.load(Ordering::Acquire) == STATE_STOPPED {
            return Ok(());
        }
        self.lifecycle.store(STATE_STOPPING, Ordering::Release);

        // Halt the timer before closing so the final flush below still sees
        // an open sink and the last live samples are not silently dropped.
        self.timer_stop.cancel();
        let handle = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        self.flush().await;

        let conn = {
            let mut state = self.state.write().await;
            if state.closed {
                None
            } else {
                state.closed = true;
                state.conn.take()
            }
        };

        if let Some(conn) = conn {
            self.drain_failover(&conn).await;
            self.shutdown.cancel();
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "error closing store connection");
            }
        } else {
            self.shutdown.cancel();
        }

        self.lifecycle.store(STATE_STOPPED, Ordering::Release);

        let snapshot = self.snapshot();
        tracing::info!(
            processed = snapshot.samples_processed,
            conversion_failures = snapshot.conversion_failures,
            flush_failures = snapshot.flush_failures,
            retries = snapshot.retry_count,
            dropped = snapshot.dropped_samples,
            "sample sink stopped"
        );
        Ok(())
    }

    /// One last delivery attempt for batches still parked at shutdown
    ///
    /// Runs under a fresh cancellation token bounded by the drain timeout;
    /// the shutdown token may not interrupt this attempt because it is the
    /// data's final chance before being declared lost.
    async fn drain_failover(&self, conn: &Arc<dyn StoreConnection>) {
        let Some(failover) = &self.failover else {
            return;
        };
        let batches = failover.pop_all();
        if batches.is_empty() {
            return;
        }
        let total: usize = batches.iter().map(Vec::len).sum();
        tracing::info!(
            batches = batches.len(),
            samples = total,
            "draining failover buffer before shutdown"
        );

        let drain_token = CancellationToken::new();
        let attempt = self.write_batches(conn, &batches, &drain_token);
        match tokio::time::timeout(self.config.drain_timeout, attempt).await {
            Ok(Ok(written)) => {
                tracing::info!(rows = written, "failover drain complete");
            }
            Ok(Err(e)) if e.is_commit_ambiguous() => {
                self.metrics.record_flush_failure();
                tracing::warn!(error = %e, "failover drain commit outcome unknown");
            }
            Ok(Err(e)) => {
                self.metrics.record_flush_failure();
                self.metrics.record_dropped(total as u64);
                tracing::error!(error = %e, samples = total, "failover drain failed, data lost");
            }
            Err(_) => {
                self.metrics.record_flush_failure();
                self.metrics.record_dropped(total as u64);
                tracing::error!(
                    timeout_ms = self.config.drain_timeout.as_millis() as u64,
                    samples = total,
                    "failover drain timed out, data lost"
                );
            }
        }
    }

    // =========================================================================
    // Flush pipeline
    // =========================================================================

    /// Run one flush cycle
    ///
    /// Returns immediately if a previous cycle is still running (including
    /// one stuck in retries) so a struggling store never sees overlapping
    /// write load. Previously failed batches are replayed ahead of newly
    /// drained samples, preserving delivery order.
    pub async fn flush(&self) {
        if self
            .flush_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("previous flush cycle still running, skipping");
            return;
        }
        let _cycle = CycleGuard(&self.flush_active);

        // Holding the read side registers this cycle against shutdown: a
        // concurrent stop() blocks on the write lock until we drop it.
        let state = self.state.read().await;
        if state.closed {
            return;
        }
        let Some(conn) = state.conn.clone() else {
            return;
        };

        let mut batches: Vec<SampleBatch> = match &self.failover {
            Some(failover) => failover.pop_all(),
            None => Vec::new(),
        };
        let live = self.buffer.drain();
        if !live.is_empty() {
            batches.push(live);
        }
        if batches.is_empty() {
            return;
        }
        let total: usize = batches.iter().map(Vec::len).sum();
        tracing::debug!(batches = batches.len(), samples = total, "flushing");

        let policy = RetryPolicy {
            attempts: self.config.retry_attempts,
            base_delay: self.config.retry_base_delay,
            max_delay: self.config.retry_max_delay,
        };
        let result = retry::with_backoff(
            &policy,
            &self.shutdown,
            &self.metrics.retry_count,
            SinkError::is_retryable,
            || self.write_batches(&conn, &batches, &self.shutdown),
        )
        .await;

        match result {
            Ok(written) => {
                tracing::debug!(rows = written, "flush complete");
            }
            Err(e) if e.is_commit_ambiguous() => {
                // The rows may already be durable server-side. Re-delivering
                // the batch risks duplication, so it is not parked for replay.
                self.metrics.record_flush_failure();
                tracing::warn!(
                    error = %e,
                    samples = total,
                    "commit outcome unknown, batch not re-queued"
                );
            }
            Err(e) => {
                self.metrics.record_flush_failure();
                match &self.failover {
                    Some(failover) => {
                        let parked = batches.len();
                        let dropped = failover.push(batches);
                        self.metrics.record_buffered(parked as u64);
                        if dropped.batches > 0 {
                            self.metrics.record_dropped(dropped.samples as u64);
                        }
                        tracing::warn!(
                            error = %e,
                            parked,
                            overflow_dropped = dropped.batches,
                            "flush failed, batches parked for a later cycle"
                        );
                    }
                    None => {
                        self.metrics.record_dropped(total as u64);
                        tracing::error!(
                            error = %e,
                            samples = total,
                            "flush failed and failover buffering is disabled, batch lost"
                        );
                    }
                }
            }
        }
    }

    /// One write attempt: convert and write every sample in one transaction
    ///
    /// Conversion failures skip the sample (they are deterministic and
    /// would fail identically on a retry); a failed row write aborts the
    /// whole batch. A batch where every sample failed conversion has
    /// nothing to commit and counts as success. A commit failure is
    /// surfaced as commit-ambiguous with the written rows optimistically
    /// counted as processed, since they may already be durable.
    async fn write_batches(
        &self,
        conn: &Arc<dyn StoreConnection>,
        batches: &[SampleBatch],
        token: &CancellationToken,
    ) -> Result<u64, SinkError> {
        let mut tx = conn.begin().await?;
        if let Err(e) = tx.prepare(&self.insert_sql).await {
            let _ = tx.rollback().await;
            return Err(e.into());
        }

        let mut rows: Vec<Row> = Vec::new();
        let mut seen = 0usize;

        for batch in batches {
            for sample in batch {
                seen += 1;
                if seen % self.config.cancel_check_interval == 0 && token.is_cancelled() {
                    let _ = tx.rollback().await;
                    self.release_rows(rows);
                    return Err(SinkError::Cancelled);
                }

                let row = match self.schema.convert(sample, &self.pool) {
                    Ok(row) => row,
                    Err(e) => {
                        self.metrics.record_conversion_failure();
                        tracing::debug!(
                            error = %e,
                            metric = %sample.metric,
                            "sample failed conversion, skipping"
                        );
                        continue;
                    }
                };

                if let Err(e) = tx.execute_row(&row).await {
                    self.metrics.record_insert_failure();
                    let _ = tx.rollback().await;
                    rows.push(row);
                    self.release_rows(rows);
                    return Err(e.into());
                }
                rows.push(row);
            }
        }

        let written = rows.len() as u64;
        if written == 0 {
            // Every sample failed conversion; nothing to commit.
            let _ = tx.rollback().await;
            return Ok(0);
        }

        match tx.commit().await {
            Ok(()) => {
                self.metrics.record_processed(written);
                self.release_rows(rows);
                Ok(written)
            }
            Err(e) => {
                // The rows were handed to the store before the commit failed
                // and may already be persisted; counting them trades a small
                // chance of over-counting against duplicate delivery.
                self.metrics.record_processed(written);
                self.release_rows(rows);
                Err(SinkError::CommitAmbiguous { source: e })
            }
        }
    }

    fn release_rows(&self, rows: Vec<Row>) {
        for row in rows {
            self.pool.put_row(row);
        }
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_test;
