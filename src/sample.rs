//! Telemetry sample types and the producer-facing buffer
//!
//! A [`Sample`] is one timestamped metric observation handed to the sink by
//! the load-generating harness. Producers push into a [`SampleBuffer`]; the
//! flush cycle drains it atomically.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SinkError;

/// The kind of metric a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Cumulative count (e.g. requests issued)
    Counter,
    /// Last-observed value (e.g. active connections)
    Gauge,
    /// Ratio of non-zero observations (e.g. check pass rate)
    Rate,
    /// Distribution of observed values (e.g. request duration)
    Trend,
}

impl MetricKind {
    /// Stable lowercase name, used by schemas when writing the kind column
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Rate => "rate",
            MetricKind::Trend => "trend",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            "rate" => Ok(MetricKind::Rate),
            "trend" => Ok(MetricKind::Trend),
            other => Err(SinkError::Config(format!(
                "unknown metric kind {other:?} (expected counter, gauge, rate or trend)"
            ))),
        }
    }
}

/// One timestamped metric observation with its tag set
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Observation time, milliseconds since the Unix epoch
    pub timestamp_ms: i64,

    /// Metric name (e.g. "http_reqs")
    pub metric: String,

    /// Metric kind
    pub kind: MetricKind,

    /// Observed numeric value
    pub value: f64,

    /// Tag set; keys unique, order irrelevant
    pub tags: HashMap<String, String>,
}

impl Sample {
    /// Create a sample stamped with the current wall-clock time
    pub fn new(metric: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Self {
            timestamp_ms,
            metric: metric.into(),
            kind,
            value,
            tags: HashMap::new(),
        }
    }

    /// Override the observation timestamp
    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Attach one tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// An ordered group of samples sharing one delivery attempt
pub type SampleBatch = Vec<Sample>;

/// Producer-side sample buffer
///
/// Multiple worker threads push concurrently; the flush cycle drains
/// everything in one swap. Producers are never refused and never block
/// beyond the narrow lock.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    inner: Mutex<Vec<Sample>>,
}

impl SampleBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample
    pub fn push(&self, sample: Sample) {
        self.lock().push(sample);
    }

    /// Append a group of samples, preserving their order
    pub fn push_all(&self, samples: impl IntoIterator<Item = Sample>) {
        self.lock().extend(samples);
    }

    /// Take all buffered samples, leaving the buffer empty
    ///
    /// Returns and clears atomically relative to concurrent pushes.
    pub fn drain(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of samples currently buffered
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no samples are buffered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sample>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "sample_test.rs"]
mod sample_test;
