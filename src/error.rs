//! Sink error taxonomy
//!
//! Two layers: [`StoreError`] is what the store boundary reports,
//! [`SinkError`] is what the sink surfaces. Classification decides the
//! flush pipeline's routing: transient store errors are retried with
//! backoff, commit-ambiguous failures are neither retried nor re-queued,
//! everything else goes to the failover buffer or is accepted as loss.

use std::io;

/// Errors reported by the store boundary
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network-level I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Operation exceeded its deadline
    #[error("operation timed out")]
    Timeout,

    /// Connection-level failure reported by the driver
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed or rejected statement
    #[error("statement error: {0}")]
    Statement(String),

    /// Server-side failure (permission denial, full disk, ...)
    #[error("database error: {0}")]
    Database(String),
}

/// Message fragments that mark a driver-reported error as transient even
/// when it carries no typed cause
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "broken pipe",
    "i/o timeout",
    "no such host",
    "unexpected eof",
];

impl StoreError {
    /// True when a retry has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout => true,
            StoreError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::UnexpectedEof
            ),
            StoreError::Connection(msg) | StoreError::Database(msg) => {
                message_is_transient(msg)
            }
            StoreError::Statement(_) => false,
        }
    }
}

fn message_is_transient(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| msg.contains(p))
}

/// Errors surfaced by the sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Store boundary failure with a known outcome
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The commit failed after rows were handed to the store; the write may
    /// already be durable server-side
    #[error("commit outcome unknown: {source}")]
    CommitAmbiguous {
        /// The underlying commit failure
        source: StoreError,
    },

    /// A sample could not be mapped to a row
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The operation was interrupted by shutdown
    #[error("operation cancelled by shutdown")]
    Cancelled,

    /// The configured schema name is not registered
    #[error("unknown schema {name:?} (available: {available})")]
    UnknownSchema {
        /// The requested schema name
        name: String,
        /// Comma-separated registered names
        available: String,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Lifecycle violation (e.g. starting a stopped sink)
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl SinkError {
    /// True when the flush pipeline should retry the operation
    ///
    /// Only transient store errors qualify. Conversion errors are
    /// deterministic, commit-ambiguous failures risk duplicate delivery,
    /// and cancellation means shutdown is underway.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Store(e) if e.is_transient())
    }

    /// True for commit failures whose outcome is unknown
    pub fn is_commit_ambiguous(&self) -> bool {
        matches!(self, SinkError::CommitAmbiguous { .. })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;
