// Error handling module
// Defines the error taxonomy shared by the workload engine, store and metrics sink

use std::time::Duration;
use thiserror::Error;

/// Errors raised while preparing or driving a benchmark run
#[derive(Error, Debug)]
pub enum BenchError {
    /// Operation name not present in the catalog
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// A read operation found no key to target
    #[error("Key corpus is empty: run a write operation or enable fake data first")]
    EmptyCorpus,

    /// Error from the target store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from the metrics sink
    #[error("Metrics sink error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Flush completions stopped arriving before the expected count
    #[error("Metrics flush stalled: {completed}/{expected} batches flushed ({failed} failed)")]
    FlushStalled {
        completed: u64,
        expected: u64,
        failed: u64,
    },
}

/// Errors from a single store call or a pipeline commit
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport or protocol failure reported by the Redis client
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The call did not complete within its timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The call was refused (used by the in-memory store)
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Errors while writing a batch of points to the metrics sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from the sink
    #[error("Sink returned status {0}")]
    Status(u16),
}

/// Result type alias for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;
