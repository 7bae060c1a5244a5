// Collection engine
//
// The pipeline-agnostic machinery: a token-bucket rate limiter, a bounded
// fan-out collector yielding outcomes in completion order, a durable batch
// store with a rotating cursor, an exclusive run lock, and run summaries.
// Pipelines parameterize these pieces; none of them knows about Reddit or
// the database.

pub mod batches;
pub mod fan_out;
pub mod lock;
pub mod rate_limiter;
pub mod summary;

// Re-export main types
pub use batches::{BatchSnapshot, BatchStore};
pub use fan_out::{collect_batch, FanOutConfig, FetchOutcome};
pub use lock::RunLock;
pub use rate_limiter::RateLimiter;
pub use summary::RunSummary;

use std::path::PathBuf;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error types for the collection engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid construction parameters (zero rate, empty period, ...)
    #[error("Engine configuration error: {0}")]
    Config(String),

    /// The batch snapshot file does not exist; run batch generation first
    #[error("Batch file not found: {}", .0.display())]
    MissingBatchFile(PathBuf),

    /// The cursor points at a batch index missing from the snapshot
    #[error("Batch index {index} not present in snapshot ({total_batches} batches)")]
    InvalidCursor { index: usize, total_batches: usize },

    /// Another process already holds the run lock
    #[error("Lock already held by another process: {}", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
