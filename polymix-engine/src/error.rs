//! Error types for polymix-engine
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.
//!
//! Recoverable mixing anomalies (stale buffers, offset drift, buffer holes,
//! insufficient data, late output clock) are deliberately *not* represented
//! here: they are handled inside the mix cycle and reported via tracing and
//! the event bus. The driver only observes progress/no-progress.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for polymix-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Buffer dates that violate the validity-interval invariant
    #[error("Invalid timing: {0}")]
    InvalidTiming(String),

    /// Append targeted a stream that was never registered
    #[error("Unknown stream: {0}")]
    StreamNotFound(Uuid),

    /// Output block allocation failed
    #[error("Allocation failure: {requested_bytes} bytes: {reason}")]
    Allocation {
        requested_bytes: usize,
        reason: String,
    },

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using polymix-engine Error
pub type Result<T> = std::result::Result<T, Error>;
