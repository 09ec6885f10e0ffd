//! Index Errors
//!
//! Every failure is local to the call that caused it and leaves the index unchanged.

use thiserror::Error;

/// Errors returned by index operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Vector length differs from the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Zero-magnitude vector has no direction
    #[error("Degenerate vector: zero magnitude cannot be normalized")]
    DegenerateVector,

    /// NaN or infinite component
    #[error("Non-finite value at component {index}")]
    NonFiniteComponent { index: usize },

    #[error("Duplicate id: {0}")]
    DuplicateId(u64),

    #[error("Id not found: {0}")]
    NotFound(u64),

    /// Index dimension must be at least 1
    #[error("Invalid dimension: {0}")]
    InvalidDimension(usize),

    /// Query scan was abandoned through its cancel flag
    #[error("Query cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, IndexError>;
