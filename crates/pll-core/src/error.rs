//! PLL error types.

use thiserror::Error;

/// Errors that can occur while building, computing or caching PLLs.
#[derive(Error, Debug)]
pub enum PllError {
    /// Invalid construction-time configuration (never retried)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A partition index outside the PLL's partition range
    #[error("partition {index} out of range for '{label}' ({count} partitions)")]
    PartitionOutOfRange {
        label: String,
        index: usize,
        count: usize,
    },

    /// A partition transformation failed
    #[error("transformation failed in partition {index}: {message}")]
    Transform { index: usize, message: String },

    /// The operation was cancelled before completion
    #[error("operation was cancelled")]
    Cancelled,

    /// The producer of a progress handle went away without resolving it
    #[error("task was dropped before completion")]
    Abandoned,

    /// A cache commit found a partition that was never materialized
    #[error("partition {index} was not materialized")]
    IncompleteCache { index: usize },

    /// The worker pool could not be created
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl PllError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a Transform error.
    pub fn transform(index: usize, message: impl Into<String>) -> Self {
        Self::Transform {
            index,
            message: message.into(),
        }
    }

    /// Create a PartitionOutOfRange error.
    pub fn out_of_range(label: impl Into<String>, index: usize, count: usize) -> Self {
        Self::PartitionOutOfRange {
            label: label.into(),
            index,
            count,
        }
    }

    /// Whether this error reports a cancellation rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, PllError>;
