//! # Error Types
//!
//! Recoverable failures of the storage core.
//!
//! Caller contract violations (unregistered components, stale entity ids,
//! out-of-range rows, removing components an entity does not own) are not
//! represented here: they panic with a descriptive message.

use thiserror::Error;

/// Errors that can occur in the storage core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The system allocator could not provide a new chunk.
    #[error("out of memory: failed to allocate a {chunk_size}-byte chunk")]
    OutOfMemory {
        /// Size of the chunk that could not be allocated.
        chunk_size: usize,
    },

    /// The configured maximum number of live chunks has been reached.
    #[error("chunk budget exhausted: {budget} chunks already live")]
    ChunkBudgetExhausted {
        /// The configured budget.
        budget: usize,
    },

    /// A single row of an archetype does not fit in one chunk.
    #[error("row of {row_size} bytes does not fit in a {chunk_size}-byte chunk")]
    RowTooLarge {
        /// Combined size of all components of the archetype.
        row_size: usize,
        /// Configured chunk size.
        chunk_size: usize,
    },

    /// Invalid configuration values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),
}

impl EcsError {
    /// Returns `true` for allocation failures.
    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(
            self,
            Self::OutOfMemory { .. } | Self::ChunkBudgetExhausted { .. }
        )
    }
}

/// Result type for storage operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EcsError::RowTooLarge {
            row_size: 8192,
            chunk_size: 4096,
        };
        assert_eq!(
            err.to_string(),
            "row of 8192 bytes does not fit in a 4096-byte chunk"
        );
    }

    #[test]
    fn test_out_of_memory_classification() {
        assert!(EcsError::OutOfMemory { chunk_size: 64 }.is_out_of_memory());
        assert!(EcsError::ChunkBudgetExhausted { budget: 1 }.is_out_of_memory());
        assert!(!EcsError::InvalidConfig("x".into()).is_out_of_memory());
    }
}
