//! Error types for sorted set operations.
//!
//! Lookups never fail on absent members; absence is `None`. Errors are
//! reserved for invalid arguments and cursor misuse.

/// Sorted set error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZSetError {
    /// Negative offset passed to a score-range query
    InvalidOffset(isize),
    /// `next` called on a cursor with no remaining entries
    IteratorExhausted,
    /// Cursor `remove` called before `next`, or twice for the same entry
    RemoveWithoutNext,
    /// The container was mutated outside the cursor since the cursor's
    /// last observation
    ConcurrentModification { expected: u64, actual: u64 },
}

impl std::fmt::Display for ZSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZSetError::InvalidOffset(offset) => {
                write!(f, "Offset must be non-negative, got {}", offset)
            }
            ZSetError::IteratorExhausted => write!(f, "Cursor has no more entries"),
            ZSetError::RemoveWithoutNext => {
                write!(f, "Cursor remove requires a preceding next")
            }
            ZSetError::ConcurrentModification { expected, actual } => {
                write!(
                    f,
                    "Container modified during iteration: epoch {} != {}",
                    actual, expected
                )
            }
        }
    }
}

impl std::error::Error for ZSetError {}
