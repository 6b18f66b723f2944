//! Error types.

use thiserror::Error;

/// Rejected map configuration. Nothing is allocated when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    /// The load factor was zero, negative, NaN or infinite.
    #[error("illegal load factor: {0}")]
    InvalidLoadFactor(f32),
}

/// A failed cursor step. Only the cursor is invalidated; the map stays
/// consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IterError {
    /// The map was structurally modified by something other than the
    /// cursor since the cursor last synchronized with it.
    #[error("map modified during iteration (expected generation {expected}, found {found})")]
    ConcurrentModification { expected: u64, found: u64 },
    /// `remove_current` was called before the first `advance`, or twice for
    /// the same entry.
    #[error("cursor has no current entry")]
    NoCurrentEntry,
}

impl IterError {
    /// Fails with `ConcurrentModification` unless the two generations agree.
    pub(crate) fn check(expected: u64, found: u64) -> Result<(), IterError> {
        if expected == found {
            Ok(())
        } else {
            Err(IterError::ConcurrentModification { expected, found })
        }
    }
}
