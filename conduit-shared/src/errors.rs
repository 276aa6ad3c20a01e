//! Error types for everything that happens outside a capsule journey.
//!
//! Faults raised *during* a journey are classified by the engine itself
//! (`conduit::fault`); this type covers setup, wiring and misuse.

use thiserror::Error;

/// Result alias used across the conduit crates.
pub type ConduitResult<T> = Result<T, ConduitError>;

#[derive(Debug, Error)]
pub enum ConduitError {
    /// Assembly or options are not usable as given.
    #[error("configuration error: {0}")]
    Config(String),

    /// An operation was attempted in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
