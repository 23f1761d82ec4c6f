//! Crate-level error type for `wayfarer-kernel`.
//!
//! Composes errors from the graph runtime, the state model and the
//! external-collaborator traits behind a single [`KernelError`], following
//! the same `#[from]`-composition pattern the teacher crate uses for its
//! own `KernelError`.

use thiserror::Error;

/// Result alias used throughout the kernel crate.
pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KernelError {
    #[error("node '{0}' not found in graph")]
    NodeNotFound(String),

    #[error("graph has no entry point set")]
    NoEntryPoint,

    #[error("recursion limit of {0} node transitions exceeded")]
    RecursionLimitExceeded(u32),

    #[error("node '{node}' failed: {message}")]
    NodeFailed { node: String, message: String },

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
