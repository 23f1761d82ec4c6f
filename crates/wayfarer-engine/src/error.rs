//! Crate-level error type for `wayfarer-engine`, composing
//! `wayfarer_kernel::KernelError` the same way the teacher's
//! `mofa-kernel/src/error.rs` composes its sub-errors.

use thiserror::Error;
use wayfarer_kernel::KernelError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("run cancelled")]
    Cancelled,
}
