use thiserror::Error;

/// Backend-internal failure surface. Distinct from `cadence_core::CoreError`:
/// this crate knows nothing about schedule rules or state-machine guards,
/// only about moving rows in and out of a backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
