use thiserror::Error;

/// Error surface for the Write API, Schedule Compiler, and state machine.
///
/// Variants map directly onto the error kinds named by the core's design:
/// each one is surfaced to the caller without state change except where
/// noted.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Schedule Compiler validation failure: missing/malformed fields, bad
    /// `HH:MM`, unknown `repeat`, bad weekday token, `interval <= 0`, or a
    /// missing `start_date` where the mode requires one.
    #[error("invalid schedule rule: {0}")]
    InvalidRule(String),

    /// Attempt to install a rule on a followup in `{sent, done, deleted}` or
    /// with `sent_count > 0`.
    #[error("followup is finalized and cannot accept a new schedule rule")]
    AlreadyFinalized,

    /// A channel-required contact field (e.g. email for the email channel)
    /// is absent at write time.
    #[error("contact field required for channel is missing: {0}")]
    ContactMissing(String),

    /// The Loop observed that the user has no usable transport credential.
    #[error("transport not connected for user")]
    TransportNotConnected,

    /// Delivery failed at the transport boundary.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The followup or user referenced by an operation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Propagated store failure; the caller (typically the Loop) aborts the
    /// affected item only and continues.
    #[error("store error: {0}")]
    StoreError(#[from] cadence_store::StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;
