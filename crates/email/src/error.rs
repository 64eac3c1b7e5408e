use thiserror::Error;

/// Single failure surface for both backends: all errors surface to the
/// scheduler loop as one `TransportError(message)` variant, with no retry
/// inside the adapter itself.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
