//! One `EmailBackend` trait, two backends — the per-user OAuth-bearer
//! primary and the SMTP fallback used for verification/password-reset mail.

mod backend;
mod error;
mod oauth;
mod smtp;

pub use backend::EmailBackend;
pub use error::TransportError;
pub use oauth::{OAuthEmailBackend, OAuthEmailConfig};
pub use smtp::{SmtpConfig, SmtpEmailBackend};
