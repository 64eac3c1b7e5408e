use async_trait::async_trait;

use crate::error::TransportError;

/// `send(credential, to, subject, html_body) -> message_id`, synchronous
/// from the caller's perspective (awaited, not fire-and-forget). `credential`
/// is the per-user opaque transport token; the SMTP backend ignores it since
/// it authenticates with process-wide configured creds.
#[async_trait]
pub trait EmailBackend: Send + Sync {
    async fn send(
        &self,
        credential: Option<&str>,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, TransportError>;
}
