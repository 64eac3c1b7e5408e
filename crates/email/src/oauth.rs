//! Primary transport: a per-user opaque OAuth bearer credential against a
//! configurable HTTP send endpoint. Holds a bearer token, calls an HTTP API,
//! and maps non-2xx/revocation responses to a typed error. Token refresh is
//! the outer shell's concern — this backend only ever presents the token
//! it's handed.
use async_trait::async_trait;
use serde::Serialize;

use crate::backend::EmailBackend;
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct OAuthEmailConfig {
    /// HTTP endpoint that accepts `{to, subject, html}` and returns a
    /// provider message id, authenticated via `Authorization: Bearer`.
    pub send_endpoint: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(serde::Deserialize)]
struct SendResponse {
    message_id: String,
}

pub struct OAuthEmailBackend {
    client: reqwest::Client,
    config: OAuthEmailConfig,
}

impl OAuthEmailBackend {
    #[must_use]
    pub fn new(config: OAuthEmailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl EmailBackend for OAuthEmailBackend {
    async fn send(
        &self,
        credential: Option<&str>,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, TransportError> {
        let token = credential.ok_or_else(|| TransportError::new("transport not connected"))?;

        let response = self
            .client
            .post(&self.config.send_endpoint)
            .bearer_auth(token)
            .json(&SendRequest {
                to,
                subject,
                html: html_body,
            })
            .send()
            .await
            .map_err(|e| TransportError::new(format!("send request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(TransportError::new(
                "credential revoked or expired; reconnect required",
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::new(format!(
                "send endpoint returned {status}: {body}"
            )));
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| TransportError::new(format!("malformed send response: {e}")))?;
        Ok(parsed.message_id)
    }
}
