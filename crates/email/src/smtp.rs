//! Fallback transport for verification/password-reset mail, configured via
//! `SMTP_HOST/PORT/USER/PASS`. Built on `lettre`'s
//! `AsyncSmtpTransport<Tokio1Executor>`.
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::backend::EmailBackend;
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

pub struct SmtpEmailBackend {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailBackend {
    pub fn new(config: SmtpConfig) -> Result<Self, TransportError> {
        let creds = Credentials::new(config.username, config.password);
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| TransportError::new(format!("invalid smtp host: {e}")))?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from_address: config.from_address,
        })
    }
}

#[async_trait]
impl EmailBackend for SmtpEmailBackend {
    async fn send(
        &self,
        _credential: Option<&str>,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, TransportError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| TransportError::new(format!("invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| TransportError::new(format!("invalid recipient address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| TransportError::new(format!("failed to build message: {e}")))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| TransportError::new(format!("smtp send failed: {e}")))?;

        Ok(response
            .message()
            .next()
            .unwrap_or("sent")
            .trim()
            .to_string())
    }
}
