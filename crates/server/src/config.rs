//! Process configuration: `clap` derive with `env` fallback.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "cadence-server",
    about = "Background scheduler process for the cadence followup scheduler"
)]
pub struct Cli {
    /// SQLite database file. Required unless `--no-db` is set.
    #[arg(long, env = "CADENCE_DB_PATH", default_value = "cadence.db")]
    pub db_path: String,

    /// Run against an in-process, non-durable store instead of SQLite.
    /// Useful for local smoke-testing without a database file.
    #[arg(long)]
    pub no_db: bool,

    /// Schedule compiler's default timezone.
    #[arg(long, env = "CADENCE_INPUT_TZ", default_value = "Africa/Lagos")]
    pub input_tz: String,

    /// Scheduler loop period in seconds.
    #[arg(long, env = "CADENCE_TICK_SECONDS", default_value_t = 30)]
    pub tick_seconds: u64,

    /// HTTP endpoint the OAuth email transport posts `{to, subject, html}`
    /// to, bearer-authenticated per-user.
    #[arg(long, env = "CADENCE_OAUTH_SEND_ENDPOINT")]
    pub oauth_send_endpoint: Option<String>,

    /// Fallback SMTP transport host, used by the (out-of-scope) outer shell
    /// for verification/password-reset mail. Exposed here only so
    /// `cadence-server` can hand a configured [`cadence_email::SmtpEmailBackend`]
    /// to an embedding shell; the scheduler loop itself never uses it.
    #[arg(long, env = "CADENCE_SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, env = "CADENCE_SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "CADENCE_SMTP_USER")]
    pub smtp_user: Option<String>,

    #[arg(long, env = "CADENCE_SMTP_PASS")]
    pub smtp_pass: Option<String>,

    #[arg(long, env = "CADENCE_SMTP_FROM")]
    pub smtp_from: Option<String>,
}

/// Redacts `smtp_pass` so a careless `{:?}`/log line never leaks it.
impl std::fmt::Debug for Cli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("db_path", &self.db_path)
            .field("no_db", &self.no_db)
            .field("input_tz", &self.input_tz)
            .field("tick_seconds", &self.tick_seconds)
            .field("oauth_send_endpoint", &self.oauth_send_endpoint)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_pass", &self.smtp_pass.as_ref().map(|_| "***redacted***"))
            .field("smtp_from", &self.smtp_from)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_the_smtp_password() {
        let cli = Cli {
            db_path: "x.db".into(),
            no_db: false,
            input_tz: "UTC".into(),
            tick_seconds: 30,
            oauth_send_endpoint: None,
            smtp_host: Some("smtp.example.com".into()),
            smtp_port: 587,
            smtp_user: Some("user".into()),
            smtp_pass: Some("super-secret".into()),
            smtp_from: None,
        };
        let debug = format!("{cli:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***redacted***"));
    }
}
