//! Emergency e-mail delivery via SMTP.
//!
//! [`AlertMailer`] wraps the `lettre` async SMTP transport to send the
//! call-119 alert triggered by a human action on the client. Configuration
//! is loaded from environment variables; if `SMTP_HOST` is not set,
//! [`EmailConfig::from_env`] returns `None` and no mailer is constructed.

use pyrowatch_core::types::{JobId, Scores};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for alert delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@pyrowatch.local";

/// Configuration for the SMTP alert delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Recipient of emergency alerts.
    pub alert_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` or `ALERT_EMAIL` is not set,
    /// signalling that alert delivery is not configured.
    ///
    /// | Variable        | Required | Default                    |
    /// |-----------------|----------|----------------------------|
    /// | `SMTP_HOST`     | yes      | —                          |
    /// | `ALERT_EMAIL`   | yes      | —                          |
    /// | `SMTP_PORT`     | no       | `587`                      |
    /// | `SMTP_FROM`     | no       | `noreply@pyrowatch.local`  |
    /// | `SMTP_USER`     | no       | —                          |
    /// | `SMTP_PASSWORD` | no       | —                          |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        let alert_address = std::env::var("ALERT_EMAIL").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            alert_address,
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// AlertMailer
// ---------------------------------------------------------------------------

/// Sends emergency fire-alert e-mails via SMTP.
pub struct AlertMailer {
    config: EmailConfig,
}

impl AlertMailer {
    /// Create a new mailer with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Send the emergency alert for a job.
    ///
    /// `video_time` is the video-relative timestamp (seconds) at which the
    /// operator triggered the alert, if known.
    pub async fn send_emergency(
        &self,
        job_id: JobId,
        scores: &Scores,
        video_time: Option<f64>,
    ) -> Result<(), EmailError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let subject = format!("[Pyrowatch] EMERGENCY fire alert — job {job_id}");
        let at = video_time
            .map(|t| format!("{t:.1}s"))
            .unwrap_or_else(|| "n/a".to_string());
        let body = format!(
            "Emergency fire alert\n\n\
             Job: {job_id}\n\
             Video time: {at}\n\n\
             Scores:\n\
             - fire:   {:.1}%\n\
             - smoke:  {:.1}%\n\
             - hazard: {:.1}%\n\n\
             Call emergency services and evacuate the area.\n",
            scores.fire * 100.0,
            scores.smoke * 100.0,
            scores.hazard * 100.0,
        );

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(self.config.alert_address.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(%job_id, to = %self.config.alert_address, "Emergency alert e-mail sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
