//! SMTP email provider implementation using lettre.

use super::{EmailContent, EmailProvider, SentEmail};
use crate::error::{NotificationError, NotificationResult};
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_flag, env_or_default, env_parse};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::time::Duration;
use tracing::{debug, error, info};

/// Sender address used when none is configured.
pub const DEFAULT_FROM_ADDRESS: &str = "noreply@localhost";

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_email: String,
    /// Display name for the sender; empty means address only.
    pub from_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// STARTTLS relay when true, plaintext when false (local catchers).
    pub use_tls: bool,
    /// Per-command timeout on the SMTP connection.
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            from_email: DEFAULT_FROM_ADDRESS.to_string(),
            from_name: String::new(),
            username: None,
            password: None,
            use_tls: false,
            timeout: Duration::from_secs(10),
        }
    }

    /// Local MailHog/Mailpit on `localhost:1025`.
    pub fn mailhog() -> Self {
        Self::new("localhost", 1025)
    }

    pub fn with_from(mut self, email: impl Into<String>, name: impl Into<String>) -> Self {
        self.from_email = email.into();
        self.from_name = name.into();
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    fn sender(&self) -> NotificationResult<Mailbox> {
        let raw = if self.from_name.trim().is_empty() {
            self.from_email.clone()
        } else {
            format!("{} <{}>", self.from_name, self.from_email)
        };
        raw.parse().map_err(|e| {
            NotificationError::ConfigError(format!("Invalid from address '{raw}': {e}"))
        })
    }
}

impl FromEnv for SmtpConfig {
    /// SMTP_HOST, SMTP_PORT, SMTP_USERNAME, SMTP_PASSWORD, SMTP_USE_TLS,
    /// SMTP_TIMEOUT_SECS, EMAIL_FROM_ADDRESS, EMAIL_FROM_NAME.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("SMTP_HOST", "localhost"),
            port: env_parse("SMTP_PORT", 1025u16)?,
            from_email: env_or_default("EMAIL_FROM_ADDRESS", DEFAULT_FROM_ADDRESS),
            from_name: env_or_default("EMAIL_FROM_NAME", ""),
            username: std::env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty()),
            password: std::env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),
            use_tls: env_flag("SMTP_USE_TLS", false),
            timeout: Duration::from_secs(env_parse("SMTP_TIMEOUT_SECS", 10u64)?),
        })
    }
}

/// SMTP email provider.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    config: SmtpConfig,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        let transport = Self::build_transport(&config)?;
        let from = config.sender()?;
        Ok(Self {
            transport,
            from,
            config,
        })
    }

    /// Provider for a local MailHog/Mailpit.
    pub fn mailhog() -> NotificationResult<Self> {
        Self::new(SmtpConfig::mailhog())
    }

    pub fn from_env() -> NotificationResult<Self> {
        Self::new(SmtpConfig::from_env()?)
    }

    fn build_transport(
        config: &SmtpConfig,
    ) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(|e| {
                NotificationError::ConfigError(format!("Failed to create SMTP relay: {e}"))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let mut builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    fn build_message(&self, email: &EmailContent) -> NotificationResult<Message> {
        let to: Mailbox = email.to_email.parse().map_err(|e| {
            NotificationError::ProviderError(format!("Invalid recipient '{}': {e}", email.to_email))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.text_body.clone())
            .map_err(|e| NotificationError::ProviderError(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailContent) -> NotificationResult<SentEmail> {
        debug!(
            to = %email.to_email,
            subject = %email.subject,
            host = %self.config.host,
            port = %self.config.port,
            "Sending email via SMTP"
        );

        let message = self.build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(to = %email.to_email, error = %e, "Failed to send email via SMTP");
            NotificationError::ProviderError(e.to_string())
        })?;

        let message_id = response.message().next().map(|s| s.to_string());
        let accepted = response.is_positive();

        info!(
            to = %email.to_email,
            message_id = ?message_id,
            accepted,
            "SMTP transaction finished"
        );

        Ok(SentEmail {
            message_id,
            accepted,
        })
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| NotificationError::ProviderError(format!("SMTP health check failed: {e}")))
    }
}
