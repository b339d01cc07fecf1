//! Email provider implementations.
//!
//! The processor only sees the [`EmailProvider`] capability; SMTP is the
//! production transport and [`CapturingEmailProvider`] captures mail in memory.

mod capture;
mod smtp;

pub use capture::{CapturingEmailProvider, SendBehavior};
pub use smtp::{SmtpConfig, SmtpProvider};

use crate::error::NotificationResult;
use async_trait::async_trait;

/// Transport's answer for one email.
#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Provider-specific message ID for tracking.
    pub message_id: Option<String>,
    /// Whether the transport accepted the email. `false` is a soft failure.
    pub accepted: bool,
}

/// Email content ready for sending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailContent {
    pub to_email: String,
    pub subject: String,
    /// Plain-text body.
    pub text_body: String,
}

/// Trait for email sending providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email. `Err` means the transport raised.
    async fn send(&self, email: &EmailContent) -> NotificationResult<SentEmail>;

    /// Get the provider name for logging.
    fn name(&self) -> &'static str;

    /// Check if the provider is reachable.
    async fn health_check(&self) -> NotificationResult<bool>;
}
