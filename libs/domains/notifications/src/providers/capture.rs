//! In-memory capturing email provider.
//!
//! Records every email it is asked to send and answers according to its
//! configured [`SendBehavior`]. Used by integration tests and by local runs
//! without an SMTP catcher.

use super::{EmailContent, EmailProvider, SentEmail};
use crate::error::{NotificationError, NotificationResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::info;

/// How the provider answers `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendBehavior {
    Accept,
    /// Answer `accepted = false` without raising.
    Reject,
    /// Raise a provider error carrying this message.
    Fail(String),
}

/// Capturing email provider.
#[derive(Debug, Clone)]
pub struct CapturingEmailProvider {
    sent: Arc<Mutex<Vec<EmailContent>>>,
    behavior: Arc<Mutex<SendBehavior>>,
}

impl Default for CapturingEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturingEmailProvider {
    pub fn new() -> Self {
        Self::with_behavior(SendBehavior::Accept)
    }

    pub fn rejecting() -> Self {
        Self::with_behavior(SendBehavior::Reject)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(SendBehavior::Fail(message.into()))
    }

    pub fn with_behavior(behavior: SendBehavior) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            behavior: Arc::new(Mutex::new(behavior)),
        }
    }

    /// Change the answer for subsequent sends.
    pub fn set_behavior(&self, behavior: SendBehavior) {
        if let Ok(mut current) = self.behavior.lock() {
            *current = behavior;
        }
    }

    /// Every email passed to `send`, including rejected and failed ones.
    pub fn sent_emails(&self) -> Vec<EmailContent> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or_default()
    }

    pub fn was_sent_to(&self, email: &str) -> bool {
        self.sent_emails().iter().any(|e| e.to_email == email)
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

#[async_trait]
impl EmailProvider for CapturingEmailProvider {
    async fn send(&self, email: &EmailContent) -> NotificationResult<SentEmail> {
        self.sent
            .lock()
            .map_err(|e| NotificationError::Internal(format!("capturing provider poisoned: {e}")))?
            .push(email.clone());

        let behavior = self
            .behavior
            .lock()
            .map_err(|e| NotificationError::Internal(format!("capturing provider poisoned: {e}")))?
            .clone();

        info!(
            to = %email.to_email,
            subject = %email.subject,
            behavior = ?behavior,
            "Captured email send"
        );

        match behavior {
            SendBehavior::Accept => Ok(SentEmail {
                message_id: Some(format!("captured-{}", uuid::Uuid::new_v4())),
                accepted: true,
            }),
            SendBehavior::Reject => Ok(SentEmail {
                message_id: None,
                accepted: false,
            }),
            SendBehavior::Fail(message) => Err(NotificationError::ProviderError(message)),
        }
    }

    fn name(&self) -> &'static str {
        "Capturing"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        Ok(true)
    }
}
