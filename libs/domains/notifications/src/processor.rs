//! Notification processor.
//!
//! Validates a request, persists a pending record, hands the rendered email to
//! the provider and persists the outcome. Every failure is absorbed here: the
//! caller only learns whether the email went out.

use crate::error::{NotificationError, NotificationResult};
use crate::models::{DeliveryOutcome, NewNotification, NotificationRequest, NotificationType};
use crate::providers::{EmailContent, EmailProvider};
use crate::repository::NotificationRepository;
use crate::templates::TemplateEngine;
use chrono::Utc;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// Subject stored on records whose request carried none.
pub const DEFAULT_RECORD_SUBJECT: &str = "System notification";

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub default_subject: String,
    /// Upper bound on one provider call.
    pub send_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            default_subject: DEFAULT_RECORD_SUBJECT.to_string(),
            send_timeout: Duration::from_secs(30),
        }
    }
}

impl FromEnv for ProcessorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            default_subject: env_or_default("NOTIFICATION_DEFAULT_SUBJECT", DEFAULT_RECORD_SUBJECT),
            send_timeout: Duration::from_secs(env_parse("NOTIFICATION_SEND_TIMEOUT_SECS", 30u64)?),
        })
    }
}

/// Fields that passed validation.
#[derive(Debug)]
struct Validated {
    notification_type: NotificationType,
    to: String,
}

pub struct NotificationProcessor<R: NotificationRepository, P: EmailProvider> {
    repository: Arc<R>,
    provider: Arc<P>,
    templates: TemplateEngine,
    config: ProcessorConfig,
}

impl<R: NotificationRepository, P: EmailProvider> NotificationProcessor<R, P> {
    pub fn new(
        repository: R,
        provider: P,
        templates: TemplateEngine,
        config: ProcessorConfig,
    ) -> Self {
        Self::with_arcs(Arc::new(repository), Arc::new(provider), templates, config)
    }

    pub fn with_arcs(
        repository: Arc<R>,
        provider: Arc<P>,
        templates: TemplateEngine,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            repository,
            provider,
            templates,
            config,
        }
    }

    /// Process one request. Returns whether the email was delivered.
    ///
    /// Invalid requests persist nothing. Valid requests are inserted pending
    /// before the send and updated exactly once afterwards.
    #[instrument(
        skip(self, request),
        fields(notification_type = ?request.notification_type, user_email = %request.user_email)
    )]
    pub async fn process(&self, mut request: NotificationRequest) -> bool {
        let validated = match validate(&request) {
            Ok(validated) => validated,
            Err(e) => {
                error!(error = %e, "Rejected notification request");
                record_processed(request.notification_type, "invalid");
                return false;
            }
        };

        let created_at = *request.created_at.get_or_insert_with(Utc::now);
        let subject = request
            .explicit_subject()
            .map(str::to_owned)
            .unwrap_or_else(|| self.config.default_subject.clone());

        let pending = NewNotification {
            to: validated.to.clone(),
            subject,
            notification_type: validated.notification_type,
            user_name: request.user_name.clone(),
            user_email: request.user_email.clone(),
            created_at,
        };

        let mut record = match self.repository.insert(pending).await {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "Failed to persist pending notification");
                record_processed(Some(validated.notification_type), "persist_failed");
                return false;
            }
        };

        let started = Instant::now();
        let outcome = self.deliver(&request, &validated.to).await;
        histogram!(
            "notification_delivery_duration_seconds",
            "type" => validated.notification_type.to_string()
        )
        .record(started.elapsed().as_secs_f64());

        record.finalize(&outcome);

        if let Err(e) = self.repository.update(&record).await {
            error!(
                notification_id = %record.id,
                error = %e,
                "Failed to persist delivery outcome, record left pending"
            );
        }

        record_processed(Some(validated.notification_type), outcome.label());
        match &outcome {
            DeliveryOutcome::Delivered => {
                info!(notification_id = %record.id, to = %record.to, "Notification email delivered")
            }
            DeliveryOutcome::Rejected | DeliveryOutcome::Failed(_) => warn!(
                notification_id = %record.id,
                to = %record.to,
                reason = ?record.error_message,
                "Notification email not delivered"
            ),
        }

        outcome.is_delivered()
    }

    async fn deliver(&self, request: &NotificationRequest, to: &str) -> DeliveryOutcome {
        let rendered = match self.templates.render(request) {
            Ok(rendered) => rendered,
            Err(e) => return DeliveryOutcome::failed(e.to_string()),
        };

        let email = EmailContent {
            to_email: to.to_string(),
            subject: rendered.subject,
            text_body: rendered.body,
        };

        match tokio::time::timeout(self.config.send_timeout, self.provider.send(&email)).await {
            Ok(Ok(sent)) if sent.accepted => DeliveryOutcome::Delivered,
            Ok(Ok(_)) => DeliveryOutcome::Rejected,
            Ok(Err(e)) => DeliveryOutcome::failed(e.to_string()),
            Err(_) => DeliveryOutcome::failed(
                NotificationError::Timeout(self.config.send_timeout).to_string(),
            ),
        }
    }
}

/// Checks run in order; the first failure wins.
fn validate(request: &NotificationRequest) -> NotificationResult<Validated> {
    let notification_type = request
        .notification_type
        .ok_or_else(|| NotificationError::InvalidRequest("notification type is required".into()))?;

    let to = request
        .resolved_recipient()
        .ok_or_else(|| NotificationError::InvalidRequest("recipient email is required".into()))?
        .to_string();

    if request.user_name.trim().is_empty() {
        return Err(NotificationError::InvalidRequest("user name is required".into()));
    }

    Ok(Validated {
        notification_type,
        to,
    })
}

fn record_processed(notification_type: Option<NotificationType>, outcome: &'static str) {
    let label = notification_type
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    counter!(
        "notifications_processed_total",
        "type" => label,
        "outcome" => outcome
    )
    .increment(1);
}
