//! Domain models for event-driven notifications.

use chrono::{DateTime, Utc};
use sea_orm::{sea_query::StringLen, DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

/// Kind of notification; selects default email content.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum NotificationType {
    #[sea_orm(string_value = "LOGIN")]
    Login,
    #[sea_orm(string_value = "USER_CREATED")]
    UserCreated,
}

/// Canonical, transport-independent request built from one inbound event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Explicit destination; wins over `user_email` when non-blank.
    pub recipient_override: Option<String>,
    /// Explicit subject; wins over the type default when non-blank.
    pub subject: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub user_name: String,
    pub user_email: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl NotificationRequest {
    pub fn new(
        notification_type: NotificationType,
        user_name: impl Into<String>,
        user_email: impl Into<String>,
    ) -> Self {
        Self {
            notification_type: Some(notification_type),
            user_name: user_name.into(),
            user_email: user_email.into(),
            ..Default::default()
        }
    }

    pub fn with_recipient(mut self, to: impl Into<String>) -> Self {
        self.recipient_override = Some(to.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Destination address: the override when non-blank, else the user's email.
    pub fn resolved_recipient(&self) -> Option<&str> {
        non_blank(self.recipient_override.as_deref()).or_else(|| non_blank(Some(&self.user_email)))
    }

    /// Subject supplied by the caller, if any.
    pub fn explicit_subject(&self) -> Option<&str> {
        non_blank(self.subject.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Persisted audit record for one delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub to: String,
    pub subject: String,
    pub notification_type: NotificationType,
    pub user_name: String,
    pub user_email: String,
    pub created_at: DateTime<Utc>,
    pub sent: bool,
    pub error_message: Option<String>,
}

impl Notification {
    /// Apply the outcome of the delivery attempt.
    pub fn finalize(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => {
                self.sent = true;
                self.error_message = None;
            }
            DeliveryOutcome::Rejected => {
                self.sent = false;
                self.error_message = Some(DeliveryOutcome::REJECTED_MESSAGE.to_string());
            }
            DeliveryOutcome::Failed(reason) => {
                self.sent = false;
                self.error_message = Some(reason.clone());
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.sent && self.error_message.is_none()
    }
}

/// Pending-shape insert DTO: `sent=false`, no error.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub to: String,
    pub subject: String,
    pub notification_type: NotificationType,
    pub user_name: String,
    pub user_email: String,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    pub fn into_notification(self, id: Uuid) -> Notification {
        Notification {
            id,
            to: self.to,
            subject: self.subject,
            notification_type: self.notification_type,
            user_name: self.user_name,
            user_email: self.user_email,
            created_at: self.created_at,
            sent: false,
            error_message: None,
        }
    }
}

/// Result of handing an email to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Transport answered without raising but refused the message.
    Rejected,
    /// Transport raised; carries the error message.
    Failed(String),
}

impl DeliveryOutcome {
    pub const REJECTED_MESSAGE: &'static str = "Email service returned false";
    pub const UNKNOWN_FAILURE: &'static str = "Unknown email delivery error";

    /// Build a failure, substituting a fixed message for an empty reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if reason.trim().is_empty() {
            DeliveryOutcome::Failed(Self::UNKNOWN_FAILURE.to_string())
        } else {
            DeliveryOutcome::Failed(reason)
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }

    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Rejected => "rejected",
            DeliveryOutcome::Failed(_) => "failed",
        }
    }
}
