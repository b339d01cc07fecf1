//! Translation of inbound user events into notification requests.
//!
//! Envelope shape:
//!
//! ```json
//! { "eventType": "...", "occurredAt": "...",
//!   "data": { "userName": "...", "userEmail": "...", "createdAt" | "timestamp": ... } }
//! ```
//!
//! All untyped access happens in [`UserEvent::decode`]; everything after it
//! works on typed fields.

use crate::error::{NotificationError, NotificationResult};
use crate::models::{NotificationRequest, NotificationType};
use crate::timestamp::{self, NormalizedTimestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter};
use tracing::{debug, warn};

/// Supported inbound event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    UserCreated,
    UserLogin,
}

impl EventKind {
    pub fn notification_type(self) -> NotificationType {
        match self {
            EventKind::UserCreated => NotificationType::UserCreated,
            EventKind::UserLogin => NotificationType::Login,
        }
    }

    /// Field inside `data` that carries the event's own timestamp.
    pub fn timestamp_field(self) -> &'static str {
        match self {
            EventKind::UserCreated => "createdAt",
            EventKind::UserLogin => "timestamp",
        }
    }

    pub fn default_stream(self) -> &'static str {
        match self {
            EventKind::UserCreated => "events:user-created",
            EventKind::UserLogin => "events:user-login",
        }
    }
}

/// Typed view of a user event, produced by the single decode step.
#[derive(Debug, Clone, PartialEq)]
pub struct UserEvent {
    pub kind: EventKind,
    pub event_type: Option<String>,
    pub user_name: String,
    pub user_email: String,
    pub timestamp: Option<NormalizedTimestamp>,
}

impl UserEvent {
    pub fn decode(kind: EventKind, payload: &Value) -> NotificationResult<Self> {
        let envelope = payload.as_object().ok_or_else(|| {
            NotificationError::MalformedPayload("event payload is not a JSON object".to_string())
        })?;

        let data = match envelope.get("data") {
            Some(Value::Object(data)) => data,
            Some(_) => {
                return Err(NotificationError::MalformedPayload(
                    "'data' is not an object".to_string(),
                ));
            }
            None => {
                return Err(NotificationError::MalformedPayload(
                    "'data' is missing".to_string(),
                ));
            }
        };

        let user_name = required_text(data, "userName")?;
        let user_email = required_text(data, "userEmail")?;

        let timestamp = timestamp::normalize(data.get(kind.timestamp_field()))
            .or_else(|| timestamp::normalize(envelope.get("occurredAt")));

        Ok(Self {
            kind,
            event_type: envelope
                .get("eventType")
                .and_then(Value::as_str)
                .map(str::to_owned),
            user_name,
            user_email,
            timestamp,
        })
    }

    pub fn into_request(self) -> NotificationRequest {
        NotificationRequest {
            recipient_override: Some(self.user_email.clone()),
            subject: None,
            notification_type: Some(self.kind.notification_type()),
            user_name: self.user_name,
            user_email: self.user_email,
            created_at: self.timestamp.map(|ts| ts.instant()),
        }
    }
}

/// Map a raw event envelope into a canonical [`NotificationRequest`].
pub fn translate(kind: EventKind, payload: &Value) -> NotificationResult<NotificationRequest> {
    let event = UserEvent::decode(kind, payload)?;
    debug!(
        kind = %kind,
        event_type = event.event_type.as_deref().unwrap_or("unspecified"),
        "Translating event"
    );
    if let Some(NormalizedTimestamp::Fallback { reason, .. }) = &event.timestamp {
        warn!(
            kind = %kind,
            user_email = %event.user_email,
            reason = %reason,
            "Event timestamp replaced with current time"
        );
    }
    Ok(event.into_request())
}

/// Read a scalar field as text. Strings are taken as-is, numbers and
/// booleans are stringified, null or absent is a missing field.
fn required_text(data: &Map<String, Value>, field: &'static str) -> NotificationResult<String> {
    match data.get(field) {
        None | Some(Value::Null) => Err(NotificationError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(NotificationError::MalformedPayload(format!(
            "'{field}' must be a scalar value"
        ))),
    }
}
