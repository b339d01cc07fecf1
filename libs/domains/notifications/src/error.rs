//! Error types for the notifications domain.

use std::time::Duration;
use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
///
/// None of these ever reach the message bus as a redelivery signal: payload
/// and validation errors drop the event, delivery errors are written onto the
/// notification record.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The event envelope is not shaped like an event (no `data` object).
    #[error("Malformed event payload: {0}")]
    MalformedPayload(String),

    /// A field the event must carry is absent or null.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The canonical request failed validation.
    #[error("Invalid notification request: {0}")]
    InvalidRequest(String),

    /// Email provider error.
    #[error("{0}")]
    ProviderError(String),

    /// The provider did not answer within the configured send timeout.
    #[error("Email delivery timed out after {0:?}")]
    Timeout(Duration),

    /// Template rendering error.
    #[error("Template rendering error: {0}")]
    TemplateError(String),

    /// Database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Record lookup by id found nothing.
    #[error("Notification not found: {0}")]
    NotFound(uuid::Uuid),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for NotificationError {
    fn from(err: sea_orm::DbErr) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::TemplateError(err.to_string())
    }
}

impl From<handlebars::TemplateError> for NotificationError {
    fn from(err: handlebars::TemplateError) -> Self {
        NotificationError::TemplateError(err.to_string())
    }
}

impl From<core_config::ConfigError> for NotificationError {
    fn from(err: core_config::ConfigError) -> Self {
        NotificationError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::MalformedPayload(err.to_string())
    }
}
