//! Email subject and body rendering.
//!
//! Content is chosen from a lookup table keyed by [`NotificationType`], with an
//! explicit default entry for types that have none registered. Bodies are
//! Handlebars templates rendered as plain text.

use crate::error::{NotificationError, NotificationResult};
use crate::models::{NotificationRequest, NotificationType};
use handlebars::{Handlebars, no_escape};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_TEMPLATE: &str = "default";
const WHEN_FORMAT: &str = "%d/%m/%Y %H:%M:%S UTC";
const WHEN_UNKNOWN: &str = "agora";

const LOGIN_SUBJECT: &str = "Login efetuado";
const LOGIN_BODY: &str = "Olá {{user_name}}, detectamos um login na sua conta em {{when}}.";

const USER_CREATED_SUBJECT: &str = "Bem-Vindo!";
const USER_CREATED_BODY: &str = "Olá {{user_name}}, seu cadastro foi criado em {{when}}.";

const DEFAULT_SUBJECT: &str = "Notificação";
const DEFAULT_BODY: &str = "Olá {{user_name}}, você tem uma nova notificação.";

/// Rendered email content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

/// Subject and body template source for one notification type.
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub subject: String,
    pub body: String,
}

impl TemplateEntry {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Serialize)]
struct BodyContext<'a> {
    user_name: &'a str,
    when: String,
}

/// Template engine for notification emails.
#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Arc<Handlebars<'static>>,
    subjects: Arc<HashMap<String, String>>,
}

impl TemplateEngine {
    /// Engine with the built-in pt-BR entries for every notification type.
    pub fn new() -> NotificationResult<Self> {
        Self::builder()
            .entry(NotificationType::Login, TemplateEntry::new(LOGIN_SUBJECT, LOGIN_BODY))
            .entry(
                NotificationType::UserCreated,
                TemplateEntry::new(USER_CREATED_SUBJECT, USER_CREATED_BODY),
            )
            .build()
    }

    /// Start an empty table; only the default entry is pre-registered.
    pub fn builder() -> TemplateEngineBuilder {
        TemplateEngineBuilder {
            entries: Vec::new(),
            default: TemplateEntry::new(DEFAULT_SUBJECT, DEFAULT_BODY),
        }
    }

    /// Render subject and body for a request.
    ///
    /// A non-blank explicit subject overrides the table subject.
    pub fn render(&self, request: &NotificationRequest) -> NotificationResult<RenderedEmail> {
        let key = self.key_for(request.notification_type);

        let subject = match request.explicit_subject() {
            Some(subject) => subject.to_string(),
            None => self
                .subjects
                .get(key)
                .cloned()
                .ok_or_else(|| {
                    NotificationError::TemplateError(format!("no subject for '{key}'"))
                })?,
        };

        let context = BodyContext {
            user_name: &request.user_name,
            when: request
                .created_at
                .map(|at| at.format(WHEN_FORMAT).to_string())
                .unwrap_or_else(|| WHEN_UNKNOWN.to_string()),
        };
        let body = self.handlebars.render(key, &context)?;

        debug!(template = %key, subject = %subject, "Rendered notification email");
        Ok(RenderedEmail { subject, body })
    }

    fn key_for(&self, notification_type: Option<NotificationType>) -> &str {
        match notification_type {
            Some(t) => {
                let name: &'static str = t.into();
                if self.handlebars.has_template(name) {
                    name
                } else {
                    DEFAULT_TEMPLATE
                }
            }
            None => DEFAULT_TEMPLATE,
        }
    }
}

/// Builder for a [`TemplateEngine`] lookup table.
pub struct TemplateEngineBuilder {
    entries: Vec<(NotificationType, TemplateEntry)>,
    default: TemplateEntry,
}

impl TemplateEngineBuilder {
    pub fn entry(mut self, notification_type: NotificationType, entry: TemplateEntry) -> Self {
        self.entries.push((notification_type, entry));
        self
    }

    pub fn default_entry(mut self, entry: TemplateEntry) -> Self {
        self.default = entry;
        self
    }

    pub fn build(self) -> NotificationResult<TemplateEngine> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        handlebars.set_strict_mode(true);

        let mut subjects = HashMap::new();
        let named = self
            .entries
            .into_iter()
            .map(|(t, entry)| (<&'static str>::from(t), entry));

        for (name, entry) in named.chain(std::iter::once((DEFAULT_TEMPLATE, self.default))) {
            handlebars
                .register_template_string(name, &entry.body)
                .map_err(|e| {
                    NotificationError::TemplateError(format!("Failed to register {name}: {e}"))
                })?;
            subjects.insert(name.to_string(), entry.subject);
        }

        Ok(TemplateEngine {
            handlebars: Arc::new(handlebars),
            subjects: Arc::new(subjects),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
    }

    #[test]
    fn login_uses_type_defaults() {
        let engine = TemplateEngine::new().unwrap();
        let req = NotificationRequest::new(NotificationType::Login, "ana", "ana@x.com")
            .with_created_at(at());

        let email = engine.render(&req).unwrap();

        assert_eq!(email.subject, "Login efetuado");
        assert_eq!(
            email.body,
            "Olá ana, detectamos um login na sua conta em 14/11/2023 22:13:20 UTC."
        );
    }

    #[test]
    fn user_created_uses_type_defaults() {
        let engine = TemplateEngine::new().unwrap();
        let req = NotificationRequest::new(NotificationType::UserCreated, "bia", "bia@x.com")
            .with_created_at(at());

        let email = engine.render(&req).unwrap();

        assert_eq!(email.subject, "Bem-Vindo!");
        assert_eq!(email.body, "Olá bia, seu cadastro foi criado em 14/11/2023 22:13:20 UTC.");
    }

    #[test]
    fn missing_created_at_renders_now_word() {
        let engine = TemplateEngine::new().unwrap();
        let req = NotificationRequest::new(NotificationType::UserCreated, "bia", "bia@x.com");

        let email = engine.render(&req).unwrap();
        assert_eq!(email.body, "Olá bia, seu cadastro foi criado em agora.");
    }

    #[test]
    fn explicit_subject_overrides_table() {
        let engine = TemplateEngine::new().unwrap();
        let req = NotificationRequest::new(NotificationType::Login, "ana", "ana@x.com")
            .with_subject("Security alert");

        assert_eq!(engine.render(&req).unwrap().subject, "Security alert");
    }

    #[test]
    fn blank_subject_does_not_override() {
        let engine = TemplateEngine::new().unwrap();
        let req = NotificationRequest::new(NotificationType::Login, "ana", "ana@x.com")
            .with_subject("  ");

        assert_eq!(engine.render(&req).unwrap().subject, "Login efetuado");
    }

    #[test]
    fn unregistered_type_uses_default_entry() {
        let engine = TemplateEngine::builder()
            .entry(NotificationType::Login, TemplateEntry::new(LOGIN_SUBJECT, LOGIN_BODY))
            .build()
            .unwrap();
        let req = NotificationRequest::new(NotificationType::UserCreated, "bia", "bia@x.com");

        let email = engine.render(&req).unwrap();

        assert_eq!(email.subject, "Notificação");
        assert_eq!(email.body, "Olá bia, você tem uma nova notificação.");
    }

    #[test]
    fn names_are_not_html_escaped() {
        let engine = TemplateEngine::new().unwrap();
        let req = NotificationRequest::new(NotificationType::UserCreated, "Ana & <Bia>", "a@x.com");

        let email = engine.render(&req).unwrap();
        assert!(email.body.starts_with("Olá Ana & <Bia>,"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let engine = TemplateEngine::new().unwrap();
        let req = NotificationRequest::new(NotificationType::Login, "ana", "ana@x.com")
            .with_created_at(at());

        assert_eq!(engine.render(&req).unwrap(), engine.render(&req).unwrap());
    }

    #[test]
    fn invalid_template_is_rejected_at_build() {
        let result = TemplateEngine::builder()
            .default_entry(TemplateEntry::new("x", "{{#if}}"))
            .build();
        assert!(matches!(result, Err(NotificationError::TemplateError(_))));
    }
}
