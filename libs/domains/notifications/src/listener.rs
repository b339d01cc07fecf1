//! Event listener: one entry point per inbound event kind.

use crate::error::NotificationError;
use crate::events::{self, EventKind};
use crate::processor::NotificationProcessor;
use crate::providers::EmailProvider;
use crate::repository::NotificationRepository;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happened to one inbound event. Every variant is terminal.
#[derive(Debug)]
pub enum ListenerOutcome {
    Delivered,
    /// The request was processed but no email went out.
    NotDelivered,
    /// The payload could not be turned into a request.
    Dropped(NotificationError),
}

impl ListenerOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ListenerOutcome::Delivered)
    }
}

pub struct EventListener<R: NotificationRepository, P: EmailProvider> {
    processor: Arc<NotificationProcessor<R, P>>,
}

impl<R: NotificationRepository, P: EmailProvider> Clone for EventListener<R, P> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
        }
    }
}

impl<R: NotificationRepository, P: EmailProvider> EventListener<R, P> {
    pub fn new(processor: NotificationProcessor<R, P>) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }

    pub fn processor(&self) -> &NotificationProcessor<R, P> {
        &self.processor
    }

    pub async fn on_user_created(&self, payload: &Value) -> ListenerOutcome {
        self.handle(EventKind::UserCreated, payload).await
    }

    pub async fn on_user_login(&self, payload: &Value) -> ListenerOutcome {
        self.handle(EventKind::UserLogin, payload).await
    }

    /// Translate and process one event. Never returns an error.
    pub async fn handle(&self, kind: EventKind, payload: &Value) -> ListenerOutcome {
        let request = match events::translate(kind, payload) {
            Ok(request) => request,
            Err(e) => {
                error!(kind = %kind, error = %e, "Dropping event that could not be translated");
                return ListenerOutcome::Dropped(e);
            }
        };

        let user_email = request.user_email.clone();
        if self.processor.process(request).await {
            info!(kind = %kind, user_email = %user_email, "Event handled, email delivered");
            ListenerOutcome::Delivered
        } else {
            warn!(kind = %kind, user_email = %user_email, "Event handled, email not delivered");
            ListenerOutcome::NotDelivered
        }
    }
}
