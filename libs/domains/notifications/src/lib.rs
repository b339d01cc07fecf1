//! Notifications Domain
//!
//! Turns user lifecycle events into persisted notification records and
//! outbound emails.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Redis Streams  │  ← events:user-created, events:user-login
//! └────────┬────────┘
//!          │ raw JSON payload
//! ┌────────▼────────┐
//! │  EventListener  │  ← translate, drop malformed events
//! └────────┬────────┘
//!          │ NotificationRequest
//! ┌────────▼────────┐
//! │    Processor    │  ← validate, insert pending, send, finalize
//! └───┬─────────┬───┘
//!     │         │
//! ┌───▼───┐ ┌───▼────────────┐
//! │ Repo  │ │ TemplateEngine │
//! └───────┘ │ EmailProvider  │
//!           └────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{
//!     EventListener, InMemoryNotificationRepository, NotificationProcessor,
//!     ProcessorConfig, SmtpProvider, TemplateEngine,
//! };
//!
//! let processor = NotificationProcessor::new(
//!     InMemoryNotificationRepository::new(),
//!     SmtpProvider::mailhog()?,
//!     TemplateEngine::new()?,
//!     ProcessorConfig::default(),
//! );
//! let listener = EventListener::new(processor);
//! listener.on_user_login(&payload).await;
//! ```

pub mod entity;
pub mod error;
pub mod events;
pub mod listener;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod processor;
pub mod providers;
pub mod repository;
pub mod service;
pub mod streams;
pub mod templates;
pub mod timestamp;

// Re-export commonly used types
pub use error::{NotificationError, NotificationResult};
pub use events::{EventKind, UserEvent, translate};
pub use listener::{EventListener, ListenerOutcome};
pub use memory::InMemoryNotificationRepository;
pub use models::{
    DeliveryOutcome, NewNotification, Notification, NotificationRequest, NotificationType,
};
pub use postgres::PgNotificationRepository;
pub use processor::{NotificationProcessor, ProcessorConfig};
pub use providers::{CapturingEmailProvider, EmailProvider, SendBehavior, SmtpConfig, SmtpProvider};
pub use repository::NotificationRepository;
pub use service::NotificationService;
pub use streams::EventStreams;
pub use templates::{RenderedEmail, TemplateEngine};
pub use timestamp::NormalizedTimestamp;
