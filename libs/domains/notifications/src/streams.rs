//! Stream definitions for inbound user events.

use crate::events::EventKind;
use core_config::{ConfigError, FromEnv, env_or_default};
use strum::IntoEnumIterator;

/// Default consumer group shared by all notification workers.
pub const CONSUMER_GROUP: &str = "notification_workers";

/// Stream names per event kind plus the consumer group reading them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStreams {
    pub user_created: String,
    pub user_login: String,
    pub consumer_group: String,
}

impl Default for EventStreams {
    fn default() -> Self {
        Self {
            user_created: EventKind::UserCreated.default_stream().to_string(),
            user_login: EventKind::UserLogin.default_stream().to_string(),
            consumer_group: CONSUMER_GROUP.to_string(),
        }
    }
}

impl EventStreams {
    pub fn stream_for(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::UserCreated => &self.user_created,
            EventKind::UserLogin => &self.user_login,
        }
    }

    /// Every (kind, stream) pair, one consumer loop each.
    pub fn bindings(&self) -> Vec<(EventKind, String)> {
        EventKind::iter()
            .map(|kind| (kind, self.stream_for(kind).to_string()))
            .collect()
    }
}

impl FromEnv for EventStreams {
    /// EVENTS_USER_CREATED_STREAM, EVENTS_USER_LOGIN_STREAM, EVENTS_CONSUMER_GROUP.
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            user_created: env_or_default("EVENTS_USER_CREATED_STREAM", &defaults.user_created),
            user_login: env_or_default("EVENTS_USER_LOGIN_STREAM", &defaults.user_login),
            consumer_group: env_or_default("EVENTS_CONSUMER_GROUP", &defaults.consumer_group),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let streams = EventStreams::default();
        assert_eq!(streams.stream_for(EventKind::UserCreated), "events:user-created");
        assert_eq!(streams.stream_for(EventKind::UserLogin), "events:user-login");
        assert_eq!(streams.consumer_group, "notification_workers");
    }

    #[test]
    fn bindings_cover_every_kind() {
        let bindings = EventStreams::default().bindings();
        assert_eq!(bindings.len(), 2);
        assert!(bindings.contains(&(EventKind::UserLogin, "events:user-login".to_string())));
    }

    #[test]
    fn env_overrides() {
        temp_env::with_vars(
            [
                ("EVENTS_USER_CREATED_STREAM", Some("users.created")),
                ("EVENTS_USER_LOGIN_STREAM", None),
                ("EVENTS_CONSUMER_GROUP", Some("mailers")),
            ],
            || {
                let streams = EventStreams::from_env().unwrap();
                assert_eq!(streams.user_created, "users.created");
                assert_eq!(streams.user_login, "events:user-login");
                assert_eq!(streams.consumer_group, "mailers");
            },
        );
    }
}
