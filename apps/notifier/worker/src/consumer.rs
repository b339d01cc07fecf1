//! Redis Streams consumer: one loop per event stream, reading through a
//! consumer group and handing each entry to the event listener.
//!
//! Every entry is acknowledged once handled, whatever the outcome. There is
//! no retry path: a failed delivery is already recorded on the notification.

use crate::metrics;
use crate::settings::ConsumerConfig;
use domain_notifications::{
    EmailProvider, EventKind, EventListener, ListenerOutcome, NotificationError,
    NotificationRepository, NotificationResult,
};
use futures::FutureExt;
use redis::aio::ConnectionManager;
use redis::{RedisError, RedisResult};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Stream entry field carrying the JSON event envelope.
pub const PAYLOAD_FIELD: &str = "payload";

const MAX_BACKOFF_SECS: u64 = 30;

type StreamReply = Vec<(String, Vec<(String, Vec<(String, String)>)>)>;

/// One entry read from a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

pub struct EventStreamConsumer<R: NotificationRepository, P: EmailProvider> {
    redis: ConnectionManager,
    listener: EventListener<R, P>,
    kind: EventKind,
    stream: String,
    config: ConsumerConfig,
    semaphore: Arc<Semaphore>,
}

impl<R, P> EventStreamConsumer<R, P>
where
    R: NotificationRepository + 'static,
    P: EmailProvider + 'static,
{
    pub fn new(
        redis: ConnectionManager,
        listener: EventListener<R, P>,
        kind: EventKind,
        stream: impl Into<String>,
        config: ConsumerConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_events));
        Self {
            redis,
            listener,
            kind,
            stream: stream.into(),
            config,
            semaphore,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Create the consumer group at the stream tail if it does not exist.
    pub async fn ensure_consumer_group(&self) -> RedisResult<()> {
        let mut conn = self.redis.clone();
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %self.stream,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    stream = %self.stream,
                    group = %self.config.consumer_group,
                    "Consumer group already exists"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run until the shutdown flag flips. In-flight batches finish first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> RedisResult<()> {
        info!(
            kind = %self.kind,
            stream = %self.stream,
            group = %self.config.consumer_group,
            consumer_id = %self.config.consumer_id,
            batch_size = self.config.batch_size,
            max_concurrent_events = self.config.max_concurrent_events,
            "Starting event consumer"
        );

        self.ensure_consumer_group().await?;
        self.recover_pending().await;

        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let mut wait = self.config.poll_interval;
            match self.read_batch(">").await {
                Ok(entries) => {
                    if consecutive_errors > 0 {
                        info!(
                            stream = %self.stream,
                            "Recovered after {} errors", consecutive_errors
                        );
                        consecutive_errors = 0;
                    }
                    if !entries.is_empty() {
                        self.handle_entries(entries).await;
                        continue;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if is_nogroup_error(&e) {
                        warn!(stream = %self.stream, "Consumer group missing, recreating");
                        if let Err(create_err) = self.ensure_consumer_group().await {
                            error!(error = %create_err, "Failed to recreate consumer group");
                        }
                    } else if is_connection_error(&e) {
                        wait = backoff(consecutive_errors);
                        warn!(
                            stream = %self.stream,
                            error = %e,
                            consecutive_errors,
                            backoff_secs = wait.as_secs(),
                            "Redis connection error, backing off"
                        );
                    } else {
                        error!(stream = %self.stream, error = %e, "Failed to read from stream");
                    }
                }
            }

            if wait_or_shutdown(&mut shutdown, wait).await {
                break;
            }
        }

        info!(stream = %self.stream, "Event consumer stopped");
        Ok(())
    }

    /// Drain entries delivered to this consumer id but never acknowledged.
    async fn recover_pending(&self) {
        loop {
            match self.read_batch("0").await {
                Ok(entries) if entries.is_empty() => return,
                Ok(entries) => {
                    let count = entries.len();
                    warn!(stream = %self.stream, count, "Recovering pending entries");
                    self.handle_entries(entries).await;
                    if count < self.config.batch_size {
                        return;
                    }
                }
                Err(e) => {
                    warn!(stream = %self.stream, error = %e, "Failed to read pending entries");
                    return;
                }
            }
        }
    }

    async fn read_batch(&self, start_id: &str) -> RedisResult<Vec<StreamEntry>> {
        let mut conn = self.redis.clone();
        let reply: Option<StreamReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg("COUNT")
            .arg(self.config.batch_size)
            .arg("STREAMS")
            .arg(&self.stream)
            .arg(start_id)
            .query_async(&mut conn)
            .await?;

        Ok(flatten_reply(reply.unwrap_or_default()))
    }

    /// Handle a batch concurrently, bounded by the semaphore.
    async fn handle_entries(&self, entries: Vec<StreamEntry>) {
        let mut join_set: JoinSet<()> = JoinSet::new();

        for entry in entries {
            let semaphore = Arc::clone(&self.semaphore);
            let listener = self.listener.clone();
            let redis = self.redis.clone();
            let stream = self.stream.clone();
            let group = self.config.consumer_group.clone();
            let kind = self.kind;

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!(entry_id = %entry.id, "Semaphore closed, leaving entry pending");
                        return;
                    }
                };

                dispatch(&listener, kind, &stream, &entry).await;
                acknowledge(redis, &stream, &group, &entry.id).await;
            });
        }

        while let Some(result) = join_set.join_next().await {
            if let Err(e) = result {
                error!(stream = %self.stream, error = %e, "Event task failed");
            }
        }
    }
}

async fn dispatch<R, P>(
    listener: &EventListener<R, P>,
    kind: EventKind,
    stream: &str,
    entry: &StreamEntry,
) where
    R: NotificationRepository,
    P: EmailProvider,
{
    metrics::event_received(stream);

    let payload = match parse_payload(&entry.fields) {
        Ok(payload) => payload,
        Err(e) => {
            error!(stream = %stream, entry_id = %entry.id, error = %e, "Dropping unreadable entry");
            metrics::event_handled(stream, "dropped");
            return;
        }
    };

    match AssertUnwindSafe(listener.handle(kind, &payload)).catch_unwind().await {
        Ok(outcome) => metrics::event_handled(stream, outcome_label(&outcome)),
        Err(panic) => {
            error!(
                stream = %stream,
                entry_id = %entry.id,
                panic = %panic_message(panic.as_ref()),
                "Event handler panicked"
            );
            metrics::event_panicked(stream);
        }
    }
}

async fn acknowledge(mut conn: ConnectionManager, stream: &str, group: &str, id: &str) {
    let result: RedisResult<i64> = redis::cmd("XACK")
        .arg(stream)
        .arg(group)
        .arg(id)
        .query_async(&mut conn)
        .await;

    match result {
        Ok(_) => debug!(stream = %stream, entry_id = %id, "Acknowledged entry"),
        Err(e) => {
            warn!(stream = %stream, entry_id = %id, error = %e, "Failed to acknowledge entry");
            metrics::ack_failed(stream);
        }
    }
}

fn flatten_reply(reply: StreamReply) -> Vec<StreamEntry> {
    reply
        .into_iter()
        .flat_map(|(_stream, entries)| entries)
        .map(|(id, fields)| StreamEntry { id, fields })
        .collect()
}

/// Extract and decode the JSON envelope from an entry's fields.
pub fn parse_payload(fields: &[(String, String)]) -> NotificationResult<Value> {
    let raw = fields
        .iter()
        .find(|(k, _)| k == PAYLOAD_FIELD)
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| {
            NotificationError::MalformedPayload(format!("missing '{PAYLOAD_FIELD}' field"))
        })?;

    Ok(serde_json::from_str(raw)?)
}

pub fn outcome_label(outcome: &ListenerOutcome) -> &'static str {
    match outcome {
        ListenerOutcome::Delivered => "delivered",
        ListenerOutcome::NotDelivered => "not_delivered",
        ListenerOutcome::Dropped(_) => "dropped",
    }
}

pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn is_connection_error(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

fn is_nogroup_error(e: &RedisError) -> bool {
    e.to_string().contains("NOGROUP")
}

/// Exponential backoff: 2, 4, 8, 16, 30, 30, ... seconds.
fn backoff(consecutive_errors: u32) -> Duration {
    Duration::from_secs(2u64.pow(consecutive_errors.min(5)).min(MAX_BACKOFF_SECS))
}

/// Sleep for `wait`; returns true if shutdown was requested meanwhile.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, wait: Duration) -> bool {
    tokio::select! {
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        _ = tokio::time::sleep(wait) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_payload_field() {
        let value = parse_payload(&fields(&[
            ("source", "auth"),
            ("payload", r#"{"data":{"userName":"ana"}}"#),
        ]))
        .unwrap();

        assert_eq!(value, json!({"data": {"userName": "ana"}}));
    }

    #[test]
    fn missing_payload_field_is_malformed() {
        let err = parse_payload(&fields(&[("job", "{}")])).unwrap_err();
        assert!(matches!(err, NotificationError::MalformedPayload(_)));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_payload(&fields(&[("payload", "{not json")])).unwrap_err();
        assert!(matches!(err, NotificationError::MalformedPayload(_)));
    }

    #[test]
    fn flattens_stream_reply() {
        let reply: StreamReply = vec![(
            "events:user-login".to_string(),
            vec![
                ("1-0".to_string(), fields(&[("payload", "{}")])),
                ("2-0".to_string(), fields(&[("payload", "[]")])),
            ],
        )];

        let entries = flatten_reply(reply);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "1-0");
        assert_eq!(entries[1].fields[0].1, "[]");
    }

    #[test]
    fn labels_outcomes() {
        assert_eq!(outcome_label(&ListenerOutcome::Delivered), "delivered");
        assert_eq!(outcome_label(&ListenerOutcome::NotDelivered), "not_delivered");
        assert_eq!(
            outcome_label(&ListenerOutcome::Dropped(NotificationError::MissingField("userEmail"))),
            "dropped"
        );
    }

    #[test]
    fn panic_message_handles_common_payloads() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(s.as_ref()), "boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(owned.as_ref()), "owned boom");

        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn catch_unwind_isolates_a_panicking_handler() {
        let handler = async {
            if true {
                panic!("handler exploded");
            }
            1u8
        };

        let result = AssertUnwindSafe(handler).catch_unwind().await;

        let panic = result.unwrap_err();
        assert_eq!(panic_message(panic.as_ref()), "handler exploded");
    }

    #[test]
    fn io_errors_are_connection_errors() {
        let err = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(is_connection_error(&err));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff(1), Duration::from_secs(2));
        assert_eq!(backoff(4), Duration::from_secs(16));
        assert_eq!(backoff(5), Duration::from_secs(30));
        assert_eq!(backoff(12), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn shutdown_interrupts_the_wait() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert!(wait_or_shutdown(&mut rx, Duration::from_secs(60)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_elapses_without_shutdown() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(!wait_or_shutdown(&mut rx, Duration::from_millis(500)).await);
    }
}
