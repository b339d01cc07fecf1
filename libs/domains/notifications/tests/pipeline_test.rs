//! End-to-end tests for the event → record → email pipeline, using the
//! in-memory repository and the capturing email provider.

use chrono::{TimeZone, Utc};
use domain_notifications::{
    CapturingEmailProvider, EventKind, EventListener, InMemoryNotificationRepository,
    ListenerOutcome, NotificationError, NotificationProcessor, NotificationRequest,
    NotificationService, NotificationType, ProcessorConfig, SendBehavior, TemplateEngine,
};
use serde_json::json;
use std::sync::Arc;

struct Harness {
    repo: Arc<InMemoryNotificationRepository>,
    provider: Arc<CapturingEmailProvider>,
    listener: EventListener<InMemoryNotificationRepository, CapturingEmailProvider>,
}

fn harness(provider: CapturingEmailProvider) -> Harness {
    let repo = Arc::new(InMemoryNotificationRepository::new());
    let provider = Arc::new(provider);
    let processor = NotificationProcessor::with_arcs(
        Arc::clone(&repo),
        Arc::clone(&provider),
        TemplateEngine::new().expect("templates"),
        ProcessorConfig::default(),
    );
    Harness {
        repo,
        provider,
        listener: EventListener::new(processor),
    }
}

mod listener_tests {
    use super::*;

    #[tokio::test]
    async fn login_event_is_delivered_and_recorded() {
        let h = harness(CapturingEmailProvider::new());
        let payload = json!({
            "eventType": "UserLoggedIn",
            "data": {"userName": "ana", "userEmail": "ana@x.com", "timestamp": 1700000000}
        });

        let outcome = h.listener.on_user_login(&payload).await;

        assert!(outcome.is_delivered());
        let records = h.repo.all().await;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.notification_type, NotificationType::Login);
        assert_eq!(record.to, "ana@x.com");
        assert_eq!(record.subject, "System notification");
        assert_eq!(
            record.created_at,
            Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
        );
        assert!(record.sent);
        assert_eq!(record.error_message, None);

        let emails = h.provider.sent_emails();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "Login efetuado");
        assert_eq!(
            emails[0].text_body,
            "Olá ana, detectamos um login na sua conta em 14/11/2023 22:13:20 UTC."
        );
    }

    #[tokio::test]
    async fn user_created_missing_email_is_dropped() {
        let h = harness(CapturingEmailProvider::new());
        let payload = json!({"data": {"userName": "ana", "createdAt": "2024-01-01T00:00:00Z"}});

        let outcome = h.listener.on_user_created(&payload).await;

        assert!(matches!(
            outcome,
            ListenerOutcome::Dropped(NotificationError::MissingField("userEmail"))
        ));
        assert!(h.repo.is_empty().await);
        assert_eq!(h.provider.sent_count(), 0);
    }

    #[tokio::test]
    async fn malformed_envelopes_persist_nothing() {
        let h = harness(CapturingEmailProvider::new());

        for payload in [
            json!({}),
            json!({"data": null}),
            json!({"data": "ana@x.com"}),
            json!({"data": [1, 2]}),
            json!("just a string"),
        ] {
            let outcome = h.listener.handle(EventKind::UserCreated, &payload).await;
            assert!(matches!(outcome, ListenerOutcome::Dropped(_)), "{payload}");
        }

        assert!(h.repo.is_empty().await);
        assert_eq!(h.provider.sent_count(), 0);
    }

    #[tokio::test]
    async fn transport_error_is_recorded_on_the_notification() {
        let h = harness(CapturingEmailProvider::failing("SMTP timeout"));
        let payload = json!({
            "data": {
                "userName": "bia",
                "userEmail": "bia@x.com",
                "createdAt": "2024-02-03T04:05:06Z"
            }
        });

        let outcome = h.listener.on_user_created(&payload).await;

        assert!(matches!(outcome, ListenerOutcome::NotDelivered));
        let records = h.repo.all().await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].sent);
        assert_eq!(records[0].error_message.as_deref(), Some("SMTP timeout"));
    }

    #[tokio::test]
    async fn transport_rejection_is_recorded_with_fixed_message() {
        let h = harness(CapturingEmailProvider::rejecting());
        let payload = json!({"data": {"userName": "bia", "userEmail": "bia@x.com"}});

        h.listener.on_user_created(&payload).await;

        let records = h.repo.all().await;
        assert_eq!(
            records[0].error_message.as_deref(),
            Some("Email service returned false")
        );
    }

    #[tokio::test]
    async fn each_event_creates_its_own_record() {
        let h = harness(CapturingEmailProvider::new());
        let payload = json!({"data": {"userName": "ana", "userEmail": "ana@x.com"}});

        h.listener.on_user_login(&payload).await;
        h.provider.set_behavior(SendBehavior::Fail("relay down".into()));
        h.listener.on_user_login(&payload).await;

        let service = NotificationService::with_repository(Arc::clone(&h.repo));
        assert_eq!(service.by_user_email("ana@x.com").await.unwrap().len(), 2);
        let pending = service.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].error_message.as_deref(), Some("relay down"));
    }
}

mod processor_tests {
    use super::*;

    #[tokio::test]
    async fn direct_request_success_returns_true() {
        let h = harness(CapturingEmailProvider::new());
        let request = NotificationRequest::new(NotificationType::UserCreated, "bia", "bia@x.com")
            .with_created_at(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());

        assert!(h.listener.processor().process(request).await);

        let record = &h.repo.all().await[0];
        assert!(record.sent);
        assert_eq!(record.error_message, None);
        assert_eq!(
            h.provider.sent_emails()[0].text_body,
            "Olá bia, seu cadastro foi criado em 02/01/2024 03:04:05 UTC."
        );
    }

    #[tokio::test]
    async fn invalid_requests_never_touch_storage() {
        let h = harness(CapturingEmailProvider::new());
        let processor = h.listener.processor();

        let no_type = NotificationRequest {
            notification_type: None,
            ..NotificationRequest::new(NotificationType::Login, "ana", "ana@x.com")
        };
        assert!(!processor.process(no_type).await);
        assert!(
            !processor
                .process(NotificationRequest::new(NotificationType::Login, "ana", ""))
                .await
        );
        assert!(
            !processor
                .process(NotificationRequest::new(NotificationType::Login, " ", "ana@x.com"))
                .await
        );

        assert!(h.repo.is_empty().await);
        assert_eq!(h.provider.sent_count(), 0);
    }
}
