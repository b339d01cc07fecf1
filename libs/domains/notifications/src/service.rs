//! Read-only queries over notification records, for audit and retry tooling.

use crate::error::{NotificationError, NotificationResult};
use crate::models::{Notification, NotificationType};
use crate::repository::NotificationRepository;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

pub struct NotificationService<R: NotificationRepository> {
    repository: Arc<R>,
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    pub fn with_repository(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Records whose email did not go out.
    #[instrument(skip(self))]
    pub async fn pending(&self) -> NotificationResult<Vec<Notification>> {
        self.repository.find_unsent().await
    }

    #[instrument(skip(self))]
    pub async fn by_type(
        &self,
        notification_type: NotificationType,
    ) -> NotificationResult<Vec<Notification>> {
        self.repository.find_by_type(notification_type).await
    }

    #[instrument(skip(self))]
    pub async fn by_user_email(&self, user_email: &str) -> NotificationResult<Vec<Notification>> {
        let user_email = user_email.trim();
        if user_email.is_empty() {
            return Err(NotificationError::InvalidRequest(
                "user email must not be blank".to_string(),
            ));
        }
        self.repository.find_by_user_email(user_email).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> NotificationResult<Notification> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(NotificationError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewNotification;
    use crate::repository::MockNotificationRepository;
    use chrono::Utc;
    use mockall::predicate;

    fn record(sent: bool) -> Notification {
        let mut n = NewNotification {
            to: "ana@x.com".into(),
            subject: "System notification".into(),
            notification_type: NotificationType::UserCreated,
            user_name: "ana".into(),
            user_email: "ana@x.com".into(),
            created_at: Utc::now(),
        }
        .into_notification(Uuid::now_v7());
        n.sent = sent;
        n
    }

    #[tokio::test]
    async fn pending_delegates_to_unsent_query() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_find_unsent()
            .times(1)
            .returning(|| Ok(vec![record(false)]));

        let service = NotificationService::new(repo);
        let pending = service.pending().await.unwrap();

        assert_eq!(pending.len(), 1);
        assert!(!pending[0].sent);
    }

    #[tokio::test]
    async fn by_type_passes_type_through() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_find_by_type()
            .with(predicate::eq(NotificationType::UserCreated))
            .times(1)
            .returning(|_| Ok(vec![record(true)]));

        let service = NotificationService::new(repo);
        assert_eq!(
            service.by_type(NotificationType::UserCreated).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn by_user_email_trims_input() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_find_by_user_email()
            .withf(|email| email == "ana@x.com")
            .times(1)
            .returning(|_| Ok(vec![]));

        let service = NotificationService::new(repo);
        assert!(service.by_user_email("  ana@x.com ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn by_user_email_rejects_blank() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_find_by_user_email().never();

        let service = NotificationService::new(repo);
        let err = service.by_user_email("  ").await.unwrap_err();
        assert!(matches!(err, NotificationError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let id = Uuid::now_v7();
        let mut repo = MockNotificationRepository::new();
        repo.expect_get_by_id()
            .with(predicate::eq(id))
            .returning(|_| Ok(None));

        let service = NotificationService::new(repo);
        let err = service.get(id).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(missing) if missing == id));
    }
}
