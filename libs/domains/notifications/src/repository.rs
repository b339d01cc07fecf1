use async_trait::async_trait;
use uuid::Uuid;

use crate::error::NotificationResult;
use crate::models::{NewNotification, Notification, NotificationType};

/// Repository trait for notification record persistence.
///
/// Records are inserted once in the pending shape and updated once with the
/// delivery outcome. Nothing here deletes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert a pending record and return it with its generated id.
    async fn insert(&self, input: NewNotification) -> NotificationResult<Notification>;

    /// Overwrite the stored record with `notification`'s state.
    async fn update(&self, notification: &Notification) -> NotificationResult<Notification>;

    async fn get_by_id(&self, id: Uuid) -> NotificationResult<Option<Notification>>;

    /// Records whose email was not delivered (`sent = false`).
    async fn find_unsent(&self) -> NotificationResult<Vec<Notification>>;

    async fn find_by_type(
        &self,
        notification_type: NotificationType,
    ) -> NotificationResult<Vec<Notification>>;

    async fn find_by_user_email(&self, user_email: &str) -> NotificationResult<Vec<Notification>>;
}
