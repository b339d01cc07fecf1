//! In-memory notification repository for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{NotificationError, NotificationResult};
use crate::models::{NewNotification, Notification, NotificationType};
use crate::repository::NotificationRepository;

#[derive(Clone, Default)]
pub struct InMemoryNotificationRepository {
    records: Arc<RwLock<HashMap<Uuid, Notification>>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records, oldest first.
    pub async fn all(&self) -> Vec<Notification> {
        let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
        all.sort_by_key(|n| (n.created_at, n.id));
        all
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn find_matching<F>(&self, predicate: F) -> Vec<Notification>
    where
        F: Fn(&Notification) -> bool,
    {
        self.all().await.into_iter().filter(|n| predicate(n)).collect()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, input: NewNotification) -> NotificationResult<Notification> {
        let notification = input.into_notification(Uuid::now_v7());
        self.records
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn update(&self, notification: &Notification) -> NotificationResult<Notification> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&notification.id)
            .ok_or(NotificationError::NotFound(notification.id))?;
        *stored = notification.clone();
        Ok(stored.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> NotificationResult<Option<Notification>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_unsent(&self) -> NotificationResult<Vec<Notification>> {
        Ok(self.find_matching(|n| !n.sent).await)
    }

    async fn find_by_type(
        &self,
        notification_type: NotificationType,
    ) -> NotificationResult<Vec<Notification>> {
        Ok(self
            .find_matching(|n| n.notification_type == notification_type)
            .await)
    }

    async fn find_by_user_email(&self, user_email: &str) -> NotificationResult<Vec<Notification>> {
        Ok(self.find_matching(|n| n.user_email == user_email).await)
    }
}
