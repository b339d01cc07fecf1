use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::{
    entity,
    error::NotificationResult,
    models::{NewNotification, Notification, NotificationType},
    repository::NotificationRepository,
};

/// PostgreSQL-backed notification repository.
#[derive(Clone)]
pub struct PgNotificationRepository {
    db: DatabaseConnection,
}

impl PgNotificationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_where(
        &self,
        filter: sea_orm::Condition,
    ) -> NotificationResult<Vec<Notification>> {
        let models = entity::Entity::find()
            .filter(filter)
            .order_by_asc(entity::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, input: NewNotification) -> NotificationResult<Notification> {
        let active_model: entity::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        tracing::debug!(notification_id = %model.id, "Inserted pending notification");
        Ok(model.into())
    }

    async fn update(&self, notification: &Notification) -> NotificationResult<Notification> {
        let active_model: entity::ActiveModel = notification.into();
        let model = active_model.update(&self.db).await?;

        tracing::debug!(notification_id = %model.id, sent = model.sent, "Updated notification");
        Ok(model.into())
    }

    async fn get_by_id(&self, id: Uuid) -> NotificationResult<Option<Notification>> {
        let model = entity::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_unsent(&self) -> NotificationResult<Vec<Notification>> {
        self.find_where(sea_orm::Condition::all().add(entity::Column::Sent.eq(false)))
            .await
    }

    async fn find_by_type(
        &self,
        notification_type: NotificationType,
    ) -> NotificationResult<Vec<Notification>> {
        self.find_where(
            sea_orm::Condition::all().add(entity::Column::NotificationType.eq(notification_type)),
        )
        .await
    }

    async fn find_by_user_email(&self, user_email: &str) -> NotificationResult<Vec<Notification>> {
        self.find_where(sea_orm::Condition::all().add(entity::Column::UserEmail.eq(user_email)))
            .await
    }
}
