use crate::models::NotificationType;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sea-ORM Entity for the notifications table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_name = "recipient_email")]
    pub to: String,
    pub subject: String,
    #[sea_orm(column_name = "type")]
    pub notification_type: NotificationType,
    pub user_name: String,
    pub user_email: String,
    pub created_at: DateTimeWithTimeZone,
    pub sent: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::Notification {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            to: model.to,
            subject: model.subject,
            notification_type: model.notification_type,
            user_name: model.user_name,
            user_email: model.user_email,
            created_at: model.created_at.into(),
            sent: model.sent,
            error_message: model.error_message,
        }
    }
}

impl From<crate::models::NewNotification> for ActiveModel {
    fn from(input: crate::models::NewNotification) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            to: Set(input.to),
            subject: Set(input.subject),
            notification_type: Set(input.notification_type),
            user_name: Set(input.user_name),
            user_email: Set(input.user_email),
            created_at: Set(input.created_at.into()),
            sent: Set(false),
            error_message: Set(None),
        }
    }
}

impl From<&crate::models::Notification> for ActiveModel {
    fn from(n: &crate::models::Notification) -> Self {
        ActiveModel {
            id: Set(n.id),
            to: Set(n.to.clone()),
            subject: Set(n.subject.clone()),
            notification_type: Set(n.notification_type),
            user_name: Set(n.user_name.clone()),
            user_email: Set(n.user_email.clone()),
            created_at: Set(n.created_at.into()),
            sent: Set(n.sent),
            error_message: Set(n.error_message.clone()),
        }
    }
}
