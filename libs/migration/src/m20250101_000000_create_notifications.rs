use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(pk_uuid(Notifications::Id))
                    .col(string_len(Notifications::RecipientEmail, 255))
                    .col(string_len(Notifications::Subject, 255))
                    .col(string_len(Notifications::Type, 32))
                    .col(string_len(Notifications::UserName, 255))
                    .col(string_len(Notifications::UserEmail, 255))
                    .col(timestamp_with_time_zone(Notifications::CreatedAt))
                    .col(boolean(Notifications::Sent).default(false))
                    .col(text_null(Notifications::ErrorMessage))
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_notifications_sent", Notifications::Sent),
            ("idx_notifications_type", Notifications::Type),
            ("idx_notifications_user_email", Notifications::UserEmail),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Notifications::Table)
                        .col(column)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum Notifications {
    Table,
    Id,
    RecipientEmail,
    Subject,
    Type,
    UserName,
    UserEmail,
    CreatedAt,
    Sent,
    ErrorMessage,
}
