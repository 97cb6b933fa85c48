use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========================================
        // MAIL_JOBS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(MailJobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MailJobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(MailJobs::OwnerId).integer().not_null())
                    .col(ColumnDef::new(MailJobs::Payload).text().not_null())
                    .col(ColumnDef::new(MailJobs::Attachments).text().null())
                    .col(
                        ColumnDef::new(MailJobs::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(MailJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(MailJobs::LastError).text().null())
                    .col(
                        ColumnDef::new(MailJobs::ProviderMessageId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MailJobs::ScheduledFor)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MailJobs::ClaimedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MailJobs::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MailJobs::InsertedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MailJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Poll query filters on status and walks inserted_at in order
        manager
            .create_index(
                Index::create()
                    .name("idx_mail_jobs_status_inserted_at")
                    .table(MailJobs::Table)
                    .col(MailJobs::Status)
                    .col(MailJobs::InsertedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mail_jobs_owner_id")
                    .table(MailJobs::Table)
                    .col(MailJobs::OwnerId)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // LABELS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Labels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Labels::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Labels::OwnerId).integer().not_null())
                    .col(ColumnDef::new(Labels::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Labels::Color).string_len(7).null())
                    .col(
                        ColumnDef::new(Labels::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Labels::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_labels_owner_name")
                    .table(Labels::Table)
                    .col(Labels::OwnerId)
                    .col(Labels::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ========================================
        // TEMPLATES TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Templates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Templates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Templates::OwnerId).integer().not_null())
                    .col(ColumnDef::new(Templates::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Templates::Subject).text().not_null())
                    .col(ColumnDef::new(Templates::HtmlBody).text().null())
                    .col(ColumnDef::new(Templates::TextBody).text().null())
                    .col(
                        ColumnDef::new(Templates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Templates::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_templates_owner_name")
                    .table(Templates::Table)
                    .col(Templates::OwnerId)
                    .col(Templates::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ========================================
        // STORAGE_USAGE TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(StorageUsage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StorageUsage::OwnerId)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StorageUsage::BytesUsed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StorageUsage::ObjectCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StorageUsage::ComputedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StorageUsage::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_templates_owner_name")
                    .table(Templates::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Templates::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_labels_owner_name")
                    .table(Labels::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Labels::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_mail_jobs_owner_id")
                    .table(MailJobs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_mail_jobs_status_inserted_at")
                    .table(MailJobs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(MailJobs::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum MailJobs {
    Table,
    Id,
    OwnerId,
    Payload,
    Attachments,
    Status,
    Attempts,
    LastError,
    ProviderMessageId,
    ScheduledFor,
    ClaimedAt,
    CompletedAt,
    InsertedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Labels {
    Table,
    Id,
    OwnerId,
    Name,
    Color,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Templates {
    Table,
    Id,
    OwnerId,
    Name,
    Subject,
    HtmlBody,
    TextBody,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StorageUsage {
    Table,
    OwnerId,
    BytesUsed,
    ObjectCount,
    ComputedAt,
}
