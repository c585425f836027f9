use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Posts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Posts::Url).text().not_null())
                    .col(ColumnDef::new(Posts::Platform).string_len(16).not_null())
                    .col(ColumnDef::new(Posts::AccountId).uuid().null())
                    .col(ColumnDef::new(Posts::SubmittedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Posts::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Posts::ContentType)
                            .string_len(16)
                            .not_null()
                            .default("ugc_video"),
                    )
                    .col(
                        ColumnDef::new(Posts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Ledger batch: approved posts inside the earning window
        manager
            .create_index(
                Index::create()
                    .name("idx_posts_status_created_at")
                    .table(Posts::Table)
                    .col(Posts::Status)
                    .col(Posts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Account-manager activity: a user's posts by day
        manager
            .create_index(
                Index::create()
                    .name("idx_posts_submitted_by_created_at")
                    .table(Posts::Table)
                    .col(Posts::SubmittedBy)
                    .col(Posts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
    Url,
    Platform,
    AccountId,
    SubmittedBy,
    Status,
    ContentType,
    CreatedAt,
}
