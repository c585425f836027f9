//! Migration to track which days the CPM batch has booked and which
//! (post, day) items it still has to retry

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CpmBookedDays::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CpmBookedDays::Date)
                            .date()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CpmBookedDays::Appended)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CpmBookedDays::Failed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CpmBookedDays::BookedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CpmFailedItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CpmFailedItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CpmFailedItems::PostId).uuid().not_null())
                    .col(ColumnDef::new(CpmFailedItems::Date).date().not_null())
                    .col(ColumnDef::new(CpmFailedItems::Code).string_len(32).not_null())
                    .col(ColumnDef::new(CpmFailedItems::Error).text().not_null())
                    .col(
                        ColumnDef::new(CpmFailedItems::Attempts)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(CpmFailedItems::LastAttemptAt)
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
                    .name("idx_cpm_failed_items_post_date")
                    .table(CpmFailedItems::Table)
                    .col(CpmFailedItems::PostId)
                    .col(CpmFailedItems::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CpmFailedItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CpmBookedDays::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CpmBookedDays {
    Table,
    Date,
    Appended,
    Failed,
    BookedAt,
}

#[derive(DeriveIden)]
enum CpmFailedItems {
    Table,
    Id,
    PostId,
    Date,
    Code,
    Error,
    Attempts,
    LastAttemptAt,
}
