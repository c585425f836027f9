//! Migration to create account-manager payouts
//!
//! Status moves pending -> approved -> paid and never regresses.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AccountManagerPayouts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccountManagerPayouts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AccountManagerPayouts::UserId).uuid().not_null())
                    // 'weekly' | 'monthly'
                    .col(
                        ColumnDef::new(AccountManagerPayouts::PeriodType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AccountManagerPayouts::PeriodStart).date().not_null())
                    .col(ColumnDef::new(AccountManagerPayouts::PeriodEnd).date().not_null())
                    .col(
                        ColumnDef::new(AccountManagerPayouts::PostsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AccountManagerPayouts::DaysHit)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AccountManagerPayouts::WeeksHit)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AccountManagerPayouts::BaseAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountManagerPayouts::BonusAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountManagerPayouts::TotalAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    // 'pending' | 'approved' | 'paid'
                    .col(
                        ColumnDef::new(AccountManagerPayouts::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(AccountManagerPayouts::ApprovedBy).uuid().null())
                    .col(
                        ColumnDef::new(AccountManagerPayouts::ApprovedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AccountManagerPayouts::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AccountManagerPayouts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One payout per user and period
        manager
            .create_index(
                Index::create()
                    .name("idx_am_payouts_user_period")
                    .table(AccountManagerPayouts::Table)
                    .col(AccountManagerPayouts::UserId)
                    .col(AccountManagerPayouts::PeriodType)
                    .col(AccountManagerPayouts::PeriodStart)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_am_payouts_status")
                    .table(AccountManagerPayouts::Table)
                    .col(AccountManagerPayouts::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccountManagerPayouts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AccountManagerPayouts {
    Table,
    Id,
    UserId,
    PeriodType,
    PeriodStart,
    PeriodEnd,
    PostsCount,
    DaysHit,
    WeeksHit,
    BaseAmount,
    BonusAmount,
    TotalAmount,
    Status,
    ApprovedBy,
    ApprovedAt,
    PaidAt,
    CreatedAt,
}
