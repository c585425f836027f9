//! Migration to create monthly creator payouts
//!
//! One row per creator and UTC calendar month. Amounts are recomputed while
//! the row is pending and frozen once it is approved.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UgcCreatorPayouts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UgcCreatorPayouts::UserId).uuid().not_null())
                    .col(ColumnDef::new(UgcCreatorPayouts::PeriodYear).integer().not_null())
                    .col(ColumnDef::new(UgcCreatorPayouts::PeriodMonth).integer().not_null())
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::ContractOption)
                            .string_len(16)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::PostsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::ApprovedPostsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::PostsMissing)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::CanClaim)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::TotalViews)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::BaseAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::CpmAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::TotalAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(UgcCreatorPayouts::PaypalInfo).text().null())
                    // 'pending' | 'approved' | 'paid'
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(UgcCreatorPayouts::ApprovedBy).uuid().null())
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::ApprovedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(UgcCreatorPayouts::UpdatedAt)
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
                    .name("idx_ugc_creator_payouts_user_period")
                    .table(UgcCreatorPayouts::Table)
                    .col(UgcCreatorPayouts::UserId)
                    .col(UgcCreatorPayouts::PeriodYear)
                    .col(UgcCreatorPayouts::PeriodMonth)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ugc_creator_payouts_status")
                    .table(UgcCreatorPayouts::Table)
                    .col(UgcCreatorPayouts::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UgcCreatorPayouts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UgcCreatorPayouts {
    Table,
    Id,
    UserId,
    PeriodYear,
    PeriodMonth,
    ContractOption,
    PostsCount,
    ApprovedPostsCount,
    PostsMissing,
    CanClaim,
    TotalViews,
    BaseAmount,
    CpmAmount,
    TotalAmount,
    PaypalInfo,
    Status,
    ApprovedBy,
    ApprovedAt,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}
