//! Migration to create the CPM breakdown ledger
//!
//! One write-once row per (post, day). The unique (post_id, date) index is the
//! backstop against a retried batch crediting the same day twice.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CpmPostBreakdown::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CpmPostBreakdown::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CpmPostBreakdown::PostId).uuid().not_null())
                    .col(ColumnDef::new(CpmPostBreakdown::UserId).uuid().not_null())
                    .col(ColumnDef::new(CpmPostBreakdown::Date).date().not_null())
                    .col(
                        ColumnDef::new(CpmPostBreakdown::CumulativeViews)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::ReportedViews)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::ViewsDelta)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::CpmEarned)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::PostAgeDays)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::CumulativePostCpm)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::CumulativeUserMonthlyCpm)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::IsPostCapped)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::IsUserMonthlyCapped)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::IsViewRegression)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CpmPostBreakdown::CreatedAt)
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
                    .name("idx_cpm_post_breakdown_post_date")
                    .table(CpmPostBreakdown::Table)
                    .col(CpmPostBreakdown::PostId)
                    .col(CpmPostBreakdown::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Monthly totals are summed per user over a date range
        manager
            .create_index(
                Index::create()
                    .name("idx_cpm_post_breakdown_user_date")
                    .table(CpmPostBreakdown::Table)
                    .col(CpmPostBreakdown::UserId)
                    .col(CpmPostBreakdown::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CpmPostBreakdown::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CpmPostBreakdown {
    Table,
    Id,
    PostId,
    UserId,
    Date,
    CumulativeViews,
    ReportedViews,
    ViewsDelta,
    CpmEarned,
    PostAgeDays,
    CumulativePostCpm,
    CumulativeUserMonthlyCpm,
    IsPostCapped,
    IsUserMonthlyCapped,
    IsViewRegression,
    CreatedAt,
}
