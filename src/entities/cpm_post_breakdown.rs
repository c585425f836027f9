//! SeaORM Entity for the CPM breakdown ledger
//!
//! One write-once row per (post, day). Money columns are NUMERIC(12, 2).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "cpm_post_breakdown")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub post_id: Uuid,
    pub user_id: Uuid,
    /// UTC calendar day of the accrual
    pub date: Date,
    /// High-water mark of the post's view count as of this day
    pub cumulative_views: i64,
    /// Raw measurement that produced this row
    pub reported_views: i64,
    pub views_delta: i64,
    /// Dollars credited for this day after both caps
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub cpm_earned: Decimal,
    pub post_age_days: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub cumulative_post_cpm: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub cumulative_user_monthly_cpm: Decimal,
    pub is_post_capped: bool,
    pub is_user_monthly_capped: bool,
    pub is_view_regression: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
