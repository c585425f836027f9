//! SeaORM Entity for monthly creator payouts

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ugc_creator_payouts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub period_year: i32,
    /// 1-12
    pub period_month: i32,
    pub contract_option: Option<String>,
    /// Posts with ledger rows in the month
    pub posts_count: i32,
    /// Approved posts created in the month
    pub approved_posts_count: i32,
    pub posts_missing: i32,
    pub can_claim: bool,
    pub total_views: i64,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub base_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub cpm_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_amount: Decimal,
    pub paypal_info: Option<String>,
    /// 'pending', 'approved' or 'paid'
    pub status: String,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTimeWithTimeZone>,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
