//! `SeaORM` Entity for users

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    /// 'creator', 'account_manager' or 'admin'
    pub role: String,
    /// Number of TikTok + Instagram account pairs an account manager operates
    pub account_pairs: i32,
    /// Creator contract: 'option1', 'option2' or NULL
    pub contract_option: Option<String>,
    pub paypal_info: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
