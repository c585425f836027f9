//! `SeaORM` Entity for submitted posts

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub url: String,
    /// 'tiktok' or 'instagram'
    pub platform: String,
    pub account_id: Option<Uuid>,
    pub submitted_by: Uuid,
    /// 'pending', 'approved' or 'rejected'
    pub status: String,
    /// 'ugc_video' or 'slideshow'
    pub content_type: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
