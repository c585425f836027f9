#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use creator_payouts_backend::config::{
    AccountManagerConfig, CpmConfig, CreatorPayoutConfig, JobConfig,
};
use creator_payouts_backend::models::post::{ContentType, Platform, PostRecord, PostStatus};
use creator_payouts_backend::storage::{
    MemoryCreatorPayoutStore, MemoryLedgerStore, MemoryPayoutStore, MemoryPostRepository,
};
use creator_payouts_backend::{AppState, Stores};
use rust_decimal_macros::dec;
use sea_orm::{Database, DatabaseConnection, DbErr};
use uuid::Uuid;

/// Set up test database connection
///
/// Returns `None` when TEST_DATABASE_URL is not set so database tests can
/// skip on machines without Postgres.
pub async fn setup_test_db() -> Option<Result<DatabaseConnection, DbErr>> {
    let database_url = env::var("TEST_DATABASE_URL").ok()?;
    Some(Database::connect(&database_url).await)
}

/// In-memory stores shared by every router built from them
pub struct TestStores {
    pub ledger: Arc<MemoryLedgerStore>,
    pub payouts: Arc<MemoryPayoutStore>,
    pub creator_payouts: Arc<MemoryCreatorPayoutStore>,
    pub posts: Arc<MemoryPostRepository>,
}

impl TestStores {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(MemoryLedgerStore::new()),
            payouts: Arc::new(MemoryPayoutStore::new()),
            creator_payouts: Arc::new(MemoryCreatorPayoutStore::new()),
            posts: Arc::new(MemoryPostRepository::new()),
        }
    }
}

/// $1.50 CPM, $350 per post, $5000 per user per month, 28 day window
pub fn cpm_config() -> CpmConfig {
    CpmConfig::new(dec!(1.50), dec!(350), dec!(5000), 28).unwrap()
}

/// 10 posts per pair per day, $10 weekly bonus, $50 monthly bonus
pub fn account_manager_config() -> AccountManagerConfig {
    AccountManagerConfig::new(10, dec!(10), dec!(50)).unwrap()
}

pub fn test_state(stores: &TestStores) -> AppState {
    AppState::new(
        Stores {
            ledger: stores.ledger.clone(),
            payouts: stores.payouts.clone(),
            creator_payouts: stores.creator_payouts.clone(),
            posts: stores.posts.clone(),
        },
        cpm_config(),
        account_manager_config(),
        CreatorPayoutConfig::default(),
        &JobConfig::default(),
    )
}

pub fn approved_post(submitted_by: Uuid, created_at: DateTime<Utc>) -> PostRecord {
    PostRecord {
        id: Uuid::new_v4(),
        submitted_by,
        account_id: None,
        platform: Platform::Tiktok,
        status: PostStatus::Approved,
        content_type: ContentType::UgcVideo,
        created_at,
    }
}
