//! Storage seams for the ledger, payouts and the post/analytics source.
//!
//! # Implementations
//!
//! - `postgres`: sea-orm backed, used by the server and the jobs
//! - `memory`: in-process maps, used by tests and dry runs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;

use crate::models::cpm::{LedgerRow, NewLedgerRow};
use crate::models::creator_payout::{
    CreatorPayout, CreatorPayoutDraft, CreatorPayoutFilter, CreatorProfile, MonthlyEarnings,
};
use crate::models::payout::{NewPayout, Payout, PayoutFilter, PayoutStatus};
use crate::models::post::{PostRecord, TeamAssignment, ViewSnapshot};
use crate::services::calendar::YearMonth;

pub mod memory;
pub mod postgres;

pub use memory::{
    MemoryBatchProgressStore, MemoryCreatorPayoutStore, MemoryLedgerStore, MemoryPayoutStore,
    MemoryPostRepository,
};
pub use postgres::{
    PgBatchProgressStore, PgCreatorPayoutStore, PgLedgerStore, PgPayoutStore, PgPostRepository,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("invalid stored value: {0}")]
    InvalidData(String),
    #[error("ledger for user {0} changed since it was read")]
    Conflict(Uuid),
    #[error("database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::UniqueViolation(detail),
            _ => StoreError::Database(err),
        }
    }
}

/// Fingerprint of a user's ledger rows.
///
/// Any insert or delete changes it, so a commit that names the version it
/// computed against fails instead of overwriting newer rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerVersion {
    pub rows: i64,
    pub max_id: Option<i64>,
}

/// One atomic change to a user's ledger
#[derive(Debug, Clone, Default)]
pub struct LedgerWrite {
    /// Delete every row of the user dated on or after this day first
    pub delete_from: Option<NaiveDate>,
    /// Rows to insert, in order
    pub insert: Vec<NewLedgerRow>,
}

#[derive(Debug, Clone)]
pub struct LedgerWriteOutcome {
    pub rows_deleted: u64,
    pub rows: Vec<LedgerRow>,
}

/// Persistence for CPM breakdown rows
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Most recent row for a post by date
    async fn latest_row(&self, post_id: Uuid) -> Result<Option<LedgerRow>, StoreError>;

    async fn user_version(&self, user_id: Uuid) -> Result<LedgerVersion, StoreError>;

    /// Apply `write` in one transaction if the user's ledger is still at
    /// `expected`, otherwise fail with [`StoreError::Conflict`].
    ///
    /// A second row for the same (post, date) is a
    /// [`StoreError::UniqueViolation`] and nothing is written.
    async fn commit_user_rows(
        &self,
        user_id: Uuid,
        expected: LedgerVersion,
        write: LedgerWrite,
    ) -> Result<LedgerWriteOutcome, StoreError>;

    /// Sum of credited amounts for a user within a calendar month
    async fn monthly_total(&self, user_id: Uuid, month: YearMonth) -> Result<Decimal, StoreError>;

    /// All rows for a post, oldest first
    async fn rows_for_post(&self, post_id: Uuid) -> Result<Vec<LedgerRow>, StoreError>;

    /// Rows for a user within an optional inclusive date range, oldest first
    async fn rows_for_user(
        &self,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<LedgerRow>, StoreError>;

    /// Per-user sums over every row dated within `month`, ordered by user
    async fn monthly_user_totals(&self, month: YearMonth) -> Result<Vec<MonthlyEarnings>, StoreError>;
}

/// Persistence for account-manager payouts
#[async_trait]
pub trait PayoutStore: Send + Sync {
    /// Insert a pending payout; an existing (user, period type, start) is a
    /// [`StoreError::UniqueViolation`]
    async fn insert_payout(&self, payout: NewPayout) -> Result<Payout, StoreError>;

    async fn get_payout(&self, id: Uuid) -> Result<Option<Payout>, StoreError>;

    async fn list_payouts(&self, filter: PayoutFilter) -> Result<Vec<Payout>, StoreError>;

    /// Move a payout from `from` to `to` only if it is currently in `from`.
    ///
    /// Returns `None` when no payout with that id is in `from`.
    async fn transition(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
        approved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Option<Payout>, StoreError>;
}

/// Persistence for monthly creator payouts
#[async_trait]
pub trait CreatorPayoutStore: Send + Sync {
    /// Insert a pending payout; an existing (user, month) is a
    /// [`StoreError::UniqueViolation`]
    async fn insert_creator_payout(&self, draft: CreatorPayoutDraft)
    -> Result<CreatorPayout, StoreError>;

    async fn get_creator_payout(&self, id: Uuid) -> Result<Option<CreatorPayout>, StoreError>;

    async fn find_creator_payout(
        &self,
        user_id: Uuid,
        period: YearMonth,
    ) -> Result<Option<CreatorPayout>, StoreError>;

    /// Overwrite the amounts of a payout that is still pending.
    ///
    /// Returns `None` when no pending payout with that id exists.
    async fn update_pending_creator_payout(
        &self,
        id: Uuid,
        draft: CreatorPayoutDraft,
    ) -> Result<Option<CreatorPayout>, StoreError>;

    /// Newest month first
    async fn list_creator_payouts(
        &self,
        filter: CreatorPayoutFilter,
    ) -> Result<Vec<CreatorPayout>, StoreError>;

    /// Compare-and-set status change, as [`PayoutStore::transition`]
    async fn transition_creator_payout(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
        approved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Option<CreatorPayout>, StoreError>;
}

/// A (post, day) the ledger batch could not book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub post_id: Uuid,
    pub date: NaiveDate,
    pub code: String,
    pub error: String,
    pub attempts: i32,
}

/// Progress of the daily ledger batch, so restarts resume where it stopped
#[async_trait]
pub trait BatchProgressStore: Send + Sync {
    /// Latest day the batch finished
    async fn last_booked_day(&self) -> Result<Option<NaiveDate>, StoreError>;

    async fn mark_day_booked(&self, date: NaiveDate, appended: i32, failed: i32)
    -> Result<(), StoreError>;

    /// Record a failure, bumping the attempt count when the item is known
    async fn record_failed_item(
        &self,
        post_id: Uuid,
        date: NaiveDate,
        code: &str,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Unresolved items with fewer than `max_attempts` attempts, oldest day first
    async fn pending_failed_items(&self, max_attempts: i32) -> Result<Vec<FailedItem>, StoreError>;

    async fn resolve_failed_item(&self, post_id: Uuid, date: NaiveDate) -> Result<(), StoreError>;
}

/// Read side of the externally populated post and analytics tables
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn find_post(&self, post_id: Uuid) -> Result<Option<PostRecord>, StoreError>;

    /// Approved posts created within `[from, to]`
    async fn approved_posts_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>, StoreError>;

    /// Approved slideshow posts submitted by a user within `[from, to]`,
    /// optionally restricted to a set of accounts
    async fn approved_slideshows(
        &self,
        user_id: Uuid,
        accounts: Option<&[Uuid]>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>, StoreError>;

    async fn record_snapshot(&self, snapshot: &ViewSnapshot) -> Result<(), StoreError>;

    /// Latest snapshot fetched at or before `at`
    async fn latest_snapshot_before(
        &self,
        post_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ViewSnapshot>, StoreError>;

    /// Snapshots fetched within `[from, to]`, oldest first
    async fn snapshots_between(
        &self,
        post_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ViewSnapshot>, StoreError>;

    /// Configured account pairs for a user, `None` when the user is unknown
    async fn account_pairs(&self, user_id: Uuid) -> Result<Option<i32>, StoreError>;

    async fn team_assignment(&self, id: Uuid) -> Result<Option<TeamAssignment>, StoreError>;

    /// Ids of every user with the account-manager role
    async fn account_managers(&self) -> Result<Vec<Uuid>, StoreError>;

    /// Contract details of a user with the creator role, `None` otherwise
    async fn creator_profile(&self, user_id: Uuid) -> Result<Option<CreatorProfile>, StoreError>;
}
