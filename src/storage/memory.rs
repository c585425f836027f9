//! In-memory store implementations for tests and dry runs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    BatchProgressStore, CreatorPayoutStore, FailedItem, LedgerStore, LedgerVersion, LedgerWrite,
    LedgerWriteOutcome, PayoutStore, PostRepository, StoreError,
};
use crate::models::cpm::{LedgerRow, NewLedgerRow};
use crate::models::creator_payout::{
    ContractOption, CreatorPayout, CreatorPayoutDraft, CreatorPayoutFilter, CreatorProfile,
    MonthlyEarnings,
};
use crate::models::payout::{NewPayout, Payout, PayoutFilter, PayoutStatus};
use crate::models::post::{ContentType, PostRecord, TeamAssignment, ViewSnapshot};
use crate::services::calendar::YearMonth;

/// Ledger rows keyed by post, then by date
#[derive(Default)]
pub struct MemoryLedgerStore {
    rows: RwLock<HashMap<Uuid, BTreeMap<NaiveDate, LedgerRow>>>,
    next_id: AtomicI64,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn materialize(&self, row: NewLedgerRow) -> LedgerRow {
        LedgerRow {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            post_id: row.post_id,
            user_id: row.user_id,
            date: row.date,
            cumulative_views: row.cumulative_views,
            reported_views: row.reported_views,
            views_delta: row.views_delta,
            cpm_earned: row.cpm_earned,
            post_age_days: row.post_age_days,
            cumulative_post_cpm: row.cumulative_post_cpm,
            cumulative_user_monthly_cpm: row.cumulative_user_monthly_cpm,
            is_post_capped: row.is_post_capped,
            is_user_monthly_capped: row.is_user_monthly_capped,
            is_view_regression: row.is_view_regression,
            created_at: Utc::now(),
        }
    }
}

fn version_of(rows: &HashMap<Uuid, BTreeMap<NaiveDate, LedgerRow>>, user_id: Uuid) -> LedgerVersion {
    rows.values()
        .flat_map(|rows| rows.values())
        .filter(|r| r.user_id == user_id)
        .fold(LedgerVersion::default(), |version, r| LedgerVersion {
            rows: version.rows + 1,
            max_id: Some(version.max_id.map_or(r.id, |id| id.max(r.id))),
        })
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn latest_row(&self, post_id: Uuid) -> Result<Option<LedgerRow>, StoreError> {
        Ok(self
            .rows
            .read()
            .get(&post_id)
            .and_then(|rows| rows.values().next_back().cloned()))
    }

    async fn user_version(&self, user_id: Uuid) -> Result<LedgerVersion, StoreError> {
        Ok(version_of(&self.rows.read(), user_id))
    }

    async fn commit_user_rows(
        &self,
        user_id: Uuid,
        expected: LedgerVersion,
        write: LedgerWrite,
    ) -> Result<LedgerWriteOutcome, StoreError> {
        let mut rows = self.rows.write();
        if version_of(&rows, user_id) != expected {
            return Err(StoreError::Conflict(user_id));
        }

        // Work on a copy so a unique violation leaves nothing behind
        let mut staged = rows.clone();
        let mut rows_deleted = 0u64;
        if let Some(from) = write.delete_from {
            for post_rows in staged.values_mut() {
                let before = post_rows.len();
                post_rows.retain(|date, row| row.user_id != user_id || *date < from);
                rows_deleted += (before - post_rows.len()) as u64;
            }
        }

        let mut inserted = Vec::with_capacity(write.insert.len());
        for row in write.insert {
            let post_rows = staged.entry(row.post_id).or_default();
            if post_rows.contains_key(&row.date) {
                return Err(StoreError::UniqueViolation(format!(
                    "cpm_post_breakdown ({}, {})",
                    row.post_id, row.date
                )));
            }
            let stored = self.materialize(row);
            post_rows.insert(stored.date, stored.clone());
            inserted.push(stored);
        }

        *rows = staged;
        Ok(LedgerWriteOutcome {
            rows_deleted,
            rows: inserted,
        })
    }

    async fn monthly_total(&self, user_id: Uuid, month: YearMonth) -> Result<Decimal, StoreError> {
        Ok(self
            .rows
            .read()
            .values()
            .flat_map(|rows| rows.values())
            .filter(|r| r.user_id == user_id && month.contains(r.date))
            .map(|r| r.cpm_earned)
            .sum())
    }

    async fn rows_for_post(&self, post_id: Uuid) -> Result<Vec<LedgerRow>, StoreError> {
        Ok(self
            .rows
            .read()
            .get(&post_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn rows_for_user(
        &self,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<LedgerRow>, StoreError> {
        let mut rows: Vec<LedgerRow> = self
            .rows
            .read()
            .values()
            .flat_map(|rows| rows.values())
            .filter(|r| r.user_id == user_id)
            .filter(|r| from.is_none_or(|f| r.date >= f) && to.is_none_or(|t| r.date <= t))
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.date, r.id));
        Ok(rows)
    }

    async fn monthly_user_totals(&self, month: YearMonth) -> Result<Vec<MonthlyEarnings>, StoreError> {
        let mut totals: BTreeMap<Uuid, (Decimal, i64, BTreeSet<Uuid>)> = BTreeMap::new();
        for row in self
            .rows
            .read()
            .values()
            .flat_map(|rows| rows.values())
            .filter(|r| month.contains(r.date))
        {
            let entry = totals.entry(row.user_id).or_default();
            entry.0 += row.cpm_earned;
            entry.1 += row.views_delta;
            entry.2.insert(row.post_id);
        }

        Ok(totals
            .into_iter()
            .map(|(user_id, (cpm_earned, views_delta, posts))| MonthlyEarnings {
                user_id,
                cpm_earned,
                views_delta,
                posts: posts.len() as i64,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryPayoutStore {
    payouts: RwLock<HashMap<Uuid, Payout>>,
}

impl MemoryPayoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayoutStore for MemoryPayoutStore {
    async fn insert_payout(&self, payout: NewPayout) -> Result<Payout, StoreError> {
        let mut payouts = self.payouts.write();
        let exists = payouts.values().any(|p| {
            p.user_id == payout.user_id
                && p.period_type == payout.period_type
                && p.period_start == payout.period_start
        });
        if exists {
            return Err(StoreError::UniqueViolation(format!(
                "account_manager_payouts ({}, {}, {})",
                payout.user_id, payout.period_type, payout.period_start
            )));
        }

        let stored = Payout {
            id: Uuid::new_v4(),
            user_id: payout.user_id,
            period_type: payout.period_type,
            period_start: payout.period_start,
            period_end: payout.period_end,
            posts_count: payout.posts_count,
            days_hit: payout.days_hit,
            weeks_hit: payout.weeks_hit,
            base_amount: payout.base_amount,
            bonus_amount: payout.bonus_amount,
            total_amount: payout.total_amount,
            status: PayoutStatus::Pending,
            approved_by: None,
            approved_at: None,
            paid_at: None,
            created_at: Utc::now(),
        };
        payouts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_payout(&self, id: Uuid) -> Result<Option<Payout>, StoreError> {
        Ok(self.payouts.read().get(&id).cloned())
    }

    async fn list_payouts(&self, filter: PayoutFilter) -> Result<Vec<Payout>, StoreError> {
        let mut payouts: Vec<Payout> = self
            .payouts
            .read()
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        payouts.sort_by(|a, b| b.period_start.cmp(&a.period_start).then(a.id.cmp(&b.id)));
        Ok(payouts)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
        approved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Option<Payout>, StoreError> {
        let mut payouts = self.payouts.write();
        let Some(payout) = payouts.get_mut(&id) else {
            return Ok(None);
        };
        if payout.status != from {
            return Ok(None);
        }

        payout.status = to;
        match to {
            PayoutStatus::Approved => {
                payout.approved_by = approved_by;
                payout.approved_at = Some(at);
            }
            PayoutStatus::Paid => payout.paid_at = Some(at),
            PayoutStatus::Pending => {}
        }
        Ok(Some(payout.clone()))
    }
}

#[derive(Default)]
pub struct MemoryCreatorPayoutStore {
    payouts: RwLock<HashMap<Uuid, CreatorPayout>>,
}

impl MemoryCreatorPayoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_draft(payout: &mut CreatorPayout, draft: CreatorPayoutDraft) {
    payout.contract_option = draft.contract_option;
    payout.posts_count = draft.posts_count;
    payout.approved_posts_count = draft.approved_posts_count;
    payout.posts_missing = draft.posts_missing;
    payout.can_claim = draft.can_claim;
    payout.total_views = draft.total_views;
    payout.base_amount = draft.base_amount;
    payout.cpm_amount = draft.cpm_amount;
    payout.total_amount = draft.total_amount;
    payout.paypal_info = draft.paypal_info;
    payout.updated_at = Utc::now();
}

#[async_trait]
impl CreatorPayoutStore for MemoryCreatorPayoutStore {
    async fn insert_creator_payout(
        &self,
        draft: CreatorPayoutDraft,
    ) -> Result<CreatorPayout, StoreError> {
        let mut payouts = self.payouts.write();
        if payouts
            .values()
            .any(|p| p.user_id == draft.user_id && p.period == draft.period)
        {
            return Err(StoreError::UniqueViolation(format!(
                "ugc_creator_payouts ({}, {})",
                draft.user_id, draft.period
            )));
        }

        let now = Utc::now();
        let mut stored = CreatorPayout {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            period: draft.period,
            contract_option: None,
            posts_count: 0,
            approved_posts_count: 0,
            posts_missing: 0,
            can_claim: false,
            total_views: 0,
            base_amount: Decimal::ZERO,
            cpm_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            paypal_info: None,
            status: PayoutStatus::Pending,
            approved_by: None,
            approved_at: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        apply_draft(&mut stored, draft);
        payouts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_creator_payout(&self, id: Uuid) -> Result<Option<CreatorPayout>, StoreError> {
        Ok(self.payouts.read().get(&id).cloned())
    }

    async fn find_creator_payout(
        &self,
        user_id: Uuid,
        period: YearMonth,
    ) -> Result<Option<CreatorPayout>, StoreError> {
        Ok(self
            .payouts
            .read()
            .values()
            .find(|p| p.user_id == user_id && p.period == period)
            .cloned())
    }

    async fn update_pending_creator_payout(
        &self,
        id: Uuid,
        draft: CreatorPayoutDraft,
    ) -> Result<Option<CreatorPayout>, StoreError> {
        let mut payouts = self.payouts.write();
        let Some(payout) = payouts.get_mut(&id) else {
            return Ok(None);
        };
        if payout.status != PayoutStatus::Pending {
            return Ok(None);
        }
        apply_draft(payout, draft);
        Ok(Some(payout.clone()))
    }

    async fn list_creator_payouts(
        &self,
        filter: CreatorPayoutFilter,
    ) -> Result<Vec<CreatorPayout>, StoreError> {
        let mut payouts: Vec<CreatorPayout> = self
            .payouts
            .read()
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        payouts.sort_by(|a, b| b.period.cmp(&a.period).then(a.user_id.cmp(&b.user_id)));
        Ok(payouts)
    }

    async fn transition_creator_payout(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
        approved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Option<CreatorPayout>, StoreError> {
        let mut payouts = self.payouts.write();
        let Some(payout) = payouts.get_mut(&id) else {
            return Ok(None);
        };
        if payout.status != from {
            return Ok(None);
        }

        payout.status = to;
        payout.updated_at = at;
        match to {
            PayoutStatus::Approved => {
                payout.approved_by = approved_by;
                payout.approved_at = Some(at);
            }
            PayoutStatus::Paid => payout.paid_at = Some(at),
            PayoutStatus::Pending => {}
        }
        Ok(Some(payout.clone()))
    }
}

/// Booked days and retry queue of the ledger batch
#[derive(Default)]
pub struct MemoryBatchProgressStore {
    booked: RwLock<BTreeMap<NaiveDate, (i32, i32)>>,
    failed: RwLock<BTreeMap<(NaiveDate, Uuid), FailedItem>>,
}

impl MemoryBatchProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded failure, including exhausted ones
    pub fn failed_items(&self) -> Vec<FailedItem> {
        self.failed.read().values().cloned().collect()
    }
}

#[async_trait]
impl BatchProgressStore for MemoryBatchProgressStore {
    async fn last_booked_day(&self) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.booked.read().keys().next_back().copied())
    }

    async fn mark_day_booked(
        &self,
        date: NaiveDate,
        appended: i32,
        failed: i32,
    ) -> Result<(), StoreError> {
        self.booked.write().insert(date, (appended, failed));
        Ok(())
    }

    async fn record_failed_item(
        &self,
        post_id: Uuid,
        date: NaiveDate,
        code: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut failed = self.failed.write();
        let item = failed.entry((date, post_id)).or_insert_with(|| FailedItem {
            post_id,
            date,
            code: String::new(),
            error: String::new(),
            attempts: 0,
        });
        item.code = code.to_string();
        item.error = error.to_string();
        item.attempts += 1;
        Ok(())
    }

    async fn pending_failed_items(&self, max_attempts: i32) -> Result<Vec<FailedItem>, StoreError> {
        Ok(self
            .failed
            .read()
            .values()
            .filter(|item| item.attempts < max_attempts)
            .cloned()
            .collect())
    }

    async fn resolve_failed_item(&self, post_id: Uuid, date: NaiveDate) -> Result<(), StoreError> {
        self.failed.write().remove(&(date, post_id));
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryUser {
    account_pairs: i32,
    is_account_manager: bool,
    creator: Option<CreatorProfile>,
}

/// Posts, snapshots, users and team assignments held in memory
#[derive(Default)]
pub struct MemoryPostRepository {
    posts: RwLock<HashMap<Uuid, PostRecord>>,
    snapshots: RwLock<HashMap<Uuid, Vec<ViewSnapshot>>>,
    users: RwLock<HashMap<Uuid, MemoryUser>>,
    teams: RwLock<HashMap<Uuid, TeamAssignment>>,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_post(&self, post: PostRecord) {
        self.posts.write().insert(post.id, post);
    }

    pub fn add_creator(&self, user_id: Uuid) {
        self.users.write().insert(
            user_id,
            MemoryUser {
                account_pairs: 1,
                is_account_manager: false,
                creator: Some(CreatorProfile::default()),
            },
        );
    }

    /// Register a creator with a signed contract
    pub fn add_contracted_creator(
        &self,
        user_id: Uuid,
        contract: ContractOption,
        paypal_info: Option<&str>,
    ) {
        self.users.write().insert(
            user_id,
            MemoryUser {
                account_pairs: 1,
                is_account_manager: false,
                creator: Some(CreatorProfile {
                    contract_option: Some(contract),
                    paypal_info: paypal_info.map(str::to_string),
                }),
            },
        );
    }

    pub fn add_account_manager(&self, user_id: Uuid, account_pairs: i32) {
        self.users.write().insert(
            user_id,
            MemoryUser {
                account_pairs,
                is_account_manager: true,
                creator: None,
            },
        );
    }

    pub fn add_team_assignment(&self, assignment: TeamAssignment) {
        self.teams.write().insert(assignment.id, assignment);
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn find_post(&self, post_id: Uuid) -> Result<Option<PostRecord>, StoreError> {
        Ok(self.posts.read().get(&post_id).cloned())
    }

    async fn approved_posts_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>, StoreError> {
        let mut posts: Vec<PostRecord> = self
            .posts
            .read()
            .values()
            .filter(|p| p.is_approved() && p.created_at >= from && p.created_at <= to)
            .cloned()
            .collect();
        posts.sort_by_key(|p| (p.created_at, p.id));
        Ok(posts)
    }

    async fn approved_slideshows(
        &self,
        user_id: Uuid,
        accounts: Option<&[Uuid]>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>, StoreError> {
        let mut posts: Vec<PostRecord> = self
            .posts
            .read()
            .values()
            .filter(|p| {
                p.submitted_by == user_id
                    && p.is_approved()
                    && p.content_type == ContentType::Slideshow
                    && p.created_at >= from
                    && p.created_at <= to
            })
            .filter(|p| match accounts {
                Some(ids) => p.account_id.is_some_and(|a| ids.contains(&a)),
                None => true,
            })
            .cloned()
            .collect();
        posts.sort_by_key(|p| (p.created_at, p.id));
        Ok(posts)
    }

    async fn record_snapshot(&self, snapshot: &ViewSnapshot) -> Result<(), StoreError> {
        let mut snapshots = self.snapshots.write();
        let post_snapshots = snapshots.entry(snapshot.post_id).or_default();
        post_snapshots.push(snapshot.clone());
        post_snapshots.sort_by_key(|s| s.fetched_at);
        Ok(())
    }

    async fn latest_snapshot_before(
        &self,
        post_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ViewSnapshot>, StoreError> {
        Ok(self.snapshots.read().get(&post_id).and_then(|snapshots| {
            snapshots
                .iter()
                .filter(|s| s.fetched_at <= at)
                .next_back()
                .cloned()
        }))
    }

    async fn snapshots_between(
        &self,
        post_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ViewSnapshot>, StoreError> {
        Ok(self
            .snapshots
            .read()
            .get(&post_id)
            .map(|snapshots| {
                snapshots
                    .iter()
                    .filter(|s| s.fetched_at >= from && s.fetched_at <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn account_pairs(&self, user_id: Uuid) -> Result<Option<i32>, StoreError> {
        Ok(self.users.read().get(&user_id).map(|u| u.account_pairs))
    }

    async fn team_assignment(&self, id: Uuid) -> Result<Option<TeamAssignment>, StoreError> {
        Ok(self.teams.read().get(&id).cloned())
    }

    async fn account_managers(&self) -> Result<Vec<Uuid>, StoreError> {
        let mut ids: Vec<Uuid> = self
            .users
            .read()
            .iter()
            .filter(|(_, u)| u.is_account_manager)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn creator_profile(&self, user_id: Uuid) -> Result<Option<CreatorProfile>, StoreError> {
        Ok(self
            .users
            .read()
            .get(&user_id)
            .and_then(|u| u.creator.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payout::PeriodType;
    use rust_decimal_macros::dec;

    fn new_row(post_id: Uuid, user_id: Uuid, date: NaiveDate, earned: Decimal) -> NewLedgerRow {
        NewLedgerRow {
            post_id,
            user_id,
            date,
            cumulative_views: 1000,
            reported_views: 1000,
            views_delta: 1000,
            cpm_earned: earned,
            post_age_days: 0,
            cumulative_post_cpm: earned,
            cumulative_user_monthly_cpm: earned,
            is_post_capped: false,
            is_user_monthly_capped: false,
            is_view_regression: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Insert one row against whatever version the store is at
    async fn insert(store: &MemoryLedgerStore, row: NewLedgerRow) -> Result<LedgerRow, StoreError> {
        let version = store.user_version(row.user_id).await?;
        let user_id = row.user_id;
        let outcome = store
            .commit_user_rows(
                user_id,
                version,
                LedgerWrite {
                    delete_from: None,
                    insert: vec![row],
                },
            )
            .await?;
        Ok(outcome.rows[0].clone())
    }

    #[tokio::test]
    async fn test_duplicate_row_is_unique_violation() {
        let store = MemoryLedgerStore::new();
        let (post, user) = (Uuid::new_v4(), Uuid::new_v4());
        insert(&store, new_row(post, user, date(2026, 1, 5), dec!(1.50)))
            .await
            .unwrap();
        let err = insert(&store, new_row(post, user, date(2026, 1, 5), dec!(1.50)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_monthly_total_only_counts_that_month() {
        let store = MemoryLedgerStore::new();
        let user = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        insert(&store, new_row(a, user, date(2026, 1, 31), dec!(4.00))).await.unwrap();
        insert(&store, new_row(a, user, date(2026, 2, 1), dec!(2.25))).await.unwrap();
        insert(&store, new_row(b, user, date(2026, 2, 3), dec!(1.10))).await.unwrap();
        insert(&store, new_row(b, Uuid::new_v4(), date(2026, 2, 4), dec!(9.99)))
            .await
            .unwrap();

        let feb = YearMonth::new(2026, 2).unwrap();
        assert_eq!(store.monthly_total(user, feb).await.unwrap(), dec!(3.35));
    }

    #[tokio::test]
    async fn test_commit_deletes_user_rows_across_posts_and_keeps_earlier_days() {
        let store = MemoryLedgerStore::new();
        let (user, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for day in 1..=4 {
            insert(&store, new_row(a, user, date(2026, 3, day), dec!(1))).await.unwrap();
            insert(&store, new_row(b, other, date(2026, 3, day), dec!(1))).await.unwrap();
        }
        insert(&store, new_row(b, user, date(2026, 3, 5), dec!(1))).await.unwrap();

        let version = store.user_version(user).await.unwrap();
        let outcome = store
            .commit_user_rows(
                user,
                version,
                LedgerWrite {
                    delete_from: Some(date(2026, 3, 3)),
                    insert: vec![new_row(a, user, date(2026, 3, 3), dec!(2))],
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.rows_deleted, 3);
        assert_eq!(outcome.rows.len(), 1);

        let latest = store.latest_row(a).await.unwrap().unwrap();
        assert_eq!((latest.date, latest.cpm_earned), (date(2026, 3, 3), dec!(2)));
        // Another user's rows on the same post survive
        assert_eq!(store.rows_for_post(b).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts_and_failed_commit_writes_nothing() {
        let store = MemoryLedgerStore::new();
        let (post, user) = (Uuid::new_v4(), Uuid::new_v4());
        let stale = store.user_version(user).await.unwrap();
        insert(&store, new_row(post, user, date(2026, 3, 1), dec!(1))).await.unwrap();

        let err = store
            .commit_user_rows(
                user,
                stale,
                LedgerWrite {
                    delete_from: None,
                    insert: vec![new_row(post, user, date(2026, 3, 2), dec!(1))],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(u) if u == user));

        // Duplicate in the middle of a batch rolls back the delete too
        let current = store.user_version(user).await.unwrap();
        let err = store
            .commit_user_rows(
                user,
                current,
                LedgerWrite {
                    delete_from: Some(date(2026, 3, 1)),
                    insert: vec![
                        new_row(post, user, date(2026, 3, 1), dec!(5)),
                        new_row(post, user, date(2026, 3, 1), dec!(5)),
                    ],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert_eq!(store.user_version(user).await.unwrap(), current);
        let rows = store.rows_for_post(post).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cpm_earned, dec!(1));
    }

    #[tokio::test]
    async fn test_monthly_user_totals_group_by_user() {
        let store = MemoryLedgerStore::new();
        let (user, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        insert(&store, new_row(a, user, date(2026, 2, 1), dec!(1.50))).await.unwrap();
        insert(&store, new_row(a, user, date(2026, 2, 2), dec!(0.75))).await.unwrap();
        insert(&store, new_row(b, user, date(2026, 2, 2), dec!(3.00))).await.unwrap();
        insert(&store, new_row(b, user, date(2026, 3, 1), dec!(9.00))).await.unwrap();
        insert(&store, new_row(a, other, date(2026, 2, 9), dec!(2.00))).await.unwrap();

        let totals = store
            .monthly_user_totals(YearMonth::new(2026, 2).unwrap())
            .await
            .unwrap();
        let mine = totals.iter().find(|t| t.user_id == user).unwrap();
        assert_eq!(mine.cpm_earned, dec!(5.25));
        assert_eq!(mine.views_delta, 3000);
        assert_eq!(mine.posts, 2);
        assert_eq!(totals.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_item_attempts_accumulate_until_resolved() {
        let store = MemoryBatchProgressStore::new();
        let post = Uuid::new_v4();
        let day = date(2026, 2, 3);
        store.record_failed_item(post, day, "STORE_ERROR", "timeout").await.unwrap();
        store.record_failed_item(post, day, "STORE_ERROR", "timeout").await.unwrap();

        let pending = store.pending_failed_items(5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 2);
        assert!(store.pending_failed_items(2).await.unwrap().is_empty());

        store.resolve_failed_item(post, day).await.unwrap();
        assert!(store.failed_items().is_empty());

        assert_eq!(store.last_booked_day().await.unwrap(), None);
        store.mark_day_booked(date(2026, 2, 2), 4, 0).await.unwrap();
        store.mark_day_booked(day, 3, 1).await.unwrap();
        assert_eq!(store.last_booked_day().await.unwrap(), Some(day));
    }

    #[tokio::test]
    async fn test_payout_transition_requires_expected_status() {
        let store = MemoryPayoutStore::new();
        let payout = store
            .insert_payout(NewPayout {
                user_id: Uuid::new_v4(),
                period_type: PeriodType::Weekly,
                period_start: date(2026, 1, 5),
                period_end: date(2026, 1, 11),
                posts_count: 70,
                days_hit: 7,
                weeks_hit: 0,
                base_amount: dec!(70),
                bonus_amount: dec!(10),
                total_amount: dec!(80),
            })
            .await
            .unwrap();

        let skipped = store
            .transition(payout.id, PayoutStatus::Approved, PayoutStatus::Paid, None, Utc::now())
            .await
            .unwrap();
        assert!(skipped.is_none());

        let approved = store
            .transition(
                payout.id,
                PayoutStatus::Pending,
                PayoutStatus::Approved,
                Some(Uuid::new_v4()),
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(approved.status, PayoutStatus::Approved);
        assert!(approved.approved_at.is_some());
    }
}
