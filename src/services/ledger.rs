//! CPM breakdown ledger
//!
//! One immutable row per (post, UTC day). Each append reads the post's last
//! row and the user's month-to-date total, runs the delta, rate and cap
//! steps and commits the result against the version of the user's ledger
//! it read. Appends are also serialized per user in-process so two posts of
//! the same creator never spend the same monthly headroom.
//!
//! Corrections go through [`BreakdownLedger::replay_from`], which rebuilds
//! every row of the post's creator from a given day, across all of their
//! posts, in one atomic write.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CpmConfig;
use crate::models::cpm::{LedgerRow, NewLedgerRow};
use crate::models::post::{PostRecord, ViewSnapshot};
use crate::services::calendar::{YearMonth, day_end, day_start};
use crate::services::{cap_enforcer, cpm_calculator, view_delta};
use crate::storage::{LedgerStore, LedgerWrite, PostRepository, StoreError};

/// Commits retried after a concurrent writer changed the user's ledger
const MAX_COMMIT_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("post {post_id} already has a ledger row for {date}")]
    DuplicateRow { post_id: Uuid, date: NaiveDate },
    #[error("post {post_id}: {date} is not after the latest ledger row ({latest})")]
    OutOfOrder {
        post_id: Uuid,
        date: NaiveDate,
        latest: NaiveDate,
    },
    #[error("post {0} is not approved")]
    NotApproved(Uuid),
    #[error("post {post_id} is {age_days} days old, outside the {window_days}-day earning window")]
    WindowClosed {
        post_id: Uuid,
        age_days: i64,
        window_days: u32,
    },
    #[error("post {post_id}: {date} is before the post was created")]
    BeforePostCreated { post_id: Uuid, date: NaiveDate },
    #[error("post {post_id}: snapshot fetched at {fetched_at} is in the future")]
    FutureSnapshot {
        post_id: Uuid,
        fetched_at: DateTime<Utc>,
    },
    #[error("post {0} not found")]
    PostNotFound(Uuid),
    #[error("ledger for user {0} kept changing during the write")]
    Contended(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Stable machine-readable code for API responses and batch reports
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::DuplicateRow { .. } => "DUPLICATE_ROW",
            LedgerError::OutOfOrder { .. } => "OUT_OF_ORDER",
            LedgerError::NotApproved(_) => "POST_NOT_APPROVED",
            LedgerError::WindowClosed { .. } => "WINDOW_CLOSED",
            LedgerError::BeforePostCreated { .. } => "BEFORE_POST_CREATED",
            LedgerError::FutureSnapshot { .. } => "FUTURE_SNAPSHOT",
            LedgerError::PostNotFound(_) => "POST_NOT_FOUND",
            LedgerError::Contended(_) => "LEDGER_CONTENDED",
            LedgerError::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether trying the same item again later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Store(_) | LedgerError::Contended(_))
    }
}

/// Outcome of an administrative replay
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub user_id: Uuid,
    pub rows_deleted: u64,
    /// Rebuilt rows across all of the user's posts, in booking order
    pub rows: Vec<LedgerRow>,
}

#[derive(Debug, Clone, Copy)]
struct PostTail {
    date: NaiveDate,
    cumulative_views: i64,
    cumulative_post_cpm: Decimal,
}

/// What a new row is computed against
#[derive(Debug, Clone, Copy)]
struct Prior {
    duplicate: bool,
    tail: Option<PostTail>,
    monthly_total: Decimal,
}

/// Running view of one user's ledger.
///
/// Lets a sequence of rows be computed in order, each one seeing the rows
/// before it, before any of them is written. Posts and months are loaded
/// from the store the first time they are touched.
#[derive(Debug, Default)]
pub struct LedgerScratch {
    tails: HashMap<Uuid, PostTail>,
    dates: HashSet<(Uuid, NaiveDate)>,
    loaded_posts: HashSet<Uuid>,
    monthly: HashMap<YearMonth, Decimal>,
}

impl LedgerScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn seed_post<'a>(&mut self, post_id: Uuid, rows: impl IntoIterator<Item = &'a LedgerRow>) {
        self.loaded_posts.insert(post_id);
        for row in rows {
            self.dates.insert((post_id, row.date));
            let newer = self.tails.get(&post_id).is_none_or(|t| t.date < row.date);
            if newer {
                self.tails.insert(
                    post_id,
                    PostTail {
                        date: row.date,
                        cumulative_views: row.cumulative_views,
                        cumulative_post_cpm: row.cumulative_post_cpm,
                    },
                );
            }
        }
    }

    fn seed_month(&mut self, month: YearMonth, total: Decimal) {
        self.monthly.insert(month, total);
    }

    fn prior(&self, post_id: Uuid, date: NaiveDate) -> Prior {
        Prior {
            duplicate: self.dates.contains(&(post_id, date)),
            tail: self.tails.get(&post_id).copied(),
            monthly_total: self
                .monthly
                .get(&YearMonth::of(date))
                .copied()
                .unwrap_or(Decimal::ZERO),
        }
    }

    fn apply(&mut self, row: &NewLedgerRow) {
        self.dates.insert((row.post_id, row.date));
        self.tails.insert(
            row.post_id,
            PostTail {
                date: row.date,
                cumulative_views: row.cumulative_views,
                cumulative_post_cpm: row.cumulative_post_cpm,
            },
        );
        *self.monthly.entry(YearMonth::of(row.date)).or_default() += row.cpm_earned;
    }
}

pub struct BreakdownLedger {
    store: Arc<dyn LedgerStore>,
    config: CpmConfig,
    user_locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl BreakdownLedger {
    pub fn new(store: Arc<dyn LedgerStore>, config: CpmConfig) -> Self {
        Self {
            store,
            config,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CpmConfig {
        &self.config
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<AsyncMutex<()>> {
        self.user_locks
            .lock()
            .entry(user_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Append the row for `post` on `date` from a raw measurement
    pub async fn append_row(
        &self,
        post: &PostRecord,
        date: NaiveDate,
        snapshot: &ViewSnapshot,
    ) -> Result<LedgerRow, LedgerError> {
        let user_id = post.submitted_by;
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let version = self.store.user_version(user_id).await?;
            let mut scratch = LedgerScratch::new();
            self.load(&mut scratch, post, date).await?;
            let row = self.compute_row(post, date, snapshot.views, scratch.prior(post.id, date))?;

            let write = LedgerWrite {
                delete_from: None,
                insert: vec![row],
            };
            match self.store.commit_user_rows(user_id, version, write).await {
                Ok(outcome) => {
                    return outcome.rows.into_iter().next().ok_or_else(|| {
                        StoreError::InvalidData(format!("no row stored for post {}", post.id)).into()
                    });
                }
                Err(StoreError::Conflict(_)) => {
                    debug!(post_id = %post.id, user_id = %user_id, attempt, "Ledger changed, retrying append");
                }
                Err(StoreError::UniqueViolation(_)) => {
                    return Err(LedgerError::DuplicateRow {
                        post_id: post.id,
                        date,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(post_id = %post.id, user_id = %user_id, "Giving up on contended ledger append");
        Err(LedgerError::Contended(user_id))
    }

    /// Compute the row `append_row` would insert without writing it.
    ///
    /// The row is applied to `scratch`, so later previews for the same user
    /// see it the way a real run would.
    pub async fn preview_row(
        &self,
        scratch: &mut LedgerScratch,
        post: &PostRecord,
        date: NaiveDate,
        snapshot: &ViewSnapshot,
    ) -> Result<NewLedgerRow, LedgerError> {
        self.load(scratch, post, date).await?;
        let row = self.compute_row(post, date, snapshot.views, scratch.prior(post.id, date))?;
        scratch.apply(&row);
        Ok(row)
    }

    pub async fn latest_row(&self, post_id: Uuid) -> Result<Option<LedgerRow>, LedgerError> {
        Ok(self.store.latest_row(post_id).await?)
    }

    pub async fn monthly_total(
        &self,
        user_id: Uuid,
        month: YearMonth,
    ) -> Result<Decimal, LedgerError> {
        Ok(self.store.monthly_total(user_id, month).await?)
    }

    pub async fn rows_for_post(&self, post_id: Uuid) -> Result<Vec<LedgerRow>, LedgerError> {
        Ok(self.store.rows_for_post(post_id).await?)
    }

    pub async fn rows_for_user(
        &self,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<LedgerRow>, LedgerError> {
        Ok(self.store.rows_for_user(user_id, from, to).await?)
    }

    async fn load(
        &self,
        scratch: &mut LedgerScratch,
        post: &PostRecord,
        date: NaiveDate,
    ) -> Result<(), LedgerError> {
        if !scratch.loaded_posts.contains(&post.id) {
            let rows = self.store.rows_for_post(post.id).await?;
            scratch.seed_post(post.id, &rows);
        }
        let month = YearMonth::of(date);
        if !scratch.monthly.contains_key(&month) {
            let total = self.store.monthly_total(post.submitted_by, month).await?;
            scratch.seed_month(month, total);
        }
        Ok(())
    }

    /// Delete every row of `post`'s creator dated on or after `from` and
    /// rebuild them in date order across all of the creator's posts.
    ///
    /// Each rebuilt day uses the latest snapshot fetched by the end of that
    /// day. `post` is rebuilt for every day it has a row or a snapshot
    /// inside its earning window; the creator's other posts are rebuilt on
    /// the days they already had rows. The delete and all inserts commit as
    /// one write.
    pub async fn replay_from(
        &self,
        posts: &dyn PostRepository,
        post: &PostRecord,
        from: NaiveDate,
    ) -> Result<ReplayOutcome, LedgerError> {
        if !post.is_approved() {
            return Err(LedgerError::NotApproved(post.id));
        }

        let user_id = post.submitted_by;
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let version = self.store.user_version(user_id).await?;
            let rows = self.rebuild_rows(posts, post, from).await?;

            let write = LedgerWrite {
                delete_from: Some(from),
                insert: rows,
            };
            match self.store.commit_user_rows(user_id, version, write).await {
                Ok(outcome) => {
                    info!(
                        post_id = %post.id,
                        user_id = %user_id,
                        from = %from,
                        rows_deleted = outcome.rows_deleted,
                        rows_rebuilt = outcome.rows.len(),
                        "CPM ledger replay completed"
                    );
                    return Ok(ReplayOutcome {
                        user_id,
                        rows_deleted: outcome.rows_deleted,
                        rows: outcome.rows,
                    });
                }
                Err(StoreError::Conflict(_)) => {
                    debug!(user_id = %user_id, attempt, "Ledger changed, retrying replay");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(post_id = %post.id, user_id = %user_id, "Giving up on contended ledger replay");
        Err(LedgerError::Contended(user_id))
    }

    async fn rebuild_rows(
        &self,
        posts: &dyn PostRepository,
        target: &PostRecord,
        from: NaiveDate,
    ) -> Result<Vec<NewLedgerRow>, LedgerError> {
        let user_id = target.submitted_by;
        let later = self.store.rows_for_user(user_id, Some(from), None).await?;

        let mut booked_days: BTreeMap<Uuid, BTreeSet<NaiveDate>> = BTreeMap::new();
        booked_days.entry(target.id).or_default();
        for row in &later {
            booked_days.entry(row.post_id).or_default().insert(row.date);
        }

        info!(
            post_id = %target.id,
            user_id = %user_id,
            from = %from,
            posts = booked_days.len(),
            rows_to_replace = later.len(),
            "Replaying CPM ledger"
        );

        let window_days = u64::from(self.config.window_days);
        let mut scratch = LedgerScratch::new();
        let mut schedule: Vec<(NaiveDate, PostRecord, ViewSnapshot)> = Vec::new();

        for (post_id, mut days) in booked_days {
            let post = if post_id == target.id {
                target.clone()
            } else {
                posts
                    .find_post(post_id)
                    .await?
                    .ok_or(LedgerError::PostNotFound(post_id))?
            };

            let earlier = self.store.rows_for_post(post.id).await?;
            scratch.seed_post(post.id, earlier.iter().filter(|r| r.date < from));

            let created = post.created_at.date_naive();
            let window_end = created.checked_add_days(Days::new(window_days)).unwrap_or(created);
            let first = from.max(created);
            if first > window_end {
                continue;
            }

            let snapshots = posts
                .snapshots_between(post.id, day_start(first), day_end(window_end))
                .await?;
            if post.id == target.id {
                days.extend(snapshots.iter().map(|s| s.fetched_at.date_naive()));
            }
            days.retain(|d| *d >= first && *d <= window_end);
            let Some(first_day) = days.first().copied() else {
                continue;
            };

            let seed = posts.latest_snapshot_before(post.id, day_start(first_day)).await?;
            for (date, snapshot) in closing_measurements(&days, seed, &snapshots) {
                schedule.push((date, post.clone(), snapshot));
            }
        }

        schedule.sort_by(|(da, pa, _), (db, pb, _)| {
            da.cmp(db)
                .then(pa.created_at.cmp(&pb.created_at))
                .then(pa.id.cmp(&pb.id))
        });

        // Rows before `from` in its month still count toward that month
        let from_month = YearMonth::of(from);
        let replaced_in_month: Decimal = later
            .iter()
            .filter(|r| from_month.contains(r.date))
            .map(|r| r.cpm_earned)
            .sum();
        let month_total = self.store.monthly_total(user_id, from_month).await?;
        scratch.seed_month(from_month, month_total - replaced_in_month);

        let mut rows = Vec::with_capacity(schedule.len());
        for (date, post, snapshot) in schedule {
            let prior = scratch.prior(post.id, date);
            let row = match self.compute_row(&post, date, snapshot.views, prior) {
                Ok(row) => row,
                Err(LedgerError::WindowClosed { .. } | LedgerError::BeforePostCreated { .. }) => {
                    continue;
                }
                Err(e) => return Err(e),
            };
            scratch.apply(&row);
            rows.push(row);
        }
        Ok(rows)
    }

    fn compute_row(
        &self,
        post: &PostRecord,
        date: NaiveDate,
        reported_views: i64,
        prior: Prior,
    ) -> Result<NewLedgerRow, LedgerError> {
        if !post.is_approved() {
            return Err(LedgerError::NotApproved(post.id));
        }

        let age_days = (date - post.created_at.date_naive()).num_days();
        if age_days < 0 {
            return Err(LedgerError::BeforePostCreated {
                post_id: post.id,
                date,
            });
        }
        if age_days > i64::from(self.config.window_days) {
            return Err(LedgerError::WindowClosed {
                post_id: post.id,
                age_days,
                window_days: self.config.window_days,
            });
        }

        if prior.duplicate {
            return Err(LedgerError::DuplicateRow {
                post_id: post.id,
                date,
            });
        }

        if let Some(tail) = &prior.tail {
            if tail.date >= date {
                return Err(LedgerError::OutOfOrder {
                    post_id: post.id,
                    date,
                    latest: tail.date,
                });
            }
        }

        let delta = view_delta::compute(prior.tail.map(|t| t.cumulative_views), reported_views);
        if delta.regressed {
            warn!(
                post_id = %post.id,
                user_id = %post.submitted_by,
                reported_views,
                cumulative_views = delta.cumulative,
                "View count regression, crediting zero delta"
            );
        }

        let earned = cpm_calculator::earned_for_delta(delta.delta, self.config.rate_per_thousand);
        let post_total_before = prior
            .tail
            .map(|t| t.cumulative_post_cpm)
            .unwrap_or(Decimal::ZERO);

        let outcome = cap_enforcer::apply(cap_enforcer::CapInput {
            earned,
            post_total_before,
            post_cap: self.config.post_lifetime_cap,
            monthly_total_before: prior.monthly_total,
            monthly_cap: self.config.user_monthly_cap,
        });

        if outcome.is_post_capped || outcome.is_user_monthly_capped {
            debug!(
                post_id = %post.id,
                user_id = %post.submitted_by,
                earned = %earned,
                credited = %outcome.credited,
                is_post_capped = outcome.is_post_capped,
                is_user_monthly_capped = outcome.is_user_monthly_capped,
                "CPM cap applied"
            );
        }

        Ok(NewLedgerRow {
            post_id: post.id,
            user_id: post.submitted_by,
            date,
            cumulative_views: delta.cumulative,
            reported_views,
            views_delta: delta.delta,
            cpm_earned: outcome.credited,
            post_age_days: age_days as i32,
            cumulative_post_cpm: outcome.post_total,
            cumulative_user_monthly_cpm: outcome.monthly_total,
            is_post_capped: outcome.is_post_capped,
            is_user_monthly_capped: outcome.is_user_monthly_capped,
            is_view_regression: delta.regressed,
        })
    }
}

/// Pair each day with the latest snapshot fetched by the end of that day.
///
/// `seed` is the latest snapshot before the first day; `snapshots` must be
/// oldest first. Days with no measurement at all are left out.
pub fn closing_measurements(
    days: &BTreeSet<NaiveDate>,
    seed: Option<ViewSnapshot>,
    snapshots: &[ViewSnapshot],
) -> Vec<(NaiveDate, ViewSnapshot)> {
    let mut current = seed;
    let mut remaining = snapshots.iter().peekable();
    let mut closings = Vec::with_capacity(days.len());

    for day in days {
        let end = day_end(*day);
        while let Some(snapshot) = remaining.next_if(|s| s.fetched_at <= end) {
            current = Some(snapshot.clone());
        }
        if let Some(snapshot) = &current {
            closings.push((*day, snapshot.clone()));
        }
    }
    closings
}
