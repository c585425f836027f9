//! CPM ledger batch and snapshot ingestion
//!
//! A batch run for a UTC day appends one ledger row for every approved post
//! still inside its earning window, using the latest snapshot fetched by the
//! end of that day. Users are processed concurrently, each user's posts in
//! order. A failing post is recorded in the report and the run moves on.
//!
//! Dry runs compute every row against a per-user [`LedgerScratch`], so caps
//! bind across a user's posts exactly as they would in a real run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::cpm::{LedgerRow, NewLedgerRow, SnapshotRequest};
use crate::models::post::{PostRecord, ViewSnapshot};
use crate::services::calendar::{day_end, day_start};
use crate::services::ledger::{BreakdownLedger, LedgerError, LedgerScratch, ReplayOutcome};
use crate::storage::PostRepository;

#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub post_id: Uuid,
    pub code: &'static str,
    pub error: String,
}

/// Per-run counters
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub date: NaiveDate,
    pub dry_run: bool,
    pub posts_considered: usize,
    pub appended: usize,
    pub already_recorded: usize,
    pub out_of_order: usize,
    pub window_closed: usize,
    pub no_snapshot: usize,
    pub failed: usize,
    pub regressions: usize,
    pub post_capped: usize,
    pub user_capped: usize,
    pub credited_total: Decimal,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    fn new(date: NaiveDate, dry_run: bool) -> Self {
        Self {
            date,
            dry_run,
            posts_considered: 0,
            appended: 0,
            already_recorded: 0,
            out_of_order: 0,
            window_closed: 0,
            no_snapshot: 0,
            failed: 0,
            regressions: 0,
            post_capped: 0,
            user_capped: 0,
            credited_total: Decimal::ZERO,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, post_id: Uuid, outcome: ItemOutcome) {
        self.posts_considered += 1;
        match outcome {
            ItemOutcome::Appended {
                credited,
                regression,
                post_capped,
                user_capped,
            } => {
                self.appended += 1;
                self.credited_total += credited;
                self.regressions += usize::from(regression);
                self.post_capped += usize::from(post_capped);
                self.user_capped += usize::from(user_capped);
            }
            ItemOutcome::NoSnapshot => self.no_snapshot += 1,
            ItemOutcome::Rejected(err) => match err {
                LedgerError::DuplicateRow { .. } => self.already_recorded += 1,
                LedgerError::OutOfOrder { .. } => self.out_of_order += 1,
                LedgerError::WindowClosed { .. } => self.window_closed += 1,
                other => {
                    self.failed += 1;
                    self.failures.push(SyncFailure {
                        post_id,
                        code: other.code(),
                        error: other.to_string(),
                    });
                }
            },
        }
    }
}

enum ItemOutcome {
    Appended {
        credited: Decimal,
        regression: bool,
        post_capped: bool,
        user_capped: bool,
    },
    NoSnapshot,
    Rejected(LedgerError),
}

pub struct CpmSyncService {
    ledger: Arc<BreakdownLedger>,
    posts: Arc<dyn PostRepository>,
    concurrency: usize,
}

impl CpmSyncService {
    pub fn new(ledger: Arc<BreakdownLedger>, posts: Arc<dyn PostRepository>, concurrency: usize) -> Self {
        Self {
            ledger,
            posts,
            concurrency: concurrency.max(1),
        }
    }

    pub fn ledger(&self) -> &Arc<BreakdownLedger> {
        &self.ledger
    }

    /// Append the day's rows for every eligible post.
    ///
    /// Only loading the candidate posts can fail the whole run.
    pub async fn run_for_day(&self, date: NaiveDate, dry_run: bool) -> Result<SyncReport, LedgerError> {
        let window_days = u64::from(self.ledger.config().window_days);
        let earliest = date.checked_sub_days(Days::new(window_days)).unwrap_or(date);
        let candidates = self
            .posts
            .approved_posts_created_between(day_start(earliest), day_end(date))
            .await?;

        let mut by_user: HashMap<Uuid, Vec<PostRecord>> = HashMap::new();
        for post in candidates {
            by_user.entry(post.submitted_by).or_default().push(post);
        }

        info!(
            date = %date,
            users = by_user.len(),
            posts = by_user.values().map(Vec::len).sum::<usize>(),
            dry_run,
            "Starting CPM ledger batch"
        );

        let report = Mutex::new(SyncReport::new(date, dry_run));
        stream::iter(by_user)
            .for_each_concurrent(self.concurrency, |(user_id, posts)| {
                let report = &report;
                async move {
                    let mut scratch = dry_run.then(LedgerScratch::new);
                    for post in posts {
                        let outcome = self.process(&post, date, scratch.as_mut()).await;
                        log_outcome(&post, user_id, &outcome);
                        report.lock().record(post.id, outcome);
                    }
                }
            })
            .await;

        let report = report.into_inner();
        info!(
            date = %date,
            appended = report.appended,
            already_recorded = report.already_recorded,
            out_of_order = report.out_of_order,
            window_closed = report.window_closed,
            no_snapshot = report.no_snapshot,
            failed = report.failed,
            regressions = report.regressions,
            credited_total = %report.credited_total,
            "CPM ledger batch completed"
        );
        Ok(report)
    }

    async fn process(
        &self,
        post: &PostRecord,
        date: NaiveDate,
        scratch: Option<&mut LedgerScratch>,
    ) -> ItemOutcome {
        let snapshot = match self.posts.latest_snapshot_before(post.id, day_end(date)).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return ItemOutcome::NoSnapshot,
            Err(e) => return ItemOutcome::Rejected(e.into()),
        };

        let result = match scratch {
            Some(scratch) => self.ledger.preview_row(scratch, post, date, &snapshot).await,
            None => self
                .ledger
                .append_row(post, date, &snapshot)
                .await
                .map(|row| NewLedgerRow::from(&row)),
        };

        match result {
            Ok(row) => ItemOutcome::Appended {
                credited: row.cpm_earned,
                regression: row.is_view_regression,
                post_capped: row.is_post_capped,
                user_capped: row.is_user_monthly_capped,
            },
            Err(e) => ItemOutcome::Rejected(e),
        }
    }

    /// Book a single (post, day) the way the batch would.
    ///
    /// Returns `None` when the post has no snapshot by the end of the day.
    pub async fn run_item(&self, post_id: Uuid, date: NaiveDate) -> Result<Option<LedgerRow>, LedgerError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(LedgerError::PostNotFound(post_id))?;

        let Some(snapshot) = self.posts.latest_snapshot_before(post.id, day_end(date)).await? else {
            return Ok(None);
        };
        self.ledger.append_row(&post, date, &snapshot).await.map(Some)
    }

    /// Store a raw measurement and append the ledger row for its UTC day
    pub async fn ingest_snapshot(&self, request: SnapshotRequest) -> Result<LedgerRow, LedgerError> {
        let now = Utc::now();
        if let Some(fetched_at) = request.fetched_at {
            if fetched_at > now {
                return Err(LedgerError::FutureSnapshot {
                    post_id: request.post_id,
                    fetched_at,
                });
            }
        }

        let post = self
            .posts
            .find_post(request.post_id)
            .await?
            .ok_or(LedgerError::PostNotFound(request.post_id))?;

        let snapshot = ViewSnapshot {
            post_id: post.id,
            views: request.views,
            likes: request.likes.unwrap_or(0),
            comments: request.comments.unwrap_or(0),
            fetched_at: request.fetched_at.unwrap_or(now),
        };
        self.posts.record_snapshot(&snapshot).await?;

        self.ledger
            .append_row(&post, snapshot.fetched_at.date_naive(), &snapshot)
            .await
    }

    /// Rebuild the rows of a post's creator from `from` using the stored
    /// snapshots
    pub async fn replay(&self, post_id: Uuid, from: NaiveDate) -> Result<ReplayOutcome, LedgerError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(LedgerError::PostNotFound(post_id))?;

        self.ledger.replay_from(self.posts.as_ref(), &post, from).await
    }
}

fn log_outcome(post: &PostRecord, user_id: Uuid, outcome: &ItemOutcome) {
    match outcome {
        ItemOutcome::Appended { .. } => {}
        ItemOutcome::NoSnapshot => {
            warn!(post_id = %post.id, user_id = %user_id, "No snapshot available, skipping post");
        }
        ItemOutcome::Rejected(
            e @ (LedgerError::DuplicateRow { .. }
            | LedgerError::OutOfOrder { .. }
            | LedgerError::WindowClosed { .. }),
        ) => {
            warn!(post_id = %post.id, user_id = %user_id, reason = e.code(), "Skipping post: {}", e);
        }
        ItemOutcome::Rejected(e) => {
            error!(post_id = %post.id, user_id = %user_id, error = %e, "Failed to append CPM row");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CpmConfig;
    use crate::models::post::{ContentType, Platform, PostStatus};
    use crate::storage::{MemoryLedgerStore, MemoryPostRepository};
    use chrono::{DateTime, TimeZone};
    use rust_decimal_macros::dec;

    struct Fixture {
        repo: Arc<MemoryPostRepository>,
        service: CpmSyncService,
    }

    fn fixture(monthly_cap: Decimal) -> Fixture {
        let repo = Arc::new(MemoryPostRepository::new());
        let config = CpmConfig::new(dec!(1.50), dec!(350), monthly_cap, 28).unwrap();
        let ledger = Arc::new(BreakdownLedger::new(Arc::new(MemoryLedgerStore::new()), config));
        let service = CpmSyncService::new(ledger, repo.clone(), 4);
        Fixture { repo, service }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn add_post(repo: &MemoryPostRepository, user: Uuid, created_at: DateTime<Utc>) -> PostRecord {
        let post = PostRecord {
            id: Uuid::new_v4(),
            submitted_by: user,
            account_id: None,
            platform: Platform::Instagram,
            status: PostStatus::Approved,
            content_type: ContentType::UgcVideo,
            created_at,
        };
        repo.add_post(post.clone());
        post
    }

    async fn add_snapshot(repo: &MemoryPostRepository, post: &PostRecord, views: i64, fetched_at: DateTime<Utc>) {
        repo.record_snapshot(&ViewSnapshot {
            post_id: post.id,
            views,
            likes: 0,
            comments: 0,
            fetched_at,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_batch_appends_and_rerun_is_idempotent() {
        let f = fixture(dec!(5000));
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let a1 = add_post(&f.repo, alice, at(2026, 1, 3, 8));
        let a2 = add_post(&f.repo, alice, at(2026, 1, 4, 8));
        let b1 = add_post(&f.repo, bob, at(2026, 1, 4, 8));
        let silent = add_post(&f.repo, bob, at(2026, 1, 4, 9));

        add_snapshot(&f.repo, &a1, 5_000, at(2026, 1, 5, 6)).await;
        add_snapshot(&f.repo, &a2, 2_000, at(2026, 1, 5, 7)).await;
        add_snapshot(&f.repo, &b1, 1_000, at(2026, 1, 5, 8)).await;
        // Fetched after the end of the day: ignored
        add_snapshot(&f.repo, &silent, 9_000, at(2026, 1, 6, 1)).await;

        let report = f.service.run_for_day(date(2026, 1, 5), false).await.unwrap();
        assert_eq!(report.posts_considered, 4);
        assert_eq!(report.appended, 3);
        assert_eq!(report.no_snapshot, 1);
        assert_eq!(report.credited_total, dec!(12.00));
        assert_eq!(report.failed, 0);

        let rerun = f.service.run_for_day(date(2026, 1, 5), false).await.unwrap();
        assert_eq!(rerun.appended, 0);
        assert_eq!(rerun.already_recorded, 3);
        assert_eq!(
            f.service
                .ledger()
                .monthly_total(alice, crate::services::calendar::YearMonth::of(date(2026, 1, 5)))
                .await
                .unwrap(),
            dec!(10.50)
        );
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let f = fixture(dec!(5000));
        let p = add_post(&f.repo, Uuid::new_v4(), at(2026, 1, 3, 8));
        add_snapshot(&f.repo, &p, 10_000, at(2026, 1, 5, 6)).await;

        let report = f.service.run_for_day(date(2026, 1, 5), true).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.appended, 1);
        assert_eq!(report.credited_total, dec!(15.00));
        assert!(f.service.ledger().latest_row(p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_post_does_not_halt_the_batch() {
        let f = fixture(dec!(5000));
        let user = Uuid::new_v4();
        let ahead = add_post(&f.repo, user, at(2026, 1, 1, 8));
        let fine = add_post(&f.repo, user, at(2026, 1, 1, 8));

        // A row already exists for a later day
        add_snapshot(&f.repo, &ahead, 1_000, at(2026, 1, 2, 8)).await;
        f.service
            .ledger()
            .append_row(
                &ahead,
                date(2026, 1, 9),
                &ViewSnapshot {
                    post_id: ahead.id,
                    views: 1_000,
                    likes: 0,
                    comments: 0,
                    fetched_at: at(2026, 1, 9, 8),
                },
            )
            .await
            .unwrap();
        add_snapshot(&f.repo, &fine, 3_000, at(2026, 1, 5, 8)).await;

        let report = f.service.run_for_day(date(2026, 1, 5), false).await.unwrap();
        assert_eq!(report.out_of_order, 1);
        assert_eq!(report.appended, 1);
        assert_eq!(report.credited_total, dec!(4.50));
    }

    #[tokio::test]
    async fn test_posts_outside_window_are_not_considered() {
        let f = fixture(dec!(5000));
        let old = add_post(&f.repo, Uuid::new_v4(), at(2025, 12, 1, 8));
        add_snapshot(&f.repo, &old, 1_000, at(2026, 1, 5, 8)).await;

        let report = f.service.run_for_day(date(2026, 1, 5), false).await.unwrap();
        assert_eq!(report.posts_considered, 0);
    }

    #[tokio::test]
    async fn test_monthly_cap_holds_across_concurrent_users() {
        let f = fixture(dec!(20));
        let users: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for user in &users {
            for _ in 0..4 {
                let p = add_post(&f.repo, *user, at(2026, 2, 1, 8));
                // 10,000 views -> 15.00 each
                add_snapshot(&f.repo, &p, 10_000, at(2026, 2, 2, 8)).await;
            }
        }

        let report = f.service.run_for_day(date(2026, 2, 2), false).await.unwrap();
        assert_eq!(report.appended, 20);
        assert_eq!(report.credited_total, dec!(100.00));
        for user in users {
            let total = f
                .service
                .ledger()
                .monthly_total(user, crate::services::calendar::YearMonth::new(2026, 2).unwrap())
                .await
                .unwrap();
            assert_eq!(total, dec!(20.00));
        }
    }

    #[tokio::test]
    async fn test_ingest_snapshot_appends_for_fetch_day() {
        let f = fixture(dec!(5000));
        let p = add_post(&f.repo, Uuid::new_v4(), at(2026, 1, 3, 8));

        let row = f
            .service
            .ingest_snapshot(SnapshotRequest {
                post_id: p.id,
                views: 5_000,
                likes: Some(40),
                comments: None,
                fetched_at: Some(at(2026, 1, 4, 12)),
            })
            .await
            .unwrap();
        assert_eq!(row.date, date(2026, 1, 4));
        assert_eq!(row.cpm_earned, dec!(7.50));

        let missing = f
            .service
            .ingest_snapshot(SnapshotRequest {
                post_id: Uuid::new_v4(),
                views: 1,
                likes: None,
                comments: None,
                fetched_at: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(missing, LedgerError::PostNotFound(_)));
    }

    #[tokio::test]
    async fn test_dry_run_reports_what_a_real_run_books() {
        let f = fixture(dec!(100));
        let user = Uuid::new_v4();
        for hour in [8, 9] {
            let p = add_post(&f.repo, user, at(2026, 1, 3, hour));
            // 40,000 views -> 60.00 each against a 100.00 monthly cap
            add_snapshot(&f.repo, &p, 40_000, at(2026, 1, 5, 6)).await;
        }

        let dry = f.service.run_for_day(date(2026, 1, 5), true).await.unwrap();
        assert_eq!(dry.credited_total, dec!(100.00));
        assert_eq!(dry.user_capped, 1);
        assert!(f.service.ledger().rows_for_user(user, None, None).await.unwrap().is_empty());

        let real = f.service.run_for_day(date(2026, 1, 5), false).await.unwrap();
        assert_eq!(real.credited_total, dry.credited_total);
        assert_eq!(real.user_capped, dry.user_capped);
        assert_eq!(real.appended, dry.appended);
    }

    #[tokio::test]
    async fn test_future_snapshot_is_rejected_and_not_stored() {
        let f = fixture(dec!(5000));
        let p = add_post(&f.repo, Uuid::new_v4(), at(2026, 1, 3, 8));

        let err = f
            .service
            .ingest_snapshot(SnapshotRequest {
                post_id: p.id,
                views: 5_000,
                likes: None,
                comments: None,
                fetched_at: Some(Utc::now() + chrono::Duration::days(3)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::FutureSnapshot { .. }));
        let stored = f
            .repo
            .snapshots_between(p.id, at(2026, 1, 1, 0), Utc::now() + chrono::Duration::days(30))
            .await
            .unwrap();
        assert!(stored.is_empty());
        assert!(f.service.ledger().latest_row(p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_item_books_one_post_day() {
        let f = fixture(dec!(5000));
        let p = add_post(&f.repo, Uuid::new_v4(), at(2026, 1, 3, 8));

        assert!(f.service.run_item(p.id, date(2026, 1, 4)).await.unwrap().is_none());

        add_snapshot(&f.repo, &p, 2_000, at(2026, 1, 4, 9)).await;
        let row = f.service.run_item(p.id, date(2026, 1, 4)).await.unwrap().unwrap();
        assert_eq!(row.cpm_earned, dec!(3.00));

        let again = f.service.run_item(p.id, date(2026, 1, 4)).await.unwrap_err();
        assert!(matches!(again, LedgerError::DuplicateRow { .. }));
        assert!(!again.is_retryable());
    }

    #[tokio::test]
    async fn test_replay_uses_latest_snapshot_by_end_of_day() {
        let f = fixture(dec!(5000));
        let p = add_post(&f.repo, Uuid::new_v4(), at(2026, 1, 1, 8));

        for (day, views) in [(1, 1_000), (2, 2_000), (3, 4_000)] {
            f.service
                .ingest_snapshot(SnapshotRequest {
                    post_id: p.id,
                    views,
                    likes: None,
                    comments: None,
                    fetched_at: Some(at(2026, 1, day, 10)),
                })
                .await
                .unwrap();
        }
        // A later reading on the 2nd supersedes the one already booked
        add_snapshot(&f.repo, &p, 3_000, at(2026, 1, 2, 23)).await;

        let outcome = f.service.replay(p.id, date(2026, 1, 2)).await.unwrap();
        assert_eq!(outcome.rows_deleted, 2);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].cumulative_views, 3_000);
        assert_eq!(outcome.rows[1].views_delta, 1_000);
        assert_eq!(outcome.rows[1].cumulative_post_cpm, dec!(6.00));
    }
}
