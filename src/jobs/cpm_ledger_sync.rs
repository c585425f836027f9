//! CPM Ledger Sync Job
//!
//! Books the ledger rows of every closed UTC day on an interval. Booked days
//! are recorded, so a restart catches up on the days it missed, and (post,
//! day) items that failed are retried on later runs.
//! Supports graceful shutdown via SIGTERM/SIGINT signals.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio::time::{Duration as TokioDuration, interval};
use tracing::{debug, error, info, warn};

use crate::config::JobConfig;
use crate::services::calendar::days_between;
use crate::services::cpm_sync::CpmSyncService;
use crate::services::ledger::LedgerError;
use crate::services::sync_status::{self, jobs};
use crate::storage::BatchProgressStore;

/// Attempts before a failed item is left for an operator
pub const MAX_ITEM_ATTEMPTS: i32 = 5;

/// Day whose closing snapshots the job books: yesterday in UTC
pub fn target_day(today: NaiveDate) -> NaiveDate {
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

/// Days still to book, oldest first.
///
/// The first run books only yesterday. A gap is caught up at most
/// `window_days` back; older gaps need a replay.
pub fn days_to_book(last_booked: Option<NaiveDate>, today: NaiveDate, window_days: u32) -> Vec<NaiveDate> {
    let yesterday = target_day(today);
    let oldest = yesterday
        .checked_sub_days(Days::new(u64::from(window_days)))
        .unwrap_or(yesterday);
    let start = match last_booked {
        Some(last) => last.succ_opt().unwrap_or(last).max(oldest),
        None => yesterday,
    };
    days_between(start, yesterday).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatchUpReport {
    pub days_booked: Vec<NaiveDate>,
    pub retried: usize,
    pub recovered: usize,
    pub appended: usize,
    pub failed: usize,
}

/// Retry earlier failures, then book every closed day not booked yet.
///
/// A day whose batch cannot start is not marked booked and is picked up by
/// the next run.
pub async fn book_pending_days(
    sync: &CpmSyncService,
    progress: &dyn BatchProgressStore,
    today: NaiveDate,
) -> Result<CatchUpReport, LedgerError> {
    let mut report = CatchUpReport::default();

    for item in progress.pending_failed_items(MAX_ITEM_ATTEMPTS).await? {
        report.retried += 1;
        match sync.run_item(item.post_id, item.date).await {
            Ok(_) => {
                progress.resolve_failed_item(item.post_id, item.date).await?;
                report.recovered += 1;
            }
            Err(e) if e.is_retryable() => {
                warn!(post_id = %item.post_id, date = %item.date, attempts = item.attempts + 1, error = %e, "Retry failed");
                progress
                    .record_failed_item(item.post_id, item.date, e.code(), &e.to_string())
                    .await?;
            }
            Err(LedgerError::OutOfOrder { .. }) => {
                warn!(
                    post_id = %item.post_id,
                    date = %item.date,
                    "Post was booked past this day; replay it to include the day"
                );
                progress.resolve_failed_item(item.post_id, item.date).await?;
            }
            Err(e) => {
                debug!(post_id = %item.post_id, date = %item.date, code = e.code(), "Dropping failed item");
                progress.resolve_failed_item(item.post_id, item.date).await?;
            }
        }
    }

    let window_days = sync.ledger().config().window_days;
    let last_booked = progress.last_booked_day().await?;
    for day in days_to_book(last_booked, today, window_days) {
        let batch = sync.run_for_day(day, false).await?;
        for failure in &batch.failures {
            progress
                .record_failed_item(failure.post_id, day, failure.code, &failure.error)
                .await?;
        }

        let appended = i32::try_from(batch.appended).unwrap_or(i32::MAX);
        let failed = i32::try_from(batch.failed).unwrap_or(i32::MAX);
        progress.mark_day_booked(day, appended, failed).await?;

        report.appended += batch.appended;
        report.failed += batch.failed;
        report.days_booked.push(day);
    }

    Ok(report)
}

/// Start the CPM ledger sync job
///
/// Spawns a background task that, every `cpm_sync_interval_secs`:
/// 1. Skips the run if the last success is newer than the interval
/// 2. Retries failed items and books every closed UTC day not booked yet
/// 3. Records the outcome in `sync_status`
///
/// With `cpm_sync_dry_run` set, yesterday's rows are computed and logged but
/// nothing is written.
pub async fn start_cpm_ledger_sync_job(
    db: DatabaseConnection,
    sync: Arc<CpmSyncService>,
    progress: Arc<dyn BatchProgressStore>,
    config: JobConfig,
) {
    tokio::spawn(async move {
        let interval_secs = config.cpm_sync_interval_secs;
        let dry_run = config.cpm_sync_dry_run;
        let min_interval = i32::try_from(interval_secs).unwrap_or(i32::MAX);

        info!(
            interval_secs,
            dry_run,
            concurrency = config.cpm_sync_concurrency,
            "Initializing CPM ledger sync job"
        );

        let mut interval = interval(TokioDuration::from_secs(interval_secs));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping CPM ledger sync job gracefully");
                    break;
                }
                _ = interval.tick() => {
                    if !dry_run {
                        match sync_status::should_sync(&db, jobs::CPM_LEDGER_SYNC, min_interval).await {
                            Ok(true) => {}
                            Ok(false) => continue,
                            Err(e) => {
                                warn!(error = %e, "Could not read sync status, running anyway");
                            }
                        }
                    }

                    let today = Utc::now().date_naive();
                    if dry_run {
                        let day = target_day(today);
                        if let Err(e) = sync.run_for_day(day, true).await {
                            error!(date = %day, error = %e, "CPM ledger dry run failed");
                        }
                        continue;
                    }

                    match book_pending_days(&sync, progress.as_ref(), today).await {
                        Ok(report) => {
                            info!(
                                days = report.days_booked.len(),
                                retried = report.retried,
                                recovered = report.recovered,
                                appended = report.appended,
                                failed = report.failed,
                                "CPM ledger sync completed"
                            );
                            if report.failed > 0 {
                                warn!(failed = report.failed, "CPM ledger batch finished with failed posts");
                            }
                            if let Err(e) = sync_status::record_success(&db, jobs::CPM_LEDGER_SYNC, min_interval).await {
                                error!(error = %e, "Failed to record CPM ledger sync success");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "CPM ledger batch failed");
                            if let Err(e) = sync_status::record_failure(&db, jobs::CPM_LEDGER_SYNC, &e.to_string(), min_interval).await {
                                error!(error = %e, "Failed to record CPM ledger sync failure");
                            }
                        }
                    }
                }
            }
        }

        info!("CPM ledger sync job stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sea_orm::DbErr;
    use uuid::Uuid;

    use crate::config::CpmConfig;
    use crate::models::cpm::LedgerRow;
    use crate::models::creator_payout::MonthlyEarnings;
    use crate::models::post::{ContentType, Platform, PostRecord, PostStatus, ViewSnapshot};
    use crate::services::calendar::YearMonth;
    use crate::services::ledger::BreakdownLedger;
    use crate::storage::{
        LedgerStore, LedgerVersion, LedgerWrite, LedgerWriteOutcome, MemoryBatchProgressStore,
        MemoryLedgerStore, MemoryPostRepository, PostRepository, StoreError,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Ledger store whose commits fail while `failing` is set
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryLedgerStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl LedgerStore for FlakyStore {
        async fn latest_row(&self, post_id: Uuid) -> Result<Option<LedgerRow>, StoreError> {
            self.inner.latest_row(post_id).await
        }

        async fn user_version(&self, user_id: Uuid) -> Result<LedgerVersion, StoreError> {
            self.inner.user_version(user_id).await
        }

        async fn commit_user_rows(
            &self,
            user_id: Uuid,
            expected: LedgerVersion,
            write: LedgerWrite,
        ) -> Result<LedgerWriteOutcome, StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Database(DbErr::Custom("connection reset".to_string())));
            }
            self.inner.commit_user_rows(user_id, expected, write).await
        }

        async fn monthly_total(&self, user_id: Uuid, month: YearMonth) -> Result<Decimal, StoreError> {
            self.inner.monthly_total(user_id, month).await
        }

        async fn rows_for_post(&self, post_id: Uuid) -> Result<Vec<LedgerRow>, StoreError> {
            self.inner.rows_for_post(post_id).await
        }

        async fn rows_for_user(
            &self,
            user_id: Uuid,
            from: Option<NaiveDate>,
            to: Option<NaiveDate>,
        ) -> Result<Vec<LedgerRow>, StoreError> {
            self.inner.rows_for_user(user_id, from, to).await
        }

        async fn monthly_user_totals(
            &self,
            month: YearMonth,
        ) -> Result<Vec<MonthlyEarnings>, StoreError> {
            self.inner.monthly_user_totals(month).await
        }
    }

    /// One post created 2026-03-01 with a snapshot at 23:00 on each of the
    /// first `days` days of March, 1,000 more views each day
    async fn setup(store: Arc<FlakyStore>, days: u32) -> (CpmSyncService, Uuid) {
        let repo = Arc::new(MemoryPostRepository::new());
        let user = Uuid::new_v4();
        repo.add_creator(user);
        let post = PostRecord {
            id: Uuid::new_v4(),
            submitted_by: user,
            account_id: None,
            platform: Platform::Tiktok,
            status: PostStatus::Approved,
            content_type: ContentType::UgcVideo,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        };
        repo.add_post(post.clone());
        for day in 1..=days {
            repo.record_snapshot(&ViewSnapshot {
                post_id: post.id,
                views: i64::from(day) * 1000,
                likes: 0,
                comments: 0,
                fetched_at: Utc.with_ymd_and_hms(2026, 3, day, 23, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        }

        let config = CpmConfig::new(dec!(1.50), dec!(350), dec!(5000), 28).unwrap();
        let ledger = Arc::new(BreakdownLedger::new(store, config));
        (CpmSyncService::new(ledger, repo, 2), post.id)
    }

    #[test]
    fn test_target_day_is_yesterday() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(target_day(today), NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
    }

    #[test]
    fn test_days_to_book_resumes_after_last_booked_day() {
        let today = date(2026, 3, 10);
        assert_eq!(days_to_book(None, today, 28), vec![date(2026, 3, 9)]);
        assert_eq!(
            days_to_book(Some(date(2026, 3, 6)), today, 28),
            vec![date(2026, 3, 7), date(2026, 3, 8), date(2026, 3, 9)]
        );
        assert!(days_to_book(Some(date(2026, 3, 9)), today, 28).is_empty());
        // A long outage only reaches back one window
        let gap = days_to_book(Some(date(2025, 12, 1)), today, 28);
        assert_eq!(gap.first(), Some(&date(2026, 2, 9)));
        assert_eq!(gap.len(), 29);
    }

    #[tokio::test]
    async fn test_restart_catches_up_missed_days() {
        let store = Arc::new(FlakyStore::default());
        let (sync, post_id) = setup(store.clone(), 4).await;
        let progress = MemoryBatchProgressStore::new();

        let first = book_pending_days(&sync, &progress, date(2026, 3, 2)).await.unwrap();
        assert_eq!(first.days_booked, vec![date(2026, 3, 1)]);

        // Down for two days
        let report = book_pending_days(&sync, &progress, date(2026, 3, 5)).await.unwrap();
        assert_eq!(
            report.days_booked,
            vec![date(2026, 3, 2), date(2026, 3, 3), date(2026, 3, 4)]
        );
        assert_eq!(report.appended, 3);
        assert_eq!(progress.last_booked_day().await.unwrap(), Some(date(2026, 3, 4)));

        let rows = store.rows_for_post(post_id).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.views_delta == 1000));

        let rerun = book_pending_days(&sync, &progress, date(2026, 3, 5)).await.unwrap();
        assert!(rerun.days_booked.is_empty());
    }

    #[tokio::test]
    async fn test_failed_item_is_retried_on_next_run() {
        let store = Arc::new(FlakyStore::default());
        let (sync, post_id) = setup(store.clone(), 2).await;
        let progress = MemoryBatchProgressStore::new();

        store.failing.store(true, Ordering::SeqCst);
        let report = book_pending_days(&sync, &progress, date(2026, 3, 2)).await.unwrap();
        assert_eq!(report.failed, 1);
        // The day is booked; the item waits in the retry queue
        assert_eq!(progress.last_booked_day().await.unwrap(), Some(date(2026, 3, 1)));
        let failed = progress.failed_items();
        assert_eq!(failed.len(), 1);
        assert_eq!((failed[0].post_id, failed[0].date), (post_id, date(2026, 3, 1)));
        assert_eq!(failed[0].code, "STORE_ERROR");

        // Still failing: the attempt count grows
        book_pending_days(&sync, &progress, date(2026, 3, 2)).await.unwrap();
        assert_eq!(progress.failed_items()[0].attempts, 2);

        store.failing.store(false, Ordering::SeqCst);
        let report = book_pending_days(&sync, &progress, date(2026, 3, 3)).await.unwrap();
        assert_eq!((report.retried, report.recovered), (1, 1));
        assert_eq!(report.days_booked, vec![date(2026, 3, 2)]);
        assert!(progress.failed_items().is_empty());

        let rows = store.rows_for_post(post_id).await.unwrap();
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2026, 3, 1), date(2026, 3, 2)]);
        assert_eq!(rows[1].cumulative_post_cpm, dec!(3.00));
    }
}
