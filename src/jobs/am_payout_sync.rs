//! Payout Sync Job
//!
//! Creates `pending` payouts for the last closed week and month of every
//! account manager. Re-running is safe: a period that already has a payout
//! is skipped.
//!
//! The same run refreshes creator payouts for the previous and the current
//! month, so pending creator rows follow the ledger.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio::time::{Duration as TokioDuration, interval};
use tracing::{debug, error, info, warn};

use crate::config::JobConfig;
use crate::models::activity::PeriodAggregate;
use crate::services::am_activity::{ActivityAggregator, last_closed_month, last_closed_week};
use crate::services::calendar::YearMonth;
use crate::services::creator_payouts::{CreatorPayoutService, RefreshReport};
use crate::services::payouts::{PayoutError, PayoutService};
use crate::services::sync_status::{self, jobs};
use crate::storage::{PostRepository, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PayoutSyncReport {
    pub account_managers: usize,
    pub created: usize,
    pub already_exists: usize,
    pub empty_periods: usize,
    pub failed: usize,
}

/// Aggregate and store the closed periods for every account manager
pub async fn create_closed_period_payouts(
    posts: &dyn PostRepository,
    aggregator: &ActivityAggregator,
    payouts: &PayoutService,
    today: NaiveDate,
) -> Result<PayoutSyncReport, StoreError> {
    let managers = posts.account_managers().await?;
    let mut report = PayoutSyncReport {
        account_managers: managers.len(),
        ..Default::default()
    };

    let week = last_closed_week(today);
    let month = last_closed_month(today);

    for user_id in managers {
        let periods = [
            aggregator.weekly_period(user_id, week, today).await,
            aggregator.monthly_period(user_id, month, today).await,
        ];

        for period in periods {
            let aggregate = match period {
                Ok(aggregate) => aggregate,
                Err(e) => {
                    error!(user_id = %user_id, error = %e, "Failed to aggregate account manager activity");
                    report.failed += 1;
                    continue;
                }
            };
            store_period(payouts, user_id, aggregate, &mut report).await;
        }
    }

    Ok(report)
}

/// Refresh creator payouts for the month before `today` and the month of `today`
pub async fn refresh_creator_months(
    creator_payouts: &CreatorPayoutService,
    today: NaiveDate,
) -> Vec<RefreshReport> {
    let current = YearMonth::of(today);
    let mut reports = Vec::with_capacity(2);
    for month in [current.previous(), current] {
        match creator_payouts.refresh_month(month).await {
            Ok(report) => {
                info!(
                    period = %month,
                    created = report.created,
                    updated = report.updated,
                    frozen = report.frozen,
                    skipped = report.skipped,
                    "Creator payouts refreshed"
                );
                reports.push(report);
            }
            Err(e) => error!(period = %month, error = %e, "Failed to refresh creator payouts"),
        }
    }
    reports
}

async fn store_period(
    payouts: &PayoutService,
    user_id: uuid::Uuid,
    aggregate: PeriodAggregate,
    report: &mut PayoutSyncReport,
) {
    if aggregate.total_amount == Decimal::ZERO {
        report.empty_periods += 1;
        return;
    }

    match payouts.create_pending(user_id, aggregate).await {
        Ok(_) => report.created += 1,
        Err(PayoutError::AlreadyExists { period_type, period_start, .. }) => {
            debug!(
                user_id = %user_id,
                period_type = %period_type,
                period_start = %period_start,
                "Payout already exists, skipping"
            );
            report.already_exists += 1;
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to create payout");
            report.failed += 1;
        }
    }
}

/// Start the account-manager payout sync job
///
/// Spawns a background task that runs every `payout_sync_interval_secs`,
/// gated by `sync_status` so restarts do not repeat a recent run.
pub async fn start_am_payout_sync_job(
    db: DatabaseConnection,
    posts: Arc<dyn PostRepository>,
    aggregator: Arc<ActivityAggregator>,
    payouts: Arc<PayoutService>,
    creator_payouts: Arc<CreatorPayoutService>,
    config: JobConfig,
) {
    tokio::spawn(async move {
        let interval_secs = config.payout_sync_interval_secs;
        let min_interval = i32::try_from(interval_secs).unwrap_or(i32::MAX);

        info!(interval_secs, "Initializing account manager payout sync job");

        let mut interval = interval(TokioDuration::from_secs(interval_secs));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping payout sync job gracefully");
                    break;
                }
                _ = interval.tick() => {
                    match sync_status::should_sync(&db, jobs::AM_PAYOUT_SYNC, min_interval).await {
                        Ok(true) => {}
                        Ok(false) => continue,
                        Err(e) => warn!(error = %e, "Could not read sync status, running anyway"),
                    }

                    let today = Utc::now().date_naive();
                    refresh_creator_months(&creator_payouts, today).await;
                    match create_closed_period_payouts(posts.as_ref(), &aggregator, &payouts, today).await {
                        Ok(report) => {
                            info!(
                                account_managers = report.account_managers,
                                created = report.created,
                                already_exists = report.already_exists,
                                empty_periods = report.empty_periods,
                                failed = report.failed,
                                "Payout sync completed"
                            );
                            if let Err(e) = sync_status::record_success(&db, jobs::AM_PAYOUT_SYNC, min_interval).await {
                                error!(error = %e, "Failed to record payout sync success");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Payout sync failed");
                            if let Err(e) = sync_status::record_failure(&db, jobs::AM_PAYOUT_SYNC, &e.to_string(), min_interval).await {
                                error!(error = %e, "Failed to record payout sync failure");
                            }
                        }
                    }
                }
            }
        }

        info!("Payout sync job stopped");
    });
}
