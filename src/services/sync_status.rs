//! Sync status bookkeeping for the batch jobs
//!
//! Records when each job last ran successfully so a restart does not run a
//! ledger batch or payout aggregation again inside its interval.

use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::sync_status::{self, Entity as SyncStatus};
use crate::storage::StoreError;

/// Job names for tracking sync status
pub mod jobs {
    pub const CPM_LEDGER_SYNC: &str = "cpm_ledger_sync";
    pub const AM_PAYOUT_SYNC: &str = "am_payout_sync";
}

/// Whether `job_name` is due, given the minimum interval stored for it.
///
/// Returns true on first run or when the last success is older than the
/// stored interval (`default_interval_secs` when no record exists yet).
pub async fn should_sync(
    db: &DatabaseConnection,
    job_name: &str,
    default_interval_secs: i32,
) -> Result<bool, StoreError> {
    let status = SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    let Some(record) = status else {
        tracing::info!(job = job_name, "First run detected, will sync");
        return Ok(true);
    };

    let interval = if record.min_interval_secs > 0 {
        record.min_interval_secs
    } else {
        default_interval_secs
    };

    Ok(is_due(record.last_success_at, interval, Utc::now().naive_utc(), job_name))
}

fn is_due(
    last_success: Option<NaiveDateTime>,
    min_interval_secs: i32,
    now: NaiveDateTime,
    job_name: &str,
) -> bool {
    let Some(last_success) = last_success else {
        tracing::info!(job = job_name, "No previous successful sync, will sync");
        return true;
    };

    let elapsed = now.signed_duration_since(last_success);
    let interval = Duration::seconds(i64::from(min_interval_secs));

    if elapsed >= interval {
        tracing::info!(
            job = job_name,
            elapsed_secs = elapsed.num_seconds(),
            min_interval_secs,
            "Interval elapsed, will sync"
        );
        true
    } else {
        tracing::info!(
            job = job_name,
            elapsed_secs = elapsed.num_seconds(),
            next_sync_in_secs = (interval - elapsed).num_seconds(),
            "Skipping sync"
        );
        false
    }
}

/// Record a successful run
pub async fn record_success(
    db: &DatabaseConnection,
    job_name: &str,
    default_interval_secs: i32,
) -> Result<(), StoreError> {
    let now = Utc::now().naive_utc();

    let existing = SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    match existing {
        Some(record) => {
            let success_count = record.success_count + 1;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_success_at = Set(Some(now));
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(None);
            active_model.success_count = Set(success_count);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_success_at: Set(Some(now)),
                last_attempt_at: Set(Some(now)),
                last_error: Set(None),
                success_count: Set(1),
                error_count: Set(0),
                min_interval_secs: Set(default_interval_secs),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!(job = job_name, "Recorded successful sync");
    Ok(())
}

/// Record a failed run
pub async fn record_failure(
    db: &DatabaseConnection,
    job_name: &str,
    error: &str,
    default_interval_secs: i32,
) -> Result<(), StoreError> {
    let now = Utc::now().naive_utc();

    let existing = SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    match existing {
        Some(record) => {
            let error_count = record.error_count + 1;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(Some(error.to_string()));
            active_model.error_count = Set(error_count);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_success_at: Set(None),
                last_attempt_at: Set(Some(now)),
                last_error: Set(Some(error.to_string())),
                success_count: Set(0),
                error_count: Set(1),
                min_interval_secs: Set(default_interval_secs),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!(job = job_name, error, "Recorded failed sync");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_never_succeeded_is_due() {
        assert!(is_due(None, 86400, at(10, 0), jobs::CPM_LEDGER_SYNC));
    }

    #[test]
    fn test_due_only_after_interval() {
        assert!(!is_due(Some(at(10, 0)), 3600, at(10, 59), jobs::AM_PAYOUT_SYNC));
        assert!(is_due(Some(at(10, 0)), 3600, at(11, 0), jobs::AM_PAYOUT_SYNC));
    }
}
