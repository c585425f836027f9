//! CPM breakdown ledger rows and request/response models for the
//! `/api/cpm/*` endpoints

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::calendar::YearMonth;

/// A persisted ledger row: one (post, day) of CPM accrual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub id: i64,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub cumulative_views: i64,
    pub reported_views: i64,
    pub views_delta: i64,
    /// Dollars credited for the day, after both caps
    pub cpm_earned: Decimal,
    pub post_age_days: i32,
    pub cumulative_post_cpm: Decimal,
    pub cumulative_user_monthly_cpm: Decimal,
    pub is_post_capped: bool,
    pub is_user_monthly_capped: bool,
    pub is_view_regression: bool,
    pub created_at: DateTime<Utc>,
}

/// A ledger row that has been computed but not stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerRow {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub cumulative_views: i64,
    pub reported_views: i64,
    pub views_delta: i64,
    pub cpm_earned: Decimal,
    pub post_age_days: i32,
    pub cumulative_post_cpm: Decimal,
    pub cumulative_user_monthly_cpm: Decimal,
    pub is_post_capped: bool,
    pub is_user_monthly_capped: bool,
    pub is_view_regression: bool,
}

impl From<&LedgerRow> for NewLedgerRow {
    fn from(row: &LedgerRow) -> Self {
        Self {
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
        }
    }
}

impl From<crate::entities::cpm_post_breakdown::Model> for LedgerRow {
    fn from(model: crate::entities::cpm_post_breakdown::Model) -> Self {
        Self {
            id: model.id,
            post_id: model.post_id,
            user_id: model.user_id,
            date: model.date,
            cumulative_views: model.cumulative_views,
            reported_views: model.reported_views,
            views_delta: model.views_delta,
            cpm_earned: model.cpm_earned,
            post_age_days: model.post_age_days,
            cumulative_post_cpm: model.cumulative_post_cpm,
            cumulative_user_monthly_cpm: model.cumulative_user_monthly_cpm,
            is_post_capped: model.is_post_capped,
            is_user_monthly_capped: model.is_user_monthly_capped,
            is_view_regression: model.is_view_regression,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// POST /api/cpm/snapshots body
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRequest {
    pub post_id: Uuid,
    pub views: i64,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    /// Defaults to the time the request is received
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SnapshotRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.validate_at(Utc::now())
    }

    /// Validate against a given "now"; a measurement cannot be from the future
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), String> {
        if self.fetched_at.is_some_and(|at| at > now) {
            return Err("fetched_at cannot be in the future".to_string());
        }
        if self.views < 0 {
            return Err("views cannot be negative".to_string());
        }
        if self.likes.is_some_and(|v| v < 0) || self.comments.is_some_and(|v| v < 0) {
            return Err("engagement counts cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Query parameters for a user's ledger rows
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RowsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RowsQuery {
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err("from must not be after to".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyTotalQuery {
    /// Calendar month as YYYY-MM; defaults to the current UTC month
    pub month: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyTotalResponse {
    pub user_id: Uuid,
    pub month: YearMonth,
    pub total: Decimal,
    pub cap: Decimal,
    pub remaining: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowsResponse {
    pub rows: Vec<LedgerRow>,
    pub total_credited: Decimal,
}

impl RowsResponse {
    pub fn new(rows: Vec<LedgerRow>) -> Self {
        let total_credited = rows.iter().map(|r| r.cpm_earned).sum();
        Self {
            rows,
            total_credited,
        }
    }
}

/// POST /api/cpm/posts/{post_id}/replay body
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayRequest {
    /// First day to delete and recompute
    pub from: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResponse {
    pub post_id: Uuid,
    /// Creator whose rows were rebuilt, across all of their posts
    pub user_id: Uuid,
    pub from: NaiveDate,
    pub rows_deleted: u64,
    pub rows: Vec<LedgerRow>,
}

/// Error body shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
        }
    }
}
