//! CPM ledger handlers
//!
//! POST /api/cpm/snapshots, the per-post and per-user ledger reads, and the
//! administrative replay.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ApiError, bad_request, ledger_error};
use crate::AppState;
use crate::models::cpm::{
    LedgerRow, MonthlyTotalQuery, MonthlyTotalResponse, ReplayRequest, ReplayResponse, RowsQuery,
    RowsResponse, SnapshotRequest,
};
use crate::services::calendar::YearMonth;

/// Record a raw measurement and append the ledger row for its day
///
/// POST /api/cpm/snapshots
///
/// ```json
/// { "post_id": "…", "views": 5000, "fetched_at": "2026-01-05T23:00:00Z" }
/// ```
///
/// Responds with the appended row. A second snapshot for a day that is
/// already booked is rejected with 409 `DUPLICATE_ROW`.
pub async fn post_snapshot(
    State(state): State<AppState>,
    Json(request): Json<SnapshotRequest>,
) -> Result<Json<LedgerRow>, ApiError> {
    if let Err(e) = request.validate() {
        warn!(post_id = %request.post_id, error = %e, "Invalid snapshot");
        return Err(bad_request(e));
    }

    let row = state
        .cpm_sync
        .ingest_snapshot(request)
        .await
        .map_err(ledger_error)?;

    info!(
        post_id = %row.post_id,
        date = %row.date,
        views_delta = row.views_delta,
        cpm_earned = %row.cpm_earned,
        "Ledger row appended"
    );
    Ok(Json(row))
}

/// GET /api/cpm/posts/{post_id}/rows
pub async fn get_post_rows(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<RowsResponse>, ApiError> {
    let rows = state
        .ledger
        .rows_for_post(post_id)
        .await
        .map_err(ledger_error)?;
    Ok(Json(RowsResponse::new(rows)))
}

/// GET /api/cpm/posts/{post_id}/latest
///
/// `null` when the post has no ledger history yet.
pub async fn get_latest_row(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Option<LedgerRow>>, ApiError> {
    let row = state
        .ledger
        .latest_row(post_id)
        .await
        .map_err(ledger_error)?;
    Ok(Json(row))
}

/// GET /api/cpm/users/{user_id}/rows?from=YYYY-MM-DD&to=YYYY-MM-DD
pub async fn get_user_rows(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<RowsQuery>,
) -> Result<Json<RowsResponse>, ApiError> {
    query.validate().map_err(bad_request)?;

    let rows = state
        .ledger
        .rows_for_user(user_id, query.from, query.to)
        .await
        .map_err(ledger_error)?;
    Ok(Json(RowsResponse::new(rows)))
}

/// GET /api/cpm/users/{user_id}/monthly-total?month=YYYY-MM
pub async fn get_monthly_total(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<MonthlyTotalQuery>,
) -> Result<Json<MonthlyTotalResponse>, ApiError> {
    let month = match query.month.as_deref() {
        Some(raw) => raw.parse::<YearMonth>().map_err(bad_request)?,
        None => YearMonth::of(Utc::now().date_naive()),
    };

    let total = state
        .ledger
        .monthly_total(user_id, month)
        .await
        .map_err(ledger_error)?;
    let cap = state.ledger.config().user_monthly_cap;

    Ok(Json(MonthlyTotalResponse {
        user_id,
        month,
        total,
        cap,
        remaining: (cap - total).max(Decimal::ZERO),
    }))
}

/// Delete and rebuild the ledger rows of a post's creator from a given day
///
/// POST /api/cpm/posts/{post_id}/replay
///
/// Every post of the creator is rebuilt from `from` onward so that monthly
/// headroom freed or used by the correction reaches the other posts.
///
/// ```json
/// { "from": "2026-01-02" }
/// ```
pub async fn replay_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(request): Json<ReplayRequest>,
) -> Result<Json<ReplayResponse>, ApiError> {
    info!(post_id = %post_id, from = %request.from, "Ledger replay requested");

    let outcome = state
        .cpm_sync
        .replay(post_id, request.from)
        .await
        .map_err(ledger_error)?;

    Ok(Json(ReplayResponse {
        post_id,
        user_id: outcome.user_id,
        from: request.from,
        rows_deleted: outcome.rows_deleted,
        rows: outcome.rows,
    }))
}
