//! Creator payout handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ApiError, bad_request, payout_error};
use crate::AppState;
use crate::models::cpm::ErrorResponse;
use crate::models::creator_payout::{
    CreatorPayout, CreatorPayoutListResponse, CreatorPayoutQuery, RefreshRequest,
};
use crate::models::payout::ApproveRequest;
use crate::services::creator_payouts::{CreatorPayoutService, RefreshReport};

/// GET /api/creators/payouts?status=pending&year=2026&month=2
pub async fn list_creator_payouts(
    State(state): State<AppState>,
    Query(query): Query<CreatorPayoutQuery>,
) -> Result<Json<CreatorPayoutListResponse>, ApiError> {
    let filter = query.validate().map_err(|e| {
        warn!(error = %e, "Invalid creator payout query");
        bad_request(e)
    })?;

    let payouts = state.creator_payouts.list(filter).await.map_err(payout_error)?;
    let total_amount = CreatorPayoutService::total(&payouts);

    Ok(Json(CreatorPayoutListResponse {
        payouts,
        total_amount,
    }))
}

/// POST /api/creators/payouts/refresh
///
/// Recompute the pending payouts of a month from the ledger.
pub async fn refresh_creator_payouts(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshReport>, ApiError> {
    info!(period = %request.month, "Creator payout refresh requested");
    let report = state
        .creator_payouts
        .refresh_month(request.month)
        .await
        .map_err(|e| {
            error!(error = %e, "Creator payout refresh failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string(), "STORE_ERROR")),
            )
        })?;
    Ok(Json(report))
}

/// POST /api/creators/payouts/{id}/approve
pub async fn approve_creator_payout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<CreatorPayout>, ApiError> {
    let payout = state
        .creator_payouts
        .approve(id, request.approver_id)
        .await
        .map_err(payout_error)?;
    Ok(Json(payout))
}

/// POST /api/creators/payouts/{id}/mark-paid
pub async fn mark_creator_payout_paid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CreatorPayout>, ApiError> {
    let payout = state
        .creator_payouts
        .mark_paid(id)
        .await
        .map_err(payout_error)?;
    Ok(Json(payout))
}
