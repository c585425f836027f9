//! Account-manager payout handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::{info, warn};
use uuid::Uuid;

use super::{ApiError, bad_request, payout_error};
use crate::AppState;
use crate::models::payout::{ApproveRequest, Payout, PayoutListResponse, PayoutQuery};
use crate::services::payouts::PayoutService;

/// GET /api/am/payouts?status=pending&period_type=weekly
pub async fn list_payouts(
    State(state): State<AppState>,
    Query(query): Query<PayoutQuery>,
) -> Result<Json<PayoutListResponse>, ApiError> {
    let filter = query.validate().map_err(|e| {
        warn!(error = %e, "Invalid payout query");
        bad_request(e)
    })?;

    let payouts = state.payouts.list(filter).await.map_err(payout_error)?;
    let total_amount = PayoutService::total(&payouts);

    Ok(Json(PayoutListResponse {
        payouts,
        total_amount,
    }))
}

/// POST /api/am/payouts/{id}/approve
///
/// Only a `pending` payout can be approved; anything else is 409.
pub async fn approve_payout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<Payout>, ApiError> {
    info!(payout_id = %id, approver_id = %request.approver_id, "Payout approval requested");
    let payout = state
        .payouts
        .approve(id, request.approver_id)
        .await
        .map_err(payout_error)?;
    Ok(Json(payout))
}

/// POST /api/am/payouts/{id}/mark-paid
///
/// Only an `approved` payout can be marked paid.
pub async fn mark_payout_paid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payout>, ApiError> {
    let payout = state.payouts.mark_paid(id).await.map_err(payout_error)?;
    Ok(Json(payout))
}
