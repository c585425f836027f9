//! HTTP surface
//!
//! Every handler returns `Result<Json<T>, ApiError>`; errors carry a
//! machine-readable `code` next to the message.

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::AppState;
use crate::models::cpm::ErrorResponse;
use crate::services::am_activity::ActivityError;
use crate::services::ledger::LedgerError;
use crate::services::payouts::PayoutError;

pub mod account_manager;
pub mod cpm;
pub mod creator_payouts;
pub mod payouts;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(message, "INVALID_REQUEST")),
    )
}

pub fn ledger_error(err: LedgerError) -> ApiError {
    let status = match &err {
        LedgerError::DuplicateRow { .. }
        | LedgerError::OutOfOrder { .. }
        | LedgerError::Contended(_) => StatusCode::CONFLICT,
        LedgerError::FutureSnapshot { .. } => StatusCode::BAD_REQUEST,
        LedgerError::NotApproved(_)
        | LedgerError::WindowClosed { .. }
        | LedgerError::BeforePostCreated { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::PostNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Store(e) => {
            error!(error = %e, "Ledger store error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::new(err.to_string(), err.code())))
}

pub fn payout_error(err: PayoutError) -> ApiError {
    let status = match &err {
        PayoutError::NotFound(_) => StatusCode::NOT_FOUND,
        PayoutError::InvalidTransition { .. } | PayoutError::AlreadyExists { .. } => {
            StatusCode::CONFLICT
        }
        PayoutError::Store(e) => {
            error!(error = %e, "Payout store error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::new(err.to_string(), err.code())))
}

pub fn activity_error(err: ActivityError) -> ApiError {
    let (status, code) = match &err {
        ActivityError::UserNotFound(_) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
        ActivityError::TeamNotFound(_) => (StatusCode::NOT_FOUND, "TEAM_NOT_FOUND"),
        ActivityError::Store(e) => {
            error!(error = %e, "Activity store error");
            (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR")
        }
    };
    (status, Json(ErrorResponse::new(err.to_string(), code)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/cpm/snapshots", post(cpm::post_snapshot))
        .route("/api/cpm/posts/{post_id}/rows", get(cpm::get_post_rows))
        .route("/api/cpm/posts/{post_id}/latest", get(cpm::get_latest_row))
        .route("/api/cpm/posts/{post_id}/replay", post(cpm::replay_post))
        .route("/api/cpm/users/{user_id}/rows", get(cpm::get_user_rows))
        .route(
            "/api/cpm/users/{user_id}/monthly-total",
            get(cpm::get_monthly_total),
        )
        .route("/api/am/payouts", get(payouts::list_payouts))
        .route("/api/am/payouts/{id}/approve", post(payouts::approve_payout))
        .route("/api/am/payouts/{id}/mark-paid", post(payouts::mark_payout_paid))
        .route("/api/am/{user_id}/stats", get(account_manager::get_stats))
        .route(
            "/api/creators/payouts",
            get(creator_payouts::list_creator_payouts),
        )
        .route(
            "/api/creators/payouts/refresh",
            post(creator_payouts::refresh_creator_payouts),
        )
        .route(
            "/api/creators/payouts/{id}/approve",
            post(creator_payouts::approve_creator_payout),
        )
        .route(
            "/api/creators/payouts/{id}/mark-paid",
            post(creator_payouts::mark_creator_payout_paid),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
