//! Account-manager stats handler

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::{ApiError, activity_error};
use crate::AppState;
use crate::models::activity::{AmStats, StatsQuery};

/// Today, this week and this month for an account manager
///
/// GET /api/am/{user_id}/stats?team_id=…
///
/// With `team_id` only that team's accounts count and the account-pair
/// multiplier is 1.
pub async fn get_stats(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<AmStats>, ApiError> {
    let today = Utc::now().date_naive();
    let stats = state
        .activity
        .stats(user_id, query.team_id, today)
        .await
        .map_err(activity_error)?;

    debug!(
        user_id = %user_id,
        team_id = ?query.team_id,
        posts_today = stats.posts_today,
        days_hit_this_week = stats.days_hit_this_week,
        weeks_hit_this_month = stats.weeks_hit_this_month,
        "Account manager stats computed"
    );
    Ok(Json(stats))
}
