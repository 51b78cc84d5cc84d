//! Statistics endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, services::stats::DashboardStats};

use super::AuthenticatedUser;

/// Dashboard counters
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<DashboardStats>> {
    state.services.loans.recompute_overdue_statuses().await?;
    Ok(Json(state.services.stats.dashboard().await?))
}
