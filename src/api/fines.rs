//! Fine calculator endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppResult;

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, IntoParams)]
pub struct FineQuery {
    pub overdue_days: i64,
    /// Defaults to the configured daily rate
    #[param(value_type = Option<String>)]
    pub daily_rate: Option<Decimal>,
}

#[derive(Serialize, ToSchema)]
pub struct FineResponse {
    pub overdue_days: i64,
    #[schema(value_type = String)]
    pub daily_rate: Decimal,
    #[schema(value_type = String)]
    pub fine: Decimal,
}

#[utoipa::path(
    get,
    path = "/fines/compute",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(FineQuery),
    responses(
        (status = 200, description = "Computed fine", body = FineResponse),
        (status = 400, description = "Negative or oversized input")
    )
)]
pub async fn compute_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<FineQuery>,
) -> AppResult<Json<FineResponse>> {
    let loans = &state.services.loans;
    let daily_rate = query.daily_rate.unwrap_or(loans.policy().daily_fine_rate);
    let fine = loans.compute_fine(query.overdue_days, Some(daily_rate))?;

    Ok(Json(FineResponse {
        overdue_days: query.overdue_days,
        daily_rate,
        fine,
    }))
}
