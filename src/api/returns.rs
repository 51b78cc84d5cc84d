//! Return records and fine payment endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{FinePayment, ReturnDetails, ReturnQuery},
};

use super::{AuthenticatedUser, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/returns",
    tag = "returns",
    security(("bearer_auth" = [])),
    params(ReturnQuery),
    responses(
        (status = 200, description = "List of returns", body = PaginatedResponse<ReturnDetails>)
    )
)]
pub async fn list_returns(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ReturnQuery>,
) -> AppResult<Json<PaginatedResponse<ReturnDetails>>> {
    let (returns, total) = state.services.loans.list_returns(&query).await?;
    Ok(Json(PaginatedResponse::new(returns, total, query.page, query.per_page)))
}

/// Record payment of a return's fine
#[utoipa::path(
    post,
    path = "/returns/{id}/pay",
    tag = "returns",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Return ID")),
    responses(
        (status = 200, description = "Fine paid", body = FinePayment),
        (status = 404, description = "Return not found"),
        (status = 422, description = "No fine or already paid")
    )
)]
pub async fn pay_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<FinePayment>> {
    Ok(Json(state.services.loans.pay_fine(id).await?))
}
