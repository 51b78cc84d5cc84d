//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{IssueLoan, Loan, LoanDetails, LoanQuery, LoanWithReturn, ReturnLoan, ReturnOutcome},
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Overdue sweep result
#[derive(Serialize, ToSchema)]
pub struct OverdueRefreshResponse {
    /// Loans moved from active to overdue
    pub updated: u64,
}

/// Issue a loan
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = IssueLoan,
    responses(
        (status = 201, description = "Loan issued", body = Loan),
        (status = 404, description = "Reader or book not found"),
        (status = 409, description = "Last copy taken concurrently, retry"),
        (status = 422, description = "Loan refused (no copies, limit reached, reader blocked)")
    )
)]
pub async fn issue_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(mut request): Json<IssueLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    request.issued_by = Some(claims.user_id);

    let loan = state.services.loans.issue_loan(request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// List loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "List of loans", body = PaginatedResponse<LoanDetails>)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    let (loans, total) = state.services.loans.list_loans(&query).await?;
    Ok(Json(PaginatedResponse::new(loans, total, query.page, query.per_page)))
}

/// Get a loan with its return record
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanWithReturn),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanWithReturn>> {
    Ok(Json(state.services.loans.get_loan(id).await?))
}

/// Return a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body(content = ReturnLoan, description = "Optional notes"),
    responses(
        (status = 200, description = "Loan returned", body = ReturnOutcome),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<ReturnLoan>>,
) -> AppResult<Json<ReturnOutcome>> {
    let notes = body.and_then(|Json(b)| b.notes);

    let outcome = state
        .services
        .loans
        .return_loan(id, notes, Some(claims.user_id))
        .await?;
    Ok(Json(outcome))
}

/// Mark active loans past their due date as overdue
#[utoipa::path(
    post,
    path = "/loans/overdue/refresh",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue statuses refreshed", body = OverdueRefreshResponse)
    )
)]
pub async fn refresh_overdue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<OverdueRefreshResponse>> {
    let updated = state.services.loans.recompute_overdue_statuses().await?;
    Ok(Json(OverdueRefreshResponse { updated }))
}
