//! Reader registry endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        loan::LoanDetails,
        reader::{Reader, ReaderInput, ReaderQuery, ReaderShort},
    },
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List readers with search, blocked-state filter and pagination
#[utoipa::path(
    get,
    path = "/readers",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(ReaderQuery),
    responses(
        (status = 200, description = "List of readers", body = PaginatedResponse<ReaderShort>)
    )
)]
pub async fn list_readers(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ReaderQuery>,
) -> AppResult<Json<PaginatedResponse<ReaderShort>>> {
    let (readers, total) = state.services.readers.search(&query).await?;
    Ok(Json(PaginatedResponse::new(readers, total, query.page, query.per_page)))
}

#[utoipa::path(
    get,
    path = "/readers/{id}",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reader ID")),
    responses(
        (status = 200, description = "Reader details", body = Reader),
        (status = 404, description = "Reader not found")
    )
)]
pub async fn get_reader(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reader>> {
    Ok(Json(state.services.readers.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/readers",
    tag = "readers",
    security(("bearer_auth" = [])),
    request_body = ReaderInput,
    responses(
        (status = 201, description = "Reader registered", body = Reader),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Document id already registered")
    )
)]
pub async fn create_reader(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<ReaderInput>,
) -> AppResult<(StatusCode, Json<Reader>)> {
    claims.require_admin()?;

    let created = state.services.readers.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/readers/{id}",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reader ID")),
    request_body = ReaderInput,
    responses(
        (status = 200, description = "Reader updated", body = Reader),
        (status = 404, description = "Reader not found"),
        (status = 409, description = "Document id already registered")
    )
)]
pub async fn update_reader(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<ReaderInput>,
) -> AppResult<Json<Reader>> {
    claims.require_admin()?;

    Ok(Json(state.services.readers.update(id, input).await?))
}

#[utoipa::path(
    delete,
    path = "/readers/{id}",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reader ID")),
    responses(
        (status = 204, description = "Reader deleted"),
        (status = 404, description = "Reader not found"),
        (status = 422, description = "Reader has active loans or unpaid fines")
    )
)]
pub async fn delete_reader(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.readers.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Open loans of a reader, with days remaining
#[utoipa::path(
    get,
    path = "/readers/{id}/loans",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reader ID")),
    responses(
        (status = 200, description = "Open loans", body = Vec<LoanDetails>),
        (status = 404, description = "Reader not found")
    )
)]
pub async fn get_reader_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    state.services.readers.get(id).await?;
    Ok(Json(state.services.loans.reader_loans(id).await?))
}

#[utoipa::path(
    post,
    path = "/readers/{id}/block",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reader ID")),
    responses(
        (status = 200, description = "Reader blocked", body = Reader),
        (status = 404, description = "Reader not found")
    )
)]
pub async fn block_reader(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reader>> {
    claims.require_admin()?;

    Ok(Json(state.services.readers.set_blocked(id, true).await?))
}

#[utoipa::path(
    post,
    path = "/readers/{id}/unblock",
    tag = "readers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reader ID")),
    responses(
        (status = 200, description = "Reader unblocked", body = Reader),
        (status = 404, description = "Reader not found")
    )
)]
pub async fn unblock_reader(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reader>> {
    claims.require_admin()?;

    Ok(Json(state.services.readers.set_blocked(id, false).await?))
}
