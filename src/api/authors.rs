//! Author endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::author::{Author, AuthorInput, AuthorQuery},
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List authors
#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(AuthorQuery),
    responses(
        (status = 200, description = "List of authors", body = PaginatedResponse<Author>)
    )
)]
pub async fn list_authors(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<AuthorQuery>,
) -> AppResult<Json<PaginatedResponse<Author>>> {
    let (authors, total) = state.services.catalog.search_authors(&query).await?;
    Ok(Json(PaginatedResponse::new(authors, total, query.page, query.per_page)))
}

#[utoipa::path(
    get,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Author details", body = Author),
        (status = 404, description = "Author not found")
    )
)]
pub async fn get_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Author>> {
    Ok(Json(state.services.catalog.get_author(id).await?))
}

#[utoipa::path(
    post,
    path = "/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body = AuthorInput,
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<AuthorInput>,
) -> AppResult<(StatusCode, Json<Author>)> {
    claims.require_admin()?;

    let created = state.services.catalog.create_author(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Author ID")),
    request_body = AuthorInput,
    responses(
        (status = 200, description = "Author updated", body = Author),
        (status = 404, description = "Author not found")
    )
)]
pub async fn update_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<AuthorInput>,
) -> AppResult<Json<Author>> {
    claims.require_admin()?;

    Ok(Json(state.services.catalog.update_author(id, input).await?))
}

/// Deactivate an author
#[utoipa::path(
    delete,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Author ID")),
    responses(
        (status = 204, description = "Author deactivated"),
        (status = 404, description = "Author not found"),
        (status = 422, description = "Books by this author are on loan")
    )
)]
pub async fn delete_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.catalog.delete_author(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
