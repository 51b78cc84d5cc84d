//! Category endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::category::{Category, CategoryInput},
};

use super::AuthenticatedUser;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CategoryQuery {
    pub include_inactive: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(CategoryQuery),
    responses(
        (status = 200, description = "List of categories", body = Vec<Category>)
    )
)]
pub async fn list_categories(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<CategoryQuery>,
) -> AppResult<Json<Vec<Category>>> {
    let categories = state
        .services
        .catalog
        .list_categories(query.include_inactive.unwrap_or(false))
        .await?;
    Ok(Json(categories))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category details", body = Category),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Category>> {
    Ok(Json(state.services.catalog.get_category(id).await?))
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 409, description = "Category name already used")
    )
)]
pub async fn create_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<CategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    claims.require_admin()?;

    let created = state.services.catalog.create_category(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    request_body = CategoryInput,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category name already used")
    )
)]
pub async fn update_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    claims.require_admin()?;

    Ok(Json(state.services.catalog.update_category(id, input).await?))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deactivated"),
        (status = 422, description = "Category still has books")
    )
)]
pub async fn delete_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.catalog.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
