//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Category record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// Active books filed under this category
    #[sqlx(default)]
    #[serde(default)]
    pub nb_books: i64,
}

/// Create or replace category request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "Category name is required"))]
    pub name: String,
    pub description: Option<String>,
}
