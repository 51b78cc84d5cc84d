//! Book (catalog title) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::author::AuthorShort;

/// Book record with its copy counters.
///
/// `0 <= available_copies <= total_copies` holds for every committed row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub isbn: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub location: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub authors: Vec<AuthorShort>,
}

/// Short book representation for listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub isbn: Option<String>,
    pub title: String,
    pub category_name: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub active: bool,
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Search in title or ISBN
    pub search: Option<String>,
    pub category_id: Option<i32>,
    /// Only books with at least one copy on the shelf
    pub available_only: Option<bool>,
    /// Include books withdrawn from the catalog
    pub include_inactive: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create or replace book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(max = 20, message = "ISBN must be at most 20 characters"))]
    pub isbn: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    pub subtitle: Option<String>,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    #[validate(range(min = 1, message = "Page count must be positive"))]
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    #[validate(range(min = 1, message = "A book must have at least 1 copy"))]
    pub total_copies: i32,
    pub location: Option<String>,
    #[serde(default)]
    pub author_ids: Vec<i32>,
}

/// Strip separators from an ISBN ("978-2-07-040850-4" -> "9782070408504")
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Available copies after changing the total, keeping the on-loan count
pub fn rebalance_available(old_total: i32, old_available: i32, new_total: i32) -> i32 {
    let on_loan = old_total - old_available;
    (new_total - on_loan).max(0)
}
