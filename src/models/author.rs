//! Author model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Author record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub nationality: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub biography: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Author reference attached to a book
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuthorShort {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
}

/// Author query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AuthorQuery {
    /// Search in first or last name
    pub name: Option<String>,
    pub include_inactive: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create or replace author request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AuthorInput {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub firstname: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub lastname: String,
    pub nationality: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub biography: Option<String>,
}
