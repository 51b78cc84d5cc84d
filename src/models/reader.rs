//! Reader (borrower) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Reader record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reader {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub document_id: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub loan_limit: i32,
    /// Unpaid fines accumulated over all returns
    #[schema(value_type = String)]
    pub fine_balance: Decimal,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl Reader {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// Short reader representation for listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ReaderShort {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub document_id: String,
    pub loan_limit: i32,
    #[schema(value_type = String)]
    pub fine_balance: Decimal,
    pub blocked: bool,
    /// Active or overdue loans
    pub nb_loans: i64,
}

/// Reader blocked-state filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReaderState {
    Blocked,
    Active,
}

/// Reader query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ReaderQuery {
    /// Search in names or document id
    pub search: Option<String>,
    pub state: Option<ReaderState>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create or replace reader request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReaderInput {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub firstname: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub lastname: String,
    #[validate(length(min = 1, max = 30, message = "Document id is required"))]
    pub document_id: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Defaults to the configured loan limit
    pub loan_limit: Option<i32>,
}
