//! Shared domain enums

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

use crate::error::AppError;

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a loan.
///
/// `active -> overdue` happens when the due date passes, `active -> returned`
/// and `overdue -> returned` when a return is recorded. `returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
        }
    }

    /// Loan still holds a copy (counts against the reader's limit)
    pub fn is_open(&self) -> bool {
        match self {
            LoanStatus::Active | LoanStatus::Overdue => true,
            LoanStatus::Returned => false,
        }
    }

    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Active, LoanStatus::Overdue)
                | (LoanStatus::Active, LoanStatus::Returned)
                | (LoanStatus::Overdue, LoanStatus::Returned)
        )
    }

    /// Checked transition; `loan_id` only feeds the error
    pub fn transition(self, next: LoanStatus, loan_id: i32) -> Result<LoanStatus, AppError> {
        if self.can_transition_to(next) {
            return Ok(next);
        }
        match self {
            LoanStatus::Returned => Err(AppError::AlreadyReturned { loan_id }),
            _ => Err(AppError::Internal(format!(
                "Invalid loan transition {} -> {} for loan {}",
                self, next, loan_id
            ))),
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(LoanStatus::Active),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus (stored as text)
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Role carried in the request context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages catalog, readers and circulation
    Admin,
    /// Runs the circulation desk
    Staff,
}
