//! Error types for Biblio server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchData = 4,
    BookNotAvailable = 5,
    MaxLoansReached = 6,
    ReaderBlocked = 7,
    AlreadyReturned = 8,
    ConcurrentUpdate = 9,
    Duplicate = 10,
    BadValue = 11,
    InUse = 12,
    UnpaidFines = 13,
    FineNotPayable = 14,
}

/// The loan precondition that refused an issuance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoanRule {
    #[error("book {book_id} has no available copies")]
    NoAvailableCopies { book_id: i32 },

    #[error("reader has reached the loan limit ({active}/{limit})")]
    LoanLimitReached { active: i64, limit: i32 },

    #[error("reader {reader_id} is blocked")]
    ReaderBlocked { reader_id: i32 },

    #[error("book {book_id} is not active in the catalog")]
    BookInactive { book_id: i32 },

    #[error("an identical active loan already exists")]
    DuplicateLoan,

    #[error("due date is before the loan date")]
    DueBeforeLoanDate,
}

impl LoanRule {
    fn code(&self) -> ErrorCode {
        match self {
            LoanRule::NoAvailableCopies { .. } | LoanRule::BookInactive { .. } => {
                ErrorCode::BookNotAvailable
            }
            LoanRule::LoanLimitReached { .. } => ErrorCode::MaxLoansReached,
            LoanRule::ReaderBlocked { .. } => ErrorCode::ReaderBlocked,
            LoanRule::DuplicateLoan => ErrorCode::Duplicate,
            LoanRule::DueBeforeLoanDate => ErrorCode::BadValue,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Loan refused: {0}")]
    LoanValidation(LoanRule),

    #[error("Loan {loan_id} has already been returned")]
    AlreadyReturned { loan_id: i32 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Unpaid fines: {0}")]
    UnpaidFines(String),

    #[error("Fine cannot be paid: {0}")]
    FineNotPayable(String),
}

impl From<LoanRule> for AppError {
    fn from(rule: LoanRule) -> Self {
        AppError::LoanValidation(rule)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::LoanValidation(rule) => {
                (StatusCode::UNPROCESSABLE_ENTITY, rule.code(), rule.to_string())
            }
            AppError::AlreadyReturned { .. } => {
                (StatusCode::CONFLICT, ErrorCode::AlreadyReturned, self.to_string())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::ConcurrentUpdate, msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::BusinessRule(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::InUse, msg.clone())
            }
            AppError::UnpaidFines(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::UnpaidFines, msg.clone())
            }
            AppError::FineNotPayable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::FineNotPayable, msg.clone())
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

/// Map a unique-constraint violation to a `Conflict`, anything else stays a database error
pub fn unique_violation(err: sqlx::Error, message: impl Into<String>) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message.into()),
        _ => AppError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_rule_status() {
        let response = AppError::from(LoanRule::NoAvailableCopies { book_id: 3 }).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_already_returned_is_conflict() {
        let response = AppError::AlreadyReturned { loan_id: 9 }.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_fine_refusals_have_their_own_code() {
        let response = AppError::FineNotPayable("Fine already paid".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("\"code\":14"));
        assert!(body.contains("FineNotPayable"));

        let response = AppError::BusinessRule("Category still has books".to_string()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("\"code\":12"));
    }

    #[test]
    fn test_loan_rule_message() {
        let err = AppError::from(LoanRule::LoanLimitReached { active: 3, limit: 3 });
        assert_eq!(err.to_string(), "Loan refused: reader has reached the loan limit (3/3)");
    }
}
