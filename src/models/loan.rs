//! Loan and return models and related types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::LoanStatus;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub reader_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub issued_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Loan joined with book and reader for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub isbn: Option<String>,
    pub reader_id: i32,
    pub reader_name: String,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    /// Days until the due date (negative once overdue), open loans only
    #[sqlx(skip)]
    pub days_remaining: Option<i64>,
    /// Due within the next three days
    #[sqlx(skip)]
    pub due_soon: bool,
}

impl LoanDetails {
    /// Fill the date-relative fields for `today`
    pub fn with_countdown(mut self, today: NaiveDate) -> Self {
        if self.status.is_open() {
            let remaining = (self.due_date - today).num_days();
            self.days_remaining = Some(remaining);
            self.due_soon = (0..=3).contains(&remaining);
        }
        self
    }
}

/// Issue loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IssueLoan {
    pub reader_id: i32,
    pub book_id: i32,
    /// Defaults to today
    pub loan_date: Option<NaiveDate>,
    /// Defaults to loan date + `loan_days`
    pub due_date: Option<NaiveDate>,
    /// Defaults to the configured loan period
    pub loan_days: Option<i64>,
    /// Staff member recording the loan (filled from the request context)
    #[serde(skip)]
    pub issued_by: Option<i32>,
}

/// Row to insert when a loan is issued
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i32,
    pub reader_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub issued_by: Option<i32>,
}

/// Loan query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    pub reader_id: Option<i32>,
    pub book_id: Option<i32>,
    /// Search in book title, ISBN, reader name or document id
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Return record, created exactly once per loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanReturn {
    pub id: i32,
    pub loan_id: i32,
    pub return_date: NaiveDate,
    pub overdue_days: i32,
    #[schema(value_type = String)]
    pub fine: Decimal,
    pub fine_paid: bool,
    pub notes: Option<String>,
    pub recorded_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Row to insert when a loan is returned
#[derive(Debug, Clone)]
pub struct NewReturn {
    pub loan_id: i32,
    pub return_date: NaiveDate,
    pub overdue_days: i32,
    pub fine: Decimal,
    pub notes: Option<String>,
    pub recorded_by: Option<i32>,
}

/// Return request body
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct ReturnLoan {
    pub notes: Option<String>,
}

/// Result of a successful return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    pub loan: Loan,
    #[serde(rename = "return")]
    pub return_record: LoanReturn,
    #[schema(value_type = String)]
    pub reader_fine_balance: Decimal,
    /// Reader is blocked after this return
    pub reader_blocked: bool,
}

/// Result of a fine payment
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinePayment {
    #[serde(rename = "return")]
    pub return_record: LoanReturn,
    #[schema(value_type = String)]
    pub reader_fine_balance: Decimal,
    pub reader_blocked: bool,
}

/// Return joined with its loan for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ReturnDetails {
    pub id: i32,
    pub loan_id: i32,
    pub book_title: String,
    pub reader_id: i32,
    pub reader_name: String,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: NaiveDate,
    pub overdue_days: i32,
    #[schema(value_type = String)]
    pub fine: Decimal,
    pub fine_paid: bool,
    pub notes: Option<String>,
}

/// Fine filter for return listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FineFilter {
    WithFine,
    WithoutFine,
}

/// Return query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct ReturnQuery {
    pub fine: Option<FineFilter>,
    pub reader_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Loan with its return record, if any
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanWithReturn {
    pub loan: LoanDetails,
    #[serde(rename = "return")]
    pub return_record: Option<LoanReturn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(status: LoanStatus, due: NaiveDate) -> LoanDetails {
        LoanDetails {
            id: 1,
            book_id: 1,
            book_title: "Pedro Páramo".to_string(),
            isbn: None,
            reader_id: 1,
            reader_name: "Ana Ruiz".to_string(),
            loan_date: due - chrono::Duration::days(14),
            due_date: due,
            return_date: None,
            status,
            days_remaining: None,
            due_soon: false,
        }
    }

    #[test]
    fn test_countdown() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 12).unwrap();
        let due = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        let open = details(LoanStatus::Active, due).with_countdown(today);
        assert_eq!(open.days_remaining, Some(3));
        assert!(open.due_soon);

        let late = details(LoanStatus::Overdue, due).with_countdown(due + chrono::Duration::days(2));
        assert_eq!(late.days_remaining, Some(-2));
        assert!(!late.due_soon);

        let closed = details(LoanStatus::Returned, due).with_countdown(today);
        assert_eq!(closed.days_remaining, None);
    }
}
