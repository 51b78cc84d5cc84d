//! Circulation store: the transactional seam used by the loan lifecycle.
//!
//! Every issue, return or fine payment runs inside one [`CirculationTx`].
//! Dropping a transaction without calling [`CirculationTx::commit`] discards
//! all of its writes.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    error::AppResult,
    models::{
        book::Book,
        loan::{
            Loan, LoanDetails, LoanQuery, LoanReturn, NewLoan, NewReturn, ReturnDetails,
            ReturnQuery,
        },
        reader::Reader,
    },
};

#[async_trait]
pub trait CirculationStore: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>>;

    /// Move active loans due before `today` to overdue, returning how many changed
    async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64>;

    async fn list_loans(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)>;

    async fn loan_details(&self, loan_id: i32) -> AppResult<Option<LoanDetails>>;

    /// Active and overdue loans of a reader, earliest due first
    async fn open_loans_for_reader(&self, reader_id: i32) -> AppResult<Vec<LoanDetails>>;

    async fn return_for_loan(&self, loan_id: i32) -> AppResult<Option<LoanReturn>>;

    async fn list_returns(&self, query: &ReturnQuery) -> AppResult<(Vec<ReturnDetails>, i64)>;
}

#[async_trait]
pub trait CirculationTx: Send {
    /// Fetch a reader and hold it until the transaction ends
    async fn reader_for_update(&mut self, reader_id: i32) -> AppResult<Option<Reader>>;

    async fn book(&mut self, book_id: i32) -> AppResult<Option<Book>>;

    /// Loans of the reader in status active or overdue
    async fn count_active_loans(&mut self, reader_id: i32) -> AppResult<i64>;

    /// An open loan for the same reader, book and loan date exists
    async fn has_duplicate_loan(
        &mut self,
        reader_id: i32,
        book_id: i32,
        loan_date: NaiveDate,
    ) -> AppResult<bool>;

    /// Take one copy off the shelf; `Conflict` when none is left at write time
    async fn decrement_available_copies(&mut self, book_id: i32) -> AppResult<()>;

    /// Put one copy back, clamped at the book's total
    async fn increment_available_copies(&mut self, book_id: i32) -> AppResult<()>;

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;

    /// Fetch a loan and hold it until the transaction ends
    async fn loan_for_update(&mut self, loan_id: i32) -> AppResult<Option<Loan>>;

    /// Set status returned and the return date
    async fn close_loan(&mut self, loan_id: i32, return_date: NaiveDate) -> AppResult<Loan>;

    async fn insert_return(&mut self, record: &NewReturn) -> AppResult<LoanReturn>;

    async fn return_for_update(&mut self, return_id: i32) -> AppResult<Option<LoanReturn>>;

    async fn mark_fine_paid(&mut self, return_id: i32) -> AppResult<LoanReturn>;

    /// Add `delta` to the reader's fine balance (floored at zero), returning the new balance
    async fn adjust_fine_balance(&mut self, reader_id: i32, delta: Decimal) -> AppResult<Decimal>;

    async fn set_blocked(&mut self, reader_id: i32, blocked: bool) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
