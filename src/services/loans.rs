//! Loan lifecycle: issue, return, overdue sweep and fine payment

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use super::{clock::Clock, fines};
use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult, LoanRule},
    models::{
        enums::LoanStatus,
        loan::{
            FinePayment, IssueLoan, Loan, LoanDetails, LoanQuery, LoanWithReturn, NewLoan,
            NewReturn, ReturnDetails, ReturnOutcome, ReturnQuery,
        },
    },
    repository::CirculationStore,
};

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn CirculationStore>,
    clock: Arc<dyn Clock>,
    policy: CirculationConfig,
}

impl LoansService {
    pub fn new(
        store: Arc<dyn CirculationStore>,
        clock: Arc<dyn Clock>,
        policy: CirculationConfig,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &CirculationConfig {
        &self.policy
    }

    /// Issue a loan.
    ///
    /// The reader row stays locked from the limit check to the commit, and
    /// the copy decrement is conditional, so concurrent issuances can
    /// neither exceed the reader's limit nor oversell the last copy.
    pub async fn issue_loan(&self, request: IssueLoan) -> AppResult<Loan> {
        let loan_date = request.loan_date.unwrap_or_else(|| self.clock.today());
        let loan_days = request.loan_days.unwrap_or(self.policy.loan_period_days);
        if loan_days < 1 {
            return Err(AppError::Validation(
                "Loan period must be at least one day".to_string(),
            ));
        }
        let due_date = match request.due_date {
            Some(due_date) => due_date,
            None => loan_date
                .checked_add_signed(
                    Duration::try_days(loan_days)
                        .ok_or_else(|| AppError::Validation("Loan period is too long".to_string()))?,
                )
                .ok_or_else(|| AppError::Validation("Loan period is too long".to_string()))?,
        };
        if due_date < loan_date {
            return Err(LoanRule::DueBeforeLoanDate.into());
        }

        let mut tx = self.store.begin().await?;

        let reader = tx
            .reader_for_update(request.reader_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Reader with id {} not found", request.reader_id))
            })?;
        if reader.blocked {
            return Err(LoanRule::ReaderBlocked { reader_id: reader.id }.into());
        }

        let active = tx.count_active_loans(reader.id).await?;
        if active >= i64::from(reader.loan_limit) {
            return Err(LoanRule::LoanLimitReached {
                active,
                limit: reader.loan_limit,
            }
            .into());
        }

        let book = tx
            .book(request.book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", request.book_id)))?;
        if !book.active {
            return Err(LoanRule::BookInactive { book_id: book.id }.into());
        }
        if book.available_copies <= 0 {
            return Err(LoanRule::NoAvailableCopies { book_id: book.id }.into());
        }

        if tx.has_duplicate_loan(reader.id, book.id, loan_date).await? {
            return Err(LoanRule::DuplicateLoan.into());
        }

        tx.decrement_available_copies(book.id).await?;
        let loan = tx
            .insert_loan(&NewLoan {
                book_id: book.id,
                reader_id: reader.id,
                loan_date,
                due_date,
                issued_by: request.issued_by,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            book_id = book.id,
            reader_id = reader.id,
            %due_date,
            "Loan issued"
        );
        Ok(loan)
    }

    /// Return a loan, charging the fine for late days
    pub async fn return_loan(
        &self,
        loan_id: i32,
        notes: Option<String>,
        recorded_by: Option<i32>,
    ) -> AppResult<ReturnOutcome> {
        let today = self.clock.today();
        let mut tx = self.store.begin().await?;

        let loan = tx
            .loan_for_update(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        loan.status.transition(LoanStatus::Returned, loan.id)?;

        let reader = tx
            .reader_for_update(loan.reader_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reader with id {} not found", loan.reader_id)))?;

        let overdue_days = fines::overdue_days(loan.due_date, today);
        let fine = fines::compute_fine(overdue_days, self.policy.daily_fine_rate)
            .map(fines::charged_amount)
            .ok_or_else(|| AppError::Internal(format!("Fine overflow for loan {}", loan.id)))?;

        let closed = tx.close_loan(loan.id, today).await?;
        let return_record = tx
            .insert_return(&NewReturn {
                loan_id: loan.id,
                return_date: today,
                overdue_days: i32::try_from(overdue_days).unwrap_or(i32::MAX),
                fine,
                notes: notes.filter(|n| !n.trim().is_empty()),
                recorded_by,
            })
            .await?;
        tx.increment_available_copies(loan.book_id).await?;

        let mut balance = reader.fine_balance;
        let mut blocked = reader.blocked;
        if fine > Decimal::ZERO {
            balance = tx.adjust_fine_balance(reader.id, fine).await?;
            if !blocked && balance >= self.policy.fine_block_threshold {
                tx.set_blocked(reader.id, true).await?;
                blocked = true;
            }
        }

        tx.commit().await?;

        tracing::info!(loan_id, overdue_days, %fine, "Loan returned");
        if blocked && !reader.blocked {
            tracing::info!(reader_id = reader.id, %balance, "Reader blocked for unpaid fines");
        }

        Ok(ReturnOutcome {
            loan: closed,
            return_record,
            reader_fine_balance: balance,
            reader_blocked: blocked,
        })
    }

    /// Move active loans past their due date to overdue
    pub async fn recompute_overdue_statuses(&self) -> AppResult<u64> {
        let changed = self.store.mark_overdue(self.clock.today()).await?;
        if changed > 0 {
            tracing::info!(changed, "Loans marked overdue");
        }
        Ok(changed)
    }

    /// Settle the fine of a return
    pub async fn pay_fine(&self, return_id: i32) -> AppResult<FinePayment> {
        let mut tx = self.store.begin().await?;

        let record = tx
            .return_for_update(return_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Return with id {} not found", return_id)))?;
        if record.fine <= Decimal::ZERO {
            return Err(AppError::FineNotPayable("This return has no fine".to_string()));
        }
        if record.fine_paid {
            return Err(AppError::FineNotPayable("Fine already paid".to_string()));
        }

        let loan = tx
            .loan_for_update(record.loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", record.loan_id)))?;
        let reader = tx
            .reader_for_update(loan.reader_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reader with id {} not found", loan.reader_id)))?;

        let paid = tx.mark_fine_paid(record.id).await?;
        let balance = tx.adjust_fine_balance(reader.id, -record.fine).await?;

        // only lift blocks caused by the fine balance
        let threshold = self.policy.fine_block_threshold;
        let mut blocked = reader.blocked;
        if blocked && reader.fine_balance >= threshold && balance < threshold {
            tx.set_blocked(reader.id, false).await?;
            blocked = false;
        }

        tx.commit().await?;

        tracing::info!(return_id, reader_id = reader.id, fine = %record.fine, %balance, "Fine paid");
        Ok(FinePayment {
            return_record: paid,
            reader_fine_balance: balance,
            reader_blocked: blocked,
        })
    }

    /// List loans; overdue statuses are refreshed first
    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        self.recompute_overdue_statuses().await?;
        let today = self.clock.today();
        let (loans, total) = self.store.list_loans(query).await?;
        Ok((
            loans.into_iter().map(|l| l.with_countdown(today)).collect(),
            total,
        ))
    }

    /// Get a loan with its return record
    pub async fn get_loan(&self, loan_id: i32) -> AppResult<LoanWithReturn> {
        let loan = self
            .store
            .loan_details(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        let return_record = self.store.return_for_loan(loan_id).await?;
        Ok(LoanWithReturn {
            loan: loan.with_countdown(self.clock.today()),
            return_record,
        })
    }

    /// Open loans of a reader with their countdown
    pub async fn reader_loans(&self, reader_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.recompute_overdue_statuses().await?;
        let today = self.clock.today();
        let loans = self.store.open_loans_for_reader(reader_id).await?;
        Ok(loans.into_iter().map(|l| l.with_countdown(today)).collect())
    }

    pub async fn list_returns(&self, query: &ReturnQuery) -> AppResult<(Vec<ReturnDetails>, i64)> {
        self.store.list_returns(query).await
    }

    /// Fine for `overdue_days`, at the configured rate unless one is given
    pub fn compute_fine(&self, overdue_days: i64, daily_rate: Option<Decimal>) -> AppResult<Decimal> {
        if overdue_days < 0 {
            return Err(AppError::BadRequest("overdue_days cannot be negative".to_string()));
        }
        let daily_rate = daily_rate.unwrap_or(self.policy.daily_fine_rate);
        if daily_rate < Decimal::ZERO {
            return Err(AppError::BadRequest("daily_rate cannot be negative".to_string()));
        }
        fines::compute_fine(overdue_days, daily_rate)
            .ok_or_else(|| AppError::BadRequest("Fine is too large to compute".to_string()))
    }
}
