//! In-memory circulation store.
//!
//! Transactions work on a private copy of the state that replaces the shared
//! state on commit, so an uncommitted transaction leaves no trace. Only one
//! transaction is open at a time.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{CirculationStore, CirculationTx, Pagination};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        enums::LoanStatus,
        loan::{
            FineFilter, Loan, LoanDetails, LoanQuery, LoanReturn, NewLoan, NewReturn,
            ReturnDetails, ReturnQuery,
        },
        reader::Reader,
    },
};

#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    pub books: BTreeMap<i32, Book>,
    pub readers: BTreeMap<i32, Reader>,
    pub loans: BTreeMap<i32, Loan>,
    pub returns: BTreeMap<i32, LoanReturn>,
    next_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn details(&self, loan: &Loan) -> LoanDetails {
        let book = self.books.get(&loan.book_id);
        let reader = self.readers.get(&loan.reader_id);
        LoanDetails {
            id: loan.id,
            book_id: loan.book_id,
            book_title: book.map(|b| b.title.clone()).unwrap_or_default(),
            isbn: book.and_then(|b| b.isbn.clone()),
            reader_id: loan.reader_id,
            reader_name: reader.map(|r| r.full_name()).unwrap_or_default(),
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            status: loan.status,
            days_remaining: None,
            due_soon: false,
        }
    }

    fn open_loans(&self, reader_id: i32) -> impl Iterator<Item = &Loan> {
        self.loans
            .values()
            .filter(move |l| l.reader_id == reader_id && l.status.is_open())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a book with all copies on the shelf
    pub async fn add_book(&self, title: &str, total_copies: i32) -> Book {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let book = Book {
            id,
            isbn: None,
            title: title.to_string(),
            subtitle: None,
            publication_year: None,
            publisher: None,
            pages: None,
            language: None,
            description: None,
            category_id: None,
            total_copies,
            available_copies: total_copies,
            location: None,
            active: true,
            created_at: Utc::now(),
            authors: Vec::new(),
        };
        state.books.insert(id, book.clone());
        book
    }

    /// Add a reader with a clean record
    pub async fn add_reader(&self, firstname: &str, lastname: &str, loan_limit: i32) -> Reader {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let reader = Reader {
            id,
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
            document_id: format!("DOC-{}", id),
            phone: None,
            address: None,
            birth_date: None,
            loan_limit,
            fine_balance: Decimal::ZERO,
            blocked: false,
            created_at: Utc::now(),
        };
        state.readers.insert(id, reader.clone());
        reader
    }

    /// Apply an arbitrary change outside of any transaction (test setup)
    pub async fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut MemoryState),
    {
        let mut state = self.state.lock().await;
        change(&mut state);
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl CirculationStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let mut changed = 0;
        for loan in state.loans.values_mut() {
            if loan.status == LoanStatus::Active && loan.due_date < today {
                loan.status = LoanStatus::Overdue;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn list_loans(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        let state = self.state.lock().await;
        let search = query.search.as_ref().map(|s| s.trim().to_lowercase());
        let mut loans: Vec<LoanDetails> = state
            .loans
            .values()
            .filter(|l| query.status.map_or(true, |s| l.status == s))
            .filter(|l| query.reader_id.map_or(true, |id| l.reader_id == id))
            .filter(|l| query.book_id.map_or(true, |id| l.book_id == id))
            .map(|l| state.details(l))
            .filter(|d| {
                search.as_ref().map_or(true, |s| {
                    d.book_title.to_lowercase().contains(s) || d.reader_name.to_lowercase().contains(s)
                })
            })
            .collect();
        loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date).then(b.id.cmp(&a.id)));

        let total = loans.len() as i64;
        let pagination = Pagination::new(query.page, query.per_page);
        let page = loans
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .collect();
        Ok((page, total))
    }

    async fn loan_details(&self, loan_id: i32) -> AppResult<Option<LoanDetails>> {
        let state = self.state.lock().await;
        Ok(state.loans.get(&loan_id).map(|l| state.details(l)))
    }

    async fn open_loans_for_reader(&self, reader_id: i32) -> AppResult<Vec<LoanDetails>> {
        let state = self.state.lock().await;
        let mut loans: Vec<LoanDetails> =
            state.open_loans(reader_id).map(|l| state.details(l)).collect();
        loans.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(loans)
    }

    async fn return_for_loan(&self, loan_id: i32) -> AppResult<Option<LoanReturn>> {
        let state = self.state.lock().await;
        Ok(state.returns.values().find(|r| r.loan_id == loan_id).cloned())
    }

    async fn list_returns(&self, query: &ReturnQuery) -> AppResult<(Vec<ReturnDetails>, i64)> {
        let state = self.state.lock().await;
        let mut returns: Vec<ReturnDetails> = state
            .returns
            .values()
            .filter(|r| match query.fine {
                Some(FineFilter::WithFine) => r.fine > Decimal::ZERO,
                Some(FineFilter::WithoutFine) => r.fine == Decimal::ZERO,
                None => true,
            })
            .filter_map(|r| state.loans.get(&r.loan_id).map(|l| (r, l)))
            .filter(|(_, l)| query.reader_id.map_or(true, |id| l.reader_id == id))
            .map(|(r, l)| {
                let details = state.details(l);
                ReturnDetails {
                    id: r.id,
                    loan_id: r.loan_id,
                    book_title: details.book_title,
                    reader_id: l.reader_id,
                    reader_name: details.reader_name,
                    loan_date: l.loan_date,
                    due_date: l.due_date,
                    return_date: r.return_date,
                    overdue_days: r.overdue_days,
                    fine: r.fine,
                    fine_paid: r.fine_paid,
                    notes: r.notes.clone(),
                }
            })
            .collect();
        returns.sort_by(|a, b| b.return_date.cmp(&a.return_date).then(b.id.cmp(&a.id)));

        let total = returns.len() as i64;
        let pagination = Pagination::new(query.page, query.per_page);
        let page = returns
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .collect();
        Ok((page, total))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl MemoryTx {
    fn loan_mut(&mut self, loan_id: i32) -> AppResult<&mut Loan> {
        self.work
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    fn reader_mut(&mut self, reader_id: i32) -> AppResult<&mut Reader> {
        self.work
            .readers
            .get_mut(&reader_id)
            .ok_or_else(|| AppError::NotFound(format!("Reader with id {} not found", reader_id)))
    }

    fn book_mut(&mut self, book_id: i32) -> AppResult<&mut Book> {
        self.work
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }
}

#[async_trait]
impl CirculationTx for MemoryTx {
    async fn reader_for_update(&mut self, reader_id: i32) -> AppResult<Option<Reader>> {
        Ok(self.work.readers.get(&reader_id).cloned())
    }

    async fn book(&mut self, book_id: i32) -> AppResult<Option<Book>> {
        Ok(self.work.books.get(&book_id).cloned())
    }

    async fn count_active_loans(&mut self, reader_id: i32) -> AppResult<i64> {
        Ok(self.work.open_loans(reader_id).count() as i64)
    }

    async fn has_duplicate_loan(
        &mut self,
        reader_id: i32,
        book_id: i32,
        loan_date: NaiveDate,
    ) -> AppResult<bool> {
        Ok(self
            .work
            .open_loans(reader_id)
            .any(|l| l.book_id == book_id && l.loan_date == loan_date))
    }

    async fn decrement_available_copies(&mut self, book_id: i32) -> AppResult<()> {
        let book = self.book_mut(book_id)?;
        if book.available_copies <= 0 {
            return Err(AppError::Conflict(format!(
                "Book {} has no copy left to lend, please retry",
                book_id
            )));
        }
        book.available_copies -= 1;
        Ok(())
    }

    async fn increment_available_copies(&mut self, book_id: i32) -> AppResult<()> {
        let book = self.book_mut(book_id)?;
        if book.available_copies >= book.total_copies {
            tracing::warn!(book_id, "Available copies already at total, increment clamped");
            return Ok(());
        }
        book.available_copies += 1;
        Ok(())
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let id = self.work.next_id();
        let row = Loan {
            id,
            book_id: loan.book_id,
            reader_id: loan.reader_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            status: LoanStatus::Active,
            issued_by: loan.issued_by,
            created_at: Utc::now(),
        };
        self.work.loans.insert(id, row.clone());
        Ok(row)
    }

    async fn loan_for_update(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        Ok(self.work.loans.get(&loan_id).cloned())
    }

    async fn close_loan(&mut self, loan_id: i32, return_date: NaiveDate) -> AppResult<Loan> {
        let loan = self.loan_mut(loan_id)?;
        loan.status = LoanStatus::Returned;
        loan.return_date = Some(return_date);
        Ok(loan.clone())
    }

    async fn insert_return(&mut self, record: &NewReturn) -> AppResult<LoanReturn> {
        if self.work.returns.values().any(|r| r.loan_id == record.loan_id) {
            return Err(AppError::Conflict(format!(
                "Loan {} already has a return",
                record.loan_id
            )));
        }
        let id = self.work.next_id();
        let row = LoanReturn {
            id,
            loan_id: record.loan_id,
            return_date: record.return_date,
            overdue_days: record.overdue_days,
            fine: record.fine,
            fine_paid: false,
            notes: record.notes.clone(),
            recorded_by: record.recorded_by,
            created_at: Utc::now(),
        };
        self.work.returns.insert(id, row.clone());
        Ok(row)
    }

    async fn return_for_update(&mut self, return_id: i32) -> AppResult<Option<LoanReturn>> {
        Ok(self.work.returns.get(&return_id).cloned())
    }

    async fn mark_fine_paid(&mut self, return_id: i32) -> AppResult<LoanReturn> {
        let record = self
            .work
            .returns
            .get_mut(&return_id)
            .ok_or_else(|| AppError::NotFound(format!("Return with id {} not found", return_id)))?;
        record.fine_paid = true;
        Ok(record.clone())
    }

    async fn adjust_fine_balance(&mut self, reader_id: i32, delta: Decimal) -> AppResult<Decimal> {
        let reader = self.reader_mut(reader_id)?;
        reader.fine_balance = (reader.fine_balance + delta).max(Decimal::ZERO);
        Ok(reader.fine_balance)
    }

    async fn set_blocked(&mut self, reader_id: i32, blocked: bool) -> AppResult<()> {
        self.reader_mut(reader_id)?.blocked = blocked;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        let book = store.add_book("Rayuela", 2).await;

        let mut tx = store.begin().await.unwrap();
        tx.decrement_available_copies(book.id).await.unwrap();
        drop(tx);

        let state = store.snapshot().await;
        assert_eq!(state.books[&book.id].available_copies, 2);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let book = store.add_book("Rayuela", 2).await;

        let mut tx = store.begin().await.unwrap();
        tx.decrement_available_copies(book.id).await.unwrap();
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.books[&book.id].available_copies, 1);
    }

    #[tokio::test]
    async fn test_decrement_on_empty_shelf_conflicts() {
        let store = MemoryStore::new();
        let book = store.add_book("Ficciones", 1).await;

        let mut tx = store.begin().await.unwrap();
        tx.decrement_available_copies(book.id).await.unwrap();
        let err = tx.decrement_available_copies(book.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_increment_is_clamped_at_total() {
        let store = MemoryStore::new();
        let book = store.add_book("Aura", 1).await;

        let mut tx = store.begin().await.unwrap();
        tx.increment_available_copies(book.id).await.unwrap();
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.books[&book.id].available_copies, 1);
    }

    #[tokio::test]
    async fn test_fine_balance_never_negative() {
        let store = MemoryStore::new();
        let reader = store.add_reader("Luis", "Gómez", 3).await;

        let mut tx = store.begin().await.unwrap();
        let balance = tx
            .adjust_fine_balance(reader.id, Decimal::new(-500, 2))
            .await
            .unwrap();
        assert_eq!(balance, Decimal::ZERO);
    }
}
