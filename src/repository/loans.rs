//! Loans repository: PostgreSQL implementation of the circulation store

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, Transaction};

use super::{bind_params, where_clause, CirculationStore, CirculationTx, Pagination, SqlParam};
use crate::{
    error::{unique_violation, AppError, AppResult},
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

const LOAN_DETAILS_SELECT: &str = r#"
    SELECT l.id, l.book_id, b.title AS book_title, b.isbn,
           l.reader_id, r.firstname || ' ' || r.lastname AS reader_name,
           l.loan_date, l.due_date, l.return_date, l.status
    FROM loans l
    JOIN books b ON b.id = l.book_id
    JOIN readers r ON r.id = l.reader_id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Open loans referencing a book
    pub async fn count_open_for_book(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status IN ('active', 'overdue')",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Open loans on any book written by an author
    pub async fn count_open_for_author(&self, author_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM loans l
            JOIN book_authors ba ON ba.book_id = l.book_id
            WHERE ba.author_id = $1 AND l.status IN ('active', 'overdue')
            "#,
        )
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl CirculationStore for LoansRepository {
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCirculationTx { tx }))
    }

    async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE loans SET status = $1 WHERE status = $2 AND due_date < $3",
        )
        .bind(LoanStatus::Overdue)
        .bind(LoanStatus::Active)
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_loans(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        let pagination = Pagination::new(query.page, query.per_page);
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(status) = query.status {
            params.push(SqlParam::Text(status.as_str().to_string()));
            conditions.push(format!("l.status = ${}", params.len()));
        }
        if let Some(reader_id) = query.reader_id {
            params.push(SqlParam::Int(reader_id as i64));
            conditions.push(format!("l.reader_id = ${}", params.len()));
        }
        if let Some(book_id) = query.book_id {
            params.push(SqlParam::Int(book_id as i64));
            conditions.push(format!("l.book_id = ${}", params.len()));
        }
        if let Some(ref search) = query.search {
            params.push(SqlParam::Text(format!("%{}%", search.trim())));
            let n = params.len();
            conditions.push(format!(
                "(b.title ILIKE ${n} OR b.isbn ILIKE ${n} OR r.firstname ILIKE ${n} \
                 OR r.lastname ILIKE ${n} OR r.document_id ILIKE ${n})"
            ));
        }

        let filter = where_clause(&conditions);

        let count_sql = format!(
            r#"
            SELECT COUNT(*) FROM loans l
            JOIN books b ON b.id = l.book_id
            JOIN readers r ON r.id = l.reader_id
            {}
            "#,
            filter
        );
        let total = bind_params!(sqlx::query_scalar::<_, i64>(&count_sql), &params)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            "{} {} ORDER BY l.loan_date DESC, l.id DESC LIMIT {} OFFSET {}",
            LOAN_DETAILS_SELECT,
            filter,
            pagination.per_page,
            pagination.offset()
        );
        let loans = bind_params!(sqlx::query_as::<_, LoanDetails>(&select_sql), &params)
            .fetch_all(&self.pool)
            .await?;

        Ok((loans, total))
    }

    async fn loan_details(&self, loan_id: i32) -> AppResult<Option<LoanDetails>> {
        let sql = format!("{} WHERE l.id = $1", LOAN_DETAILS_SELECT);
        let loan = sqlx::query_as::<_, LoanDetails>(&sql)
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(loan)
    }

    async fn open_loans_for_reader(&self, reader_id: i32) -> AppResult<Vec<LoanDetails>> {
        let sql = format!(
            "{} WHERE l.reader_id = $1 AND l.status IN ('active', 'overdue') ORDER BY l.due_date, l.id",
            LOAN_DETAILS_SELECT
        );
        let loans = sqlx::query_as::<_, LoanDetails>(&sql)
            .bind(reader_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    async fn return_for_loan(&self, loan_id: i32) -> AppResult<Option<LoanReturn>> {
        let record = sqlx::query_as::<_, LoanReturn>("SELECT * FROM returns WHERE loan_id = $1")
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_returns(&self, query: &ReturnQuery) -> AppResult<(Vec<ReturnDetails>, i64)> {
        let pagination = Pagination::new(query.page, query.per_page);
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        match query.fine {
            Some(FineFilter::WithFine) => conditions.push("d.fine > 0".to_string()),
            Some(FineFilter::WithoutFine) => conditions.push("d.fine = 0".to_string()),
            None => {}
        }
        if let Some(reader_id) = query.reader_id {
            params.push(SqlParam::Int(reader_id as i64));
            conditions.push(format!("l.reader_id = ${}", params.len()));
        }

        let filter = where_clause(&conditions);

        let count_sql = format!(
            "SELECT COUNT(*) FROM returns d JOIN loans l ON l.id = d.loan_id {}",
            filter
        );
        let total = bind_params!(sqlx::query_scalar::<_, i64>(&count_sql), &params)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            r#"
            SELECT d.id, d.loan_id, b.title AS book_title,
                   l.reader_id, r.firstname || ' ' || r.lastname AS reader_name,
                   l.loan_date, l.due_date, d.return_date, d.overdue_days,
                   d.fine, d.fine_paid, d.notes
            FROM returns d
            JOIN loans l ON l.id = d.loan_id
            JOIN books b ON b.id = l.book_id
            JOIN readers r ON r.id = l.reader_id
            {}
            ORDER BY d.return_date DESC, d.id DESC
            LIMIT {} OFFSET {}
            "#,
            filter,
            pagination.per_page,
            pagination.offset()
        );
        let returns = bind_params!(sqlx::query_as::<_, ReturnDetails>(&select_sql), &params)
            .fetch_all(&self.pool)
            .await?;

        Ok((returns, total))
    }
}

/// One circulation operation inside a PostgreSQL transaction
pub struct PgCirculationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CirculationTx for PgCirculationTx {
    async fn reader_for_update(&mut self, reader_id: i32) -> AppResult<Option<Reader>> {
        let reader = sqlx::query_as::<_, Reader>("SELECT * FROM readers WHERE id = $1 FOR UPDATE")
            .bind(reader_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(reader)
    }

    async fn book(&mut self, book_id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(book_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn count_active_loans(&mut self, reader_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE reader_id = $1 AND status IN ('active', 'overdue')",
        )
        .bind(reader_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn has_duplicate_loan(
        &mut self,
        reader_id: i32,
        book_id: i32,
        loan_date: NaiveDate,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE reader_id = $1 AND book_id = $2 AND loan_date = $3
                  AND status IN ('active', 'overdue')
            )
            "#,
        )
        .bind(reader_id)
        .bind(book_id)
        .bind(loan_date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn decrement_available_copies(&mut self, book_id: i32) -> AppResult<()> {
        // Conditional update: the availability check and the write are one statement
        let result = sqlx::query(
            "UPDATE books SET available_copies = available_copies - 1 WHERE id = $1 AND available_copies > 0",
        )
        .bind(book_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Book {} has no copy left to lend, please retry",
                book_id
            )));
        }
        Ok(())
    }

    async fn increment_available_copies(&mut self, book_id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE books SET available_copies = available_copies + 1 WHERE id = $1 AND available_copies < total_copies",
        )
        .bind(book_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                .bind(book_id)
                .fetch_one(&mut *self.tx)
                .await?;
            if !exists {
                return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
            }
            tracing::warn!(book_id, "Available copies already at total, increment clamped");
        }
        Ok(())
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, reader_id, loan_date, due_date, status, issued_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.reader_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(LoanStatus::Active)
        .bind(loan.issued_by)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn loan_for_update(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(loan)
    }

    async fn close_loan(&mut self, loan_id: i32, return_date: NaiveDate) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            "UPDATE loans SET status = $1, return_date = $2 WHERE id = $3 RETURNING *",
        )
        .bind(LoanStatus::Returned)
        .bind(return_date)
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    async fn insert_return(&mut self, record: &NewReturn) -> AppResult<LoanReturn> {
        sqlx::query_as::<_, LoanReturn>(
            r#"
            INSERT INTO returns (loan_id, return_date, overdue_days, fine, notes, recorded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(record.loan_id)
        .bind(record.return_date)
        .bind(record.overdue_days)
        .bind(record.fine)
        .bind(&record.notes)
        .bind(record.recorded_by)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, format!("Loan {} already has a return", record.loan_id)))
    }

    async fn return_for_update(&mut self, return_id: i32) -> AppResult<Option<LoanReturn>> {
        let record = sqlx::query_as::<_, LoanReturn>("SELECT * FROM returns WHERE id = $1 FOR UPDATE")
            .bind(return_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(record)
    }

    async fn mark_fine_paid(&mut self, return_id: i32) -> AppResult<LoanReturn> {
        sqlx::query_as::<_, LoanReturn>(
            "UPDATE returns SET fine_paid = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(return_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Return with id {} not found", return_id)))
    }

    async fn adjust_fine_balance(&mut self, reader_id: i32, delta: Decimal) -> AppResult<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            "UPDATE readers SET fine_balance = GREATEST(fine_balance + $1, 0) WHERE id = $2 RETURNING fine_balance",
        )
        .bind(delta)
        .bind(reader_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reader with id {} not found", reader_id)))
    }

    async fn set_blocked(&mut self, reader_id: i32, blocked: bool) -> AppResult<()> {
        sqlx::query("UPDATE readers SET blocked = $1 WHERE id = $2")
            .bind(blocked)
            .bind(reader_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
