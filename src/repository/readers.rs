//! Readers repository for database operations

use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use super::{bind_params, where_clause, Pagination, SqlParam};
use crate::{
    error::{unique_violation, AppError, AppResult},
    models::reader::{Reader, ReaderInput, ReaderQuery, ReaderShort, ReaderState},
};

#[derive(Clone)]
pub struct ReadersRepository {
    pool: Pool<Postgres>,
}

impl ReadersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Reader> {
        sqlx::query_as::<_, Reader>("SELECT * FROM readers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reader with id {} not found", id)))
    }

    /// Search readers with their open loan counts
    pub async fn search(&self, query: &ReaderQuery) -> AppResult<(Vec<ReaderShort>, i64)> {
        let pagination = Pagination::new(query.page, query.per_page);
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(ref search) = query.search {
            params.push(SqlParam::Text(format!("%{}%", search.trim())));
            let n = params.len();
            conditions.push(format!(
                "(r.firstname ILIKE ${n} OR r.lastname ILIKE ${n} OR r.document_id ILIKE ${n})"
            ));
        }
        match query.state {
            Some(ReaderState::Blocked) => conditions.push("r.blocked".to_string()),
            Some(ReaderState::Active) => conditions.push("NOT r.blocked".to_string()),
            None => {}
        }
        let filter = where_clause(&conditions);

        let count_sql = format!("SELECT COUNT(*) FROM readers r {}", filter);
        let total = bind_params!(sqlx::query_scalar::<_, i64>(&count_sql), &params)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            r#"
            SELECT r.id, r.firstname, r.lastname, r.document_id, r.loan_limit,
                   r.fine_balance, r.blocked,
                   (SELECT COUNT(*) FROM loans l
                    WHERE l.reader_id = r.id AND l.status IN ('active', 'overdue')) AS nb_loans
            FROM readers r
            {}
            ORDER BY r.lastname, r.firstname
            LIMIT {} OFFSET {}
            "#,
            filter,
            pagination.per_page,
            pagination.offset()
        );
        let readers = bind_params!(sqlx::query_as::<_, ReaderShort>(&select_sql), &params)
            .fetch_all(&self.pool)
            .await?;

        Ok((readers, total))
    }

    /// Check if a document id is already registered on another reader
    pub async fn document_exists(&self, document_id: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM readers WHERE document_id = $1 AND ($2::INT IS NULL OR id != $2))",
        )
        .bind(document_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(&self, input: &ReaderInput, loan_limit: i32) -> AppResult<Reader> {
        sqlx::query_as::<_, Reader>(
            r#"
            INSERT INTO readers (firstname, lastname, document_id, phone, address, birth_date, loan_limit)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(input.firstname.trim())
        .bind(input.lastname.trim())
        .bind(input.document_id.trim())
        .bind(&input.phone)
        .bind(&input.address)
        .bind(input.birth_date)
        .bind(loan_limit)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Document id is already registered"))
    }

    pub async fn update(&self, id: i32, input: &ReaderInput, loan_limit: i32) -> AppResult<Reader> {
        sqlx::query_as::<_, Reader>(
            r#"
            UPDATE readers SET
                firstname = $1, lastname = $2, document_id = $3, phone = $4,
                address = $5, birth_date = $6, loan_limit = $7
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(input.firstname.trim())
        .bind(input.lastname.trim())
        .bind(input.document_id.trim())
        .bind(&input.phone)
        .bind(&input.address)
        .bind(input.birth_date)
        .bind(loan_limit)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Document id is already registered"))?
        .ok_or_else(|| AppError::NotFound(format!("Reader with id {} not found", id)))
    }

    pub async fn set_blocked(&self, id: i32, blocked: bool) -> AppResult<Reader> {
        sqlx::query_as::<_, Reader>("UPDATE readers SET blocked = $1 WHERE id = $2 RETURNING *")
            .bind(blocked)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reader with id {} not found", id)))
    }

    /// Delete a reader together with their closed loan history.
    ///
    /// The reader row is locked first, as loan issuance does, so no loan can
    /// be issued between the checks and the delete.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let reader = sqlx::query_as::<_, Reader>("SELECT * FROM readers WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reader with id {} not found", id)))?;

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE reader_id = $1 AND status IN ('active', 'overdue')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if open > 0 {
            return Err(AppError::BusinessRule(format!(
                "Reader has {} active loan(s) and cannot be deleted",
                open
            )));
        }
        if reader.fine_balance > Decimal::ZERO {
            return Err(AppError::UnpaidFines(format!(
                "Reader has {} in unpaid fines",
                reader.fine_balance
            )));
        }

        sqlx::query(
            r#"
            DELETE FROM returns
            WHERE loan_id IN (SELECT id FROM loans WHERE reader_id = $1 AND status = 'returned')
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM loans WHERE reader_id = $1 AND status = 'returned'")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM readers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
