//! Books repository for database operations

use sqlx::{Pool, Postgres};

use super::{bind_params, where_clause, Pagination, SqlParam};
use crate::{
    error::{unique_violation, AppError, AppResult},
    models::{
        author::AuthorShort,
        book::{Book, BookInput, BookQuery, BookShort},
    },
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID, with its authors
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let mut book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        book.authors = sqlx::query_as::<_, AuthorShort>(
            r#"
            SELECT a.id, a.firstname, a.lastname
            FROM authors a
            JOIN book_authors ba ON ba.author_id = a.id
            WHERE ba.book_id = $1
            ORDER BY a.lastname, a.firstname
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(book)
    }

    /// Search books with pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<BookShort>, i64)> {
        let pagination = Pagination::new(query.page, query.per_page);
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if !query.include_inactive.unwrap_or(false) {
            conditions.push("b.active".to_string());
        }
        if let Some(ref search) = query.search {
            params.push(SqlParam::Text(format!("%{}%", search.trim())));
            let n = params.len();
            conditions.push(format!("(b.title ILIKE ${n} OR b.isbn ILIKE ${n})"));
        }
        if let Some(category_id) = query.category_id {
            params.push(SqlParam::Int(category_id as i64));
            conditions.push(format!("b.category_id = ${}", params.len()));
        }
        if query.available_only.unwrap_or(false) {
            conditions.push("b.available_copies > 0".to_string());
        }

        let filter = where_clause(&conditions);

        let count_sql = format!("SELECT COUNT(*) FROM books b {}", filter);
        let total = bind_params!(sqlx::query_scalar::<_, i64>(&count_sql), &params)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            r#"
            SELECT b.id, b.isbn, b.title, c.name AS category_name,
                   b.total_copies, b.available_copies, b.active
            FROM books b
            LEFT JOIN categories c ON c.id = b.category_id
            {}
            ORDER BY b.title
            LIMIT {} OFFSET {}
            "#,
            filter,
            pagination.per_page,
            pagination.offset()
        );
        let books = bind_params!(sqlx::query_as::<_, BookShort>(&select_sql), &params)
            .fetch_all(&self.pool)
            .await?;

        Ok((books, total))
    }

    /// Check if an ISBN is already registered on another book
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::INT IS NULL OR id != $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a book; `input.isbn` must already be normalized
    pub async fn create(&self, input: &BookInput) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO books (
                isbn, title, subtitle, publication_year, publisher, pages, language,
                description, category_id, total_copies, available_copies, location
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&input.isbn)
        .bind(&input.title)
        .bind(&input.subtitle)
        .bind(input.publication_year)
        .bind(&input.publisher)
        .bind(input.pages)
        .bind(&input.language)
        .bind(&input.description)
        .bind(input.category_id)
        .bind(input.total_copies)
        .bind(&input.location)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "ISBN is already registered"))?;

        for author_id in &input.author_ids {
            sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Replace a book's fields and authors.
    ///
    /// `rebalance` maps (old total, old available) to the new available count
    /// and runs against the row locked inside the transaction.
    pub async fn update<F>(&self, id: i32, input: &BookInput, rebalance: F) -> AppResult<Book>
    where
        F: FnOnce(i32, i32) -> i32 + Send,
    {
        let mut tx = self.pool.begin().await?;

        let (old_total, old_available): (i32, i32) = sqlx::query_as(
            "SELECT total_copies, available_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let available = rebalance(old_total, old_available);

        sqlx::query(
            r#"
            UPDATE books SET
                isbn = $1, title = $2, subtitle = $3, publication_year = $4, publisher = $5,
                pages = $6, language = $7, description = $8, category_id = $9,
                total_copies = $10, available_copies = $11, location = $12
            WHERE id = $13
            "#,
        )
        .bind(&input.isbn)
        .bind(&input.title)
        .bind(&input.subtitle)
        .bind(input.publication_year)
        .bind(&input.publisher)
        .bind(input.pages)
        .bind(&input.language)
        .bind(&input.description)
        .bind(input.category_id)
        .bind(input.total_copies)
        .bind(available)
        .bind(&input.location)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "ISBN is already registered"))?;

        sqlx::query("DELETE FROM book_authors WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for author_id in &input.author_ids {
            sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Number of loans (any status) referencing a book
    pub async fn loan_history_count(&self, id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE book_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Withdraw a book from the catalog, keeping its loan history
    pub async fn deactivate(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE books SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    /// Delete a book that was never lent
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
