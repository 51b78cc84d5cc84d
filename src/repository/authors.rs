//! Authors repository for database operations

use sqlx::{Pool, Postgres};

use super::{bind_params, where_clause, Pagination, SqlParam};
use crate::{
    error::{AppError, AppResult},
    models::author::{Author, AuthorInput, AuthorQuery},
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Search authors by name with pagination
    pub async fn search(&self, query: &AuthorQuery) -> AppResult<(Vec<Author>, i64)> {
        let pagination = Pagination::new(query.page, query.per_page);
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if !query.include_inactive.unwrap_or(false) {
            conditions.push("active".to_string());
        }
        if let Some(ref name) = query.name {
            params.push(SqlParam::Text(format!("%{}%", name.trim())));
            let n = params.len();
            conditions.push(format!(
                "(firstname ILIKE ${n} OR lastname ILIKE ${n} OR CONCAT(firstname, ' ', lastname) ILIKE ${n})"
            ));
        }
        let filter = where_clause(&conditions);

        let count_sql = format!("SELECT COUNT(*) FROM authors {}", filter);
        let total = bind_params!(sqlx::query_scalar::<_, i64>(&count_sql), &params)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            "SELECT * FROM authors {} ORDER BY lastname, firstname LIMIT {} OFFSET {}",
            filter,
            pagination.per_page,
            pagination.offset()
        );
        let authors = bind_params!(sqlx::query_as::<_, Author>(&select_sql), &params)
            .fetch_all(&self.pool)
            .await?;

        Ok((authors, total))
    }

    /// Number of the given ids that name an active author
    pub async fn count_active(&self, ids: &[i32]) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM authors WHERE active AND id = ANY($1)")
                .bind(ids)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn create(&self, input: &AuthorInput) -> AppResult<Author> {
        let author = sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (firstname, lastname, nationality, birth_date, biography)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.firstname.trim())
        .bind(input.lastname.trim())
        .bind(&input.nationality)
        .bind(input.birth_date)
        .bind(&input.biography)
        .fetch_one(&self.pool)
        .await?;
        Ok(author)
    }

    pub async fn update(&self, id: i32, input: &AuthorInput) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors SET
                firstname = $1, lastname = $2, nationality = $3, birth_date = $4, biography = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(input.firstname.trim())
        .bind(input.lastname.trim())
        .bind(&input.nationality)
        .bind(input.birth_date)
        .bind(&input.biography)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Soft delete: flag inactive and detach from every book
    pub async fn deactivate(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE authors SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author with id {} not found", id)));
        }

        sqlx::query("DELETE FROM book_authors WHERE author_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
