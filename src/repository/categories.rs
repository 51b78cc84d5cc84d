//! Categories repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{unique_violation, AppError, AppResult},
    models::category::{Category, CategoryInput},
};

const CATEGORY_SELECT: &str = r#"
    SELECT c.*,
           (SELECT COUNT(*) FROM books b WHERE b.category_id = c.id AND b.active) AS nb_books
    FROM categories c
"#;

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: Pool<Postgres>,
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List categories with their active book counts
    pub async fn list(&self, include_inactive: bool) -> AppResult<Vec<Category>> {
        let sql = format!(
            "{} WHERE c.active OR $1 ORDER BY c.name",
            CATEGORY_SELECT
        );
        let categories = sqlx::query_as::<_, Category>(&sql)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Category> {
        let sql = format!("{} WHERE c.id = $1", CATEGORY_SELECT);
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    /// True when the id names an active category
    pub async fn is_active(&self, id: i32) -> AppResult<bool> {
        let active: Option<bool> = sqlx::query_scalar("SELECT active FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(active.unwrap_or(false))
    }

    pub async fn create(&self, input: &CategoryInput) -> AppResult<Category> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "A category with this name already exists"))?;
        self.get_by_id(id).await
    }

    pub async fn update(&self, id: i32, input: &CategoryInput) -> AppResult<Category> {
        let result = sqlx::query("UPDATE categories SET name = $1, description = $2 WHERE id = $3")
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "A category with this name already exists"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category with id {} not found", id)));
        }
        self.get_by_id(id).await
    }

    pub async fn deactivate(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE categories SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category with id {} not found", id)));
        }
        Ok(())
    }
}
