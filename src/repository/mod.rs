//! Repository layer for database operations

pub mod authors;
pub mod books;
pub mod categories;
pub mod circulation;
pub mod loans;
#[cfg(test)]
pub mod memory;
pub mod readers;

use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::error::AppResult;

pub use circulation::{CirculationStore, CirculationTx};

/// Bind a slice of [`SqlParam`] onto any sqlx query builder, in order
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                $crate::repository::SqlParam::Int(v) => query.bind(*v),
                $crate::repository::SqlParam::Text(v) => query.bind(v.clone()),
                $crate::repository::SqlParam::Date(v) => query.bind(*v),
                $crate::repository::SqlParam::Bool(v) => query.bind(*v),
            };
        }
        query
    }};
}
pub(crate) use bind_params;

/// Positional query parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
    Date(NaiveDate),
    Bool(bool),
}

/// Tables reachable through [`Repository::count`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Books,
    Authors,
    Categories,
    Readers,
    Loans,
    Returns,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Books => "books",
            Table::Authors => "authors",
            Table::Categories => "categories",
            Table::Readers => "readers",
            Table::Loans => "loans",
            Table::Returns => "returns",
        }
    }
}

/// Page window for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub const DEFAULT_PER_PAGE: i64 = 10;
    pub const MIN_PER_PAGE: i64 = 5;
    pub const MAX_PER_PAGE: i64 = 50;
    /// Keeps `offset()` within `i64`
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_PER_PAGE;

    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, Self::MAX_PAGE),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(Self::MIN_PER_PAGE, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

/// Join conditions into a WHERE clause (empty when there are none)
pub(crate) fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub authors: authors::AuthorsRepository,
    pub categories: categories::CategoriesRepository,
    pub readers: readers::ReadersRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            authors: authors::AuthorsRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            readers: readers::ReadersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }

    /// Count rows of `table` matching `filter` (a SQL condition using `$n` placeholders)
    pub async fn count(&self, table: Table, filter: &str, params: &[SqlParam]) -> AppResult<i64> {
        let sql = if filter.trim().is_empty() {
            format!("SELECT COUNT(*) FROM {}", table.as_str())
        } else {
            format!("SELECT COUNT(*) FROM {} WHERE {}", table.as_str(), filter)
        };
        let query = bind_params!(sqlx::query_scalar::<_, i64>(&sql), params);
        Ok(query.fetch_one(&self.pool).await?)
    }

    /// Sum a numeric column of `table` matching `filter`
    pub async fn sum(
        &self,
        table: Table,
        column: &'static str,
        filter: &str,
        params: &[SqlParam],
    ) -> AppResult<rust_decimal::Decimal> {
        let sql = if filter.trim().is_empty() {
            format!("SELECT COALESCE(SUM({}), 0)::NUMERIC FROM {}", column, table.as_str())
        } else {
            format!(
                "SELECT COALESCE(SUM({}), 0)::NUMERIC FROM {} WHERE {}",
                column,
                table.as_str(),
                filter
            )
        };
        let query = bind_params!(sqlx::query_scalar::<_, rust_decimal::Decimal>(&sql), params);
        Ok(query.fetch_one(&self.pool).await?)
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
