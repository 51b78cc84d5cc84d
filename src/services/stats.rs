//! Statistics service

use std::sync::Arc;

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Serialize;
use utoipa::ToSchema;

use super::clock::Clock;
use crate::{
    error::AppResult,
    repository::{Repository, SqlParam, Table},
};

/// Dashboard counters
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub active_books: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub readers: i64,
    pub blocked_readers: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
    pub returns_today: i64,
    /// Sum of all reader fine balances
    #[schema(value_type = String)]
    pub outstanding_fines: Decimal,
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl StatsService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let repo = &self.repository;
        let today = self.clock.today();

        Ok(DashboardStats {
            active_books: repo.count(Table::Books, "active", &[]).await?,
            total_copies: to_count(repo.sum(Table::Books, "total_copies", "active", &[]).await?),
            available_copies: to_count(
                repo.sum(Table::Books, "available_copies", "active", &[]).await?,
            ),
            readers: repo.count(Table::Readers, "", &[]).await?,
            blocked_readers: repo.count(Table::Readers, "blocked", &[]).await?,
            active_loans: repo
                .count(Table::Loans, "status = $1", &[SqlParam::Text("active".into())])
                .await?,
            overdue_loans: repo
                .count(Table::Loans, "status = $1", &[SqlParam::Text("overdue".into())])
                .await?,
            returns_today: repo
                .count(Table::Returns, "return_date = $1", &[SqlParam::Date(today)])
                .await?,
            outstanding_fines: repo.sum(Table::Readers, "fine_balance", "", &[]).await?,
        })
    }
}

fn to_count(value: Decimal) -> i64 {
    value.to_i64().unwrap_or_default()
}
