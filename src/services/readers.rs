//! Reader registry service

use validator::Validate;

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::reader::{Reader, ReaderInput, ReaderQuery, ReaderShort},
    repository::Repository,
};

#[derive(Clone)]
pub struct ReadersService {
    repository: Repository,
    policy: CirculationConfig,
}

impl ReadersService {
    pub fn new(repository: Repository, policy: CirculationConfig) -> Self {
        Self { repository, policy }
    }

    pub async fn search(&self, query: &ReaderQuery) -> AppResult<(Vec<ReaderShort>, i64)> {
        self.repository.readers.search(query).await
    }

    pub async fn get(&self, id: i32) -> AppResult<Reader> {
        self.repository.readers.get_by_id(id).await
    }

    pub async fn create(&self, input: ReaderInput) -> AppResult<Reader> {
        input.validate()?;
        let loan_limit = resolve_loan_limit(input.loan_limit, &self.policy)?;
        if self
            .repository
            .readers
            .document_exists(input.document_id.trim(), None)
            .await?
        {
            return Err(AppError::Conflict("Document id is already registered".to_string()));
        }
        let reader = self.repository.readers.create(&input, loan_limit).await?;
        tracing::info!(reader_id = reader.id, "Reader registered");
        Ok(reader)
    }

    pub async fn update(&self, id: i32, input: ReaderInput) -> AppResult<Reader> {
        input.validate()?;
        let loan_limit = resolve_loan_limit(input.loan_limit, &self.policy)?;
        if self
            .repository
            .readers
            .document_exists(input.document_id.trim(), Some(id))
            .await?
        {
            return Err(AppError::Conflict("Document id is already registered".to_string()));
        }
        self.repository.readers.update(id, &input, loan_limit).await
    }

    /// Delete a reader with no open loans and no unpaid fines
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.readers.delete(id).await?;
        tracing::info!(reader_id = id, "Reader deleted");
        Ok(())
    }

    pub async fn set_blocked(&self, id: i32, blocked: bool) -> AppResult<Reader> {
        let reader = self.repository.readers.set_blocked(id, blocked).await?;
        tracing::info!(reader_id = id, blocked, "Reader block state changed");
        Ok(reader)
    }
}

/// Loan limit from the request, or the configured default
fn resolve_loan_limit(requested: Option<i32>, policy: &CirculationConfig) -> AppResult<i32> {
    let limit = requested.unwrap_or(policy.default_loan_limit);
    if !(1..=policy.max_loan_limit).contains(&limit) {
        return Err(AppError::Validation(format!(
            "Loan limit must be between 1 and {}",
            policy.max_loan_limit
        )));
    }
    Ok(limit)
}
