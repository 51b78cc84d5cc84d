//! Catalog management service: books, authors and categories

use chrono::{Datelike, Utc};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorInput, AuthorQuery},
        book::{normalize_isbn, rebalance_available, Book, BookInput, BookQuery, BookShort},
        category::{Category, CategoryInput},
    },
    repository::Repository,
};

/// Outcome of a book deletion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookRemoval {
    Deleted,
    /// The book has loan history and was withdrawn instead
    Withdrawn,
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    // Books

    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<BookShort>, i64)> {
        self.repository.books.search(query).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn create_book(&self, mut input: BookInput) -> AppResult<Book> {
        self.check_book(&mut input, None).await?;
        let book = self.repository.books.create(&input).await?;
        tracing::info!(book_id = book.id, title = %book.title, "Book created");
        Ok(book)
    }

    /// Replace a book; copies on loan are kept out of the new available count
    pub async fn update_book(&self, id: i32, mut input: BookInput) -> AppResult<Book> {
        self.check_book(&mut input, Some(id)).await?;
        let new_total = input.total_copies;
        self.repository
            .books
            .update(id, &input, |old_total, old_available| {
                rebalance_available(old_total, old_available, new_total)
            })
            .await
    }

    /// Delete a book, or withdraw it when it has been lent before
    pub async fn delete_book(&self, id: i32) -> AppResult<BookRemoval> {
        self.repository.books.get_by_id(id).await?;

        let open = self.repository.loans.count_open_for_book(id).await?;
        if open > 0 {
            return Err(AppError::BusinessRule(format!(
                "Book has {} active loan(s) and cannot be deleted",
                open
            )));
        }

        if self.repository.books.loan_history_count(id).await? > 0 {
            self.repository.books.deactivate(id).await?;
            tracing::info!(book_id = id, "Book withdrawn from catalog");
            Ok(BookRemoval::Withdrawn)
        } else {
            self.repository.books.delete(id).await?;
            tracing::info!(book_id = id, "Book deleted");
            Ok(BookRemoval::Deleted)
        }
    }

    async fn check_book(&self, input: &mut BookInput, id: Option<i32>) -> AppResult<()> {
        input.validate()?;
        check_publication_year(input.publication_year, Utc::now().year())?;

        input.isbn = input
            .isbn
            .as_deref()
            .map(normalize_isbn)
            .filter(|isbn| !isbn.is_empty());
        if let Some(ref isbn) = input.isbn {
            if self.repository.books.isbn_exists(isbn, id).await? {
                return Err(AppError::Conflict(format!("ISBN {} is already registered", isbn)));
            }
        }

        if let Some(category_id) = input.category_id {
            if !self.repository.categories.is_active(category_id).await? {
                return Err(AppError::Validation(format!(
                    "Category {} does not exist",
                    category_id
                )));
            }
        }

        input.author_ids.sort_unstable();
        input.author_ids.dedup();
        if !input.author_ids.is_empty() {
            let found = self.repository.authors.count_active(&input.author_ids).await?;
            if found != input.author_ids.len() as i64 {
                return Err(AppError::Validation("Unknown author in author_ids".to_string()));
            }
        }
        Ok(())
    }

    // Authors

    pub async fn search_authors(&self, query: &AuthorQuery) -> AppResult<(Vec<Author>, i64)> {
        self.repository.authors.search(query).await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    pub async fn create_author(&self, input: AuthorInput) -> AppResult<Author> {
        input.validate()?;
        self.repository.authors.create(&input).await
    }

    pub async fn update_author(&self, id: i32, input: AuthorInput) -> AppResult<Author> {
        input.validate()?;
        self.repository.authors.update(id, &input).await
    }

    /// Soft delete, refused while one of the author's books is on loan
    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.authors.get_by_id(id).await?;
        let open = self.repository.loans.count_open_for_author(id).await?;
        if open > 0 {
            return Err(AppError::BusinessRule(format!(
                "Books by this author have {} active loan(s)",
                open
            )));
        }
        self.repository.authors.deactivate(id).await
    }

    // Categories

    pub async fn list_categories(&self, include_inactive: bool) -> AppResult<Vec<Category>> {
        self.repository.categories.list(include_inactive).await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    pub async fn create_category(&self, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;
        self.repository.categories.create(&input).await
    }

    pub async fn update_category(&self, id: i32, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;
        self.repository.categories.update(id, &input).await
    }

    /// Soft delete, refused while active books are filed under the category
    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        let category = self.repository.categories.get_by_id(id).await?;
        if category.nb_books > 0 {
            return Err(AppError::BusinessRule(format!(
                "Category still has {} book(s)",
                category.nb_books
            )));
        }
        self.repository.categories.deactivate(id).await
    }
}

/// Publication years run from 1000 to next year
fn check_publication_year(year: Option<i32>, current_year: i32) -> AppResult<()> {
    match year {
        Some(y) if !(1000..=current_year + 1).contains(&y) => Err(AppError::Validation(format!(
            "Publication year must be between 1000 and {}",
            current_year + 1
        ))),
        _ => Ok(()),
    }
}
