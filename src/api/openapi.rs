//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{authors, books, categories, fines, health, loans, readers, returns, stats};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Biblio API",
        version = "1.0.0",
        description = "Library circulation REST API: catalog, readers, loans, returns and fines"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Readers
        readers::list_readers,
        readers::get_reader,
        readers::create_reader,
        readers::update_reader,
        readers::delete_reader,
        readers::get_reader_loans,
        readers::block_reader,
        readers::unblock_reader,
        // Loans
        loans::issue_loan,
        loans::list_loans,
        loans::get_loan,
        loans::return_loan,
        loans::refresh_overdue,
        // Returns
        returns::list_returns,
        returns::pay_fine,
        // Fines
        fines::compute_fine,
        // Stats
        stats::get_stats,
    ),
    components(
        schemas(
            // Catalog
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookInput,
            crate::models::author::Author,
            crate::models::author::AuthorShort,
            crate::models::author::AuthorInput,
            crate::models::category::Category,
            crate::models::category::CategoryInput,
            // Readers
            crate::models::reader::Reader,
            crate::models::reader::ReaderShort,
            crate::models::reader::ReaderInput,
            crate::models::reader::ReaderState,
            // Loans
            crate::models::enums::LoanStatus,
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::IssueLoan,
            crate::models::loan::ReturnLoan,
            crate::models::loan::LoanReturn,
            crate::models::loan::ReturnOutcome,
            crate::models::loan::ReturnDetails,
            crate::models::loan::FinePayment,
            crate::models::loan::FineFilter,
            crate::models::loan::LoanWithReturn,
            loans::OverdueRefreshResponse,
            // Fines
            fines::FineResponse,
            // Stats
            crate::services::stats::DashboardStats,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "authors", description = "Authors"),
        (name = "categories", description = "Categories"),
        (name = "readers", description = "Reader registry"),
        (name = "loans", description = "Loan issuance and returns"),
        (name = "returns", description = "Return records and fine payment"),
        (name = "fines", description = "Fine calculator"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

/// Declares the `bearer_auth` scheme referenced by the endpoints
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
