//! Biblio Server - library circulation REST API

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anyhow::Context;
use biblio_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::{clock::SystemClock, loans::LoansService, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting Biblio Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    let repository = Repository::new(pool);
    let services = Services::new(
        repository.clone(),
        config.circulation.clone(),
        Arc::new(repository.loans.clone()),
        Arc::new(SystemClock),
    );

    services
        .loans
        .recompute_overdue_statuses()
        .await
        .context("Initial overdue sweep failed")?;
    spawn_overdue_sweep(services.loans.clone(), config.circulation.overdue_sweep_minutes);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        repository,
    };

    let app = create_router(state);

    let addr = SocketAddr::new(
        server_host.parse().context("Invalid host address")?,
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("biblio_server={},tower_http=debug", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Periodically move loans past their due date to overdue
fn spawn_overdue_sweep(loans: LoansService, minutes: u64) {
    if minutes == 0 {
        tracing::info!("Background overdue sweep disabled");
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(minutes * 60));
        // the first tick completes immediately and startup already swept
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = loans.recompute_overdue_statuses().await {
                tracing::warn!("Overdue sweep failed: {}", e);
            }
        }
    });
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Books
        .route("/books", get(api::books::list_books).post(api::books::create_book))
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        // Authors
        .route("/authors", get(api::authors::list_authors).post(api::authors::create_author))
        .route(
            "/authors/:id",
            get(api::authors::get_author)
                .put(api::authors::update_author)
                .delete(api::authors::delete_author),
        )
        // Categories
        .route(
            "/categories",
            get(api::categories::list_categories).post(api::categories::create_category),
        )
        .route(
            "/categories/:id",
            get(api::categories::get_category)
                .put(api::categories::update_category)
                .delete(api::categories::delete_category),
        )
        // Readers
        .route("/readers", get(api::readers::list_readers).post(api::readers::create_reader))
        .route(
            "/readers/:id",
            get(api::readers::get_reader)
                .put(api::readers::update_reader)
                .delete(api::readers::delete_reader),
        )
        .route("/readers/:id/loans", get(api::readers::get_reader_loans))
        .route("/readers/:id/block", post(api::readers::block_reader))
        .route("/readers/:id/unblock", post(api::readers::unblock_reader))
        // Loans
        .route("/loans", get(api::loans::list_loans).post(api::loans::issue_loan))
        .route("/loans/overdue/refresh", post(api::loans::refresh_overdue))
        .route("/loans/:id", get(api::loans::get_loan))
        .route("/loans/:id/return", post(api::loans::return_loan))
        // Returns and fines
        .route("/returns", get(api::returns::list_returns))
        .route("/returns/:id/pay", post(api::returns::pay_fine))
        .route("/fines/compute", get(api::fines::compute_fine))
        // Statistics
        .route("/stats", get(api::stats::get_stats))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
