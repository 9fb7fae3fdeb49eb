mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;
mod static_files;
mod storage;
mod ui;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::storage::{BlobStore, ChunkedBlobStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub storage: Arc<dyn BlobStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "udm=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting udm...");

    // Load configuration
    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.url, config.database.max_connections).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    let storage: Arc<dyn BlobStore> =
        Arc::new(ChunkedBlobStore::new(db.clone(), config.storage.chunk_size));
    tracing::info!(
        "Blob store ready ({}, chunk size {} bytes)",
        storage.storage_type(),
        storage.chunk_size()
    );

    let state = AppState {
        db,
        config: config.clone(),
        storage,
    };

    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Users
        .route(
            "/users",
            get(handlers::user::list_users).post(handlers::user::create_user),
        )
        .route(
            "/users/by-name/:user_name",
            get(handlers::user::get_user_by_name),
        )
        .route(
            "/users/:id",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        // Files
        .route(
            "/files",
            get(handlers::file::list_files).post(handlers::file::upload_file),
        )
        .route("/files/page", get(handlers::file::query_files))
        .route(
            "/files/:id",
            get(handlers::file::get_file_info)
                .put(handlers::file::update_file)
                .delete(handlers::file::delete_file),
        )
        .route("/files/:id/download", get(handlers::file::download_file))
        // Dashboard
        .route("/nav", get(handlers::nav::get_nav))
        .route("/nav/routes", get(handlers::nav::get_routes));

    Router::new()
        .nest("/api/v1", api_routes)
        .fallback_service(static_files::spa_service(&state.config.ui.dist_path))
        .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
