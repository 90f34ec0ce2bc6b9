//! Quiz Bank Backend
//!
//! Persistence service for the quiz generator: a remote libSQL database when one is
//! configured and reachable, a local SQLite key-space otherwise.

mod api;
mod auth;
mod backend;
mod config;
mod connection;
mod db;
mod errors;
mod models;
mod provision;
mod remote;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use backend::LocalBackend;
use config::Config;
use connection::{ConnectionManager, ConnectionOptions};
use db::{ConfigStore, KeySpace, Repository};
use remote::HttpClientFactory;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub connection: Arc<ConnectionManager>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quiz Bank Backend");
    tracing::info!("Local store path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (QUIZBANK_API_PSK). Authentication is disabled!");
    }
    if config.uses_default_seed_passwords() {
        tracing::warn!(
            "Bootstrap accounts use built-in passwords. Set QUIZBANK_SEED_ADMIN_PASSWORD and QUIZBANK_SEED_TEACHER_PASSWORD."
        );
    }
    if let Some(remote) = &config.remote {
        tracing::info!("Remote endpoint from environment: {}", remote.endpoint);
    }

    // Initialize local key-space
    let pool = db::init_database(&config.db_path).await?;
    let keys = KeySpace::new(pool);

    let connection = Arc::new(ConnectionManager::new(
        Arc::new(LocalBackend::new(keys.clone())),
        ConfigStore::new(keys),
        Arc::new(HttpClientFactory::new(config.remote_timeout)),
        ConnectionOptions {
            env_config: config.remote.clone(),
            probe_timeout: config.remote_timeout,
            seeds: config.seed_accounts(),
        },
    ));

    // Lives for the whole process.
    let _status_log = connection.subscribe(|status| {
        tracing::info!("Serving records from {} backend", status);
    });

    connection.init().await;

    let state = AppState {
        repo: Arc::new(Repository::new(connection.clone())),
        connection,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();
    let connection = state.connection.clone();

    // API routes
    let api_routes = Router::new()
        // Connection
        .route("/connection", get(api::get_connection))
        .route("/connection", put(api::update_connection))
        .route("/connection", delete(api::clear_connection))
        .route("/connection/test", post(api::test_connection))
        // Accounts
        .route("/auth/login", post(api::login))
        .route("/users", get(api::list_users))
        .route("/users", post(api::create_user))
        .route("/users/{id}", delete(api::delete_user))
        .route("/users/{id}/credits", put(api::update_user_credits))
        .route("/users/{id}/active", put(api::toggle_user_status))
        // Quizzes
        .route("/quizzes", get(api::list_quizzes))
        .route("/quizzes", post(api::save_quiz))
        .route("/quizzes/{id}", delete(api::delete_quiz))
        .route("/quizzes/{id}/visibility", put(api::toggle_quiz_visibility))
        // Logs
        .route("/logs", get(api::list_logs))
        .route("/logs", post(api::create_log))
        .route("/logs", delete(api::clear_logs))
        .route("/logs/{id}", delete(api::delete_log))
        // Settings
        .route("/settings", get(api::get_settings))
        .route("/settings", put(api::save_settings))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), connection.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
