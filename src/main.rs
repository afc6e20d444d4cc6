//! Member Registry Backend
//!
//! REST backend for the organization's member registry, with SQLite persistence
//! and a notification-mediated role-change approval workflow.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod workflow;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::TokenKeys;
use config::Config;
use db::Repository;
use workflow::{NotificationQuery, StatusChangeWorkflow};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub tokens: Arc<TokenKeys>,
    pub workflow: Arc<StatusChangeWorkflow>,
    pub inbox: Arc<NotificationQuery>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Repository, config: Config, jwt_secret: &[u8]) -> Self {
        Self {
            tokens: Arc::new(TokenKeys::new(jwt_secret, config.jwt_ttl_minutes)),
            workflow: Arc::new(StatusChangeWorkflow::new(repo.clone())),
            inbox: Arc::new(NotificationQuery::new(repo.clone())),
            repo: Arc::new(repo),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Member Registry Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Upload directory: {:?}", config.upload_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.admin_key.is_none() {
        tracing::warn!(
            "No admin key configured (REGISTRY_ADMIN_KEY). Member administration is open!"
        );
    }

    let jwt_secret = match &config.jwt_secret {
        Some(secret) => secret.clone(),
        None => {
            tracing::warn!(
                "No JWT secret configured (REGISTRY_JWT_SECRET). Tokens will not survive a restart"
            );
            format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            )
        }
    };

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let bind_addr = config.bind_addr;
    let state = AppState::new(Repository::new(pool), config, jwt_secret.as_bytes());

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

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

    // Clone the admin key for the auth layer
    let admin_key = state.config.admin_key.clone();

    // Member administration
    let admin_routes = Router::new()
        .route("/member", get(api::list_members).post(api::register_member))
        .route(
            "/member/{id}",
            get(api::get_member)
                .put(api::update_member)
                .delete(api::delete_member),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_key_layer(admin_key.clone(), req, next)
        }));

    // Bearer-authenticated member routes; identity comes from the Claims extractor
    let member_routes = Router::new()
        .route("/auth/login", post(api::login))
        .route("/auth/token", post(api::login_with_token))
        .route("/profile", get(api::get_profile))
        .route("/profile/password", put(api::set_password))
        .route("/profile/complete", put(api::complete_profile))
        .route("/notifications", get(api::list_notifications))
        .route("/notifications/unread-count", get(api::unread_count))
        .route("/notifications/{id}/read", put(api::mark_notification_read))
        .route("/status-change", post(api::create_status_change))
        .route("/status-change/{id}/accept", put(api::accept_status_change))
        .route("/status-change/{id}/reject", put(api::reject_status_change));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", admin_routes.merge(member_routes))
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
