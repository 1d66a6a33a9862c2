//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::time::Duration;

use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::handlers::{health, ready};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::webauthn::{register, response, RelyingParty};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Create the application router with default config and in-memory storage (for testing)
pub fn create_router() -> Router {
    let config = Config::default();
    let state = AppState::in_memory(&config, RelyingParty::default());
    create_router_with_config(&config, state)
}

/// Create the application router with custom configuration
pub fn create_router_with_config(config: &Config, state: AppState) -> Router {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Ceremony state lives server-side; the cookie only carries the session id
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_secure(config.session_secure_cookie)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(
            config.session_ttl_hours,
        )));

    let body_limit = RequestBodyLimitLayer::new(config.body_limit_kb * 1024);

    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    let webauthn = Router::new()
        .route("/webauthn/register", post(register))
        .route("/webauthn/response", post(response))
        .layer(sessions);

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .merge(webauthn)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(body_limit)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
}
