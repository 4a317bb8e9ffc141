pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<services::auth_service::AuthService>,
}

/// The HTTP surface: auth routes under `/api/auth`, a JSON 404 fallback,
/// security headers and request tracing. CORS and timeouts are layered on in
/// `main` because they depend on deployment settings.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::routes(state.clone()))
        .fallback(auth::handlers::not_found_handler)
        .layer(axum::middleware::from_fn(middleware::add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
