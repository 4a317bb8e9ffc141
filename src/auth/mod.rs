pub mod handlers;
pub mod middleware;

use crate::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

/// Routes nested under `/api/auth`.
pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(handlers::me_handler))
        .route_layer(from_fn_with_state(state, middleware::require_access_token));

    Router::new()
        .route("/signup", post(handlers::signup_handler))
        .route("/login", post(handlers::login_handler))
        .route("/verify-email", post(handlers::verify_email_handler))
        .route("/send-verification", post(handlers::send_verification_handler))
        .route("/refresh", post(handlers::refresh_handler))
        .merge(protected)
        .method_not_allowed_fallback(handlers::not_found_handler)
}
