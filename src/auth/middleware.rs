use crate::{error::AuthError, AppState};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingBearerToken)?
        .to_str()
        .map_err(|_| AuthError::MissingBearerToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingBearerToken)?;

    Ok(token)
}

/// Rejects requests without a valid `access` token and exposes its
/// [`Claims`](crate::services::token_service::Claims) as a request extension.
pub async fn require_access_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = {
        let token = extract_bearer_token(request.headers())?;
        state.auth_service.authenticate_access(token)?
    };

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
