use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::repositories::user_repository::RepositoryError;
use crate::services::{
    email_service::EmailError, password_service::HashingError, token_service::TokenError,
};

pub type Result<T> = std::result::Result<T, AuthError>;

/// Every failure the auth flows can surface to a caller.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email already exists")]
    Conflict,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Token invalid")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token invalid or expired")]
    TokenInvalidOrExpired,

    #[error("Missing or malformed Authorization header")]
    MissingBearerToken,

    #[error("Bearer token rejected")]
    InvalidBearerToken,

    #[error("Notification failed: {0}")]
    Notification(#[from] EmailError),

    #[error("Hashing failed: {0}")]
    Hashing(#[from] HashingError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::TokenInvalid
            | AuthError::TokenExpired
            | AuthError::TokenInvalidOrExpired => StatusCode::BAD_REQUEST,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::MissingBearerToken
            | AuthError::InvalidBearerToken => StatusCode::UNAUTHORIZED,
            AuthError::EmailNotVerified => StatusCode::FORBIDDEN,
            AuthError::Notification(_)
            | AuthError::Hashing(_)
            | AuthError::Repository(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing text, or `None` for server faults whose detail must not leak.
    pub fn public_message(&self) -> Option<String> {
        let msg = match self {
            AuthError::Validation(msg) => return Some(msg.clone()),
            AuthError::Conflict => "Email already exists",
            AuthError::InvalidCredentials => "Invalid email or password",
            AuthError::EmailNotVerified => "Please verify your email before logging in",
            AuthError::TokenInvalid
            | AuthError::TokenExpired
            | AuthError::TokenInvalidOrExpired
            | AuthError::InvalidBearerToken => "Invalid or expired token",
            AuthError::MissingBearerToken => "Authorization header must be 'Bearer <token>'",
            AuthError::Notification(_) => "Failed to send verification email",
            AuthError::Hashing(_) | AuthError::Repository(_) | AuthError::Internal(_) => {
                return None
            }
        };
        Some(msg.to_string())
    }

    /// Attaches the generic message shown when this error is a server fault.
    pub fn context(self, internal_message: &'static str) -> ApiError {
        ApiError {
            source: self,
            internal_message,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid | TokenError::WrongPurpose { .. } => AuthError::TokenInvalid,
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Signing(msg) => AuthError::Internal(msg),
        }
    }
}

/// An [`AuthError`] ready to be rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    source: AuthError,
    internal_message: &'static str,
}

impl From<AuthError> for ApiError {
    fn from(source: AuthError) -> Self {
        source.context("Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.source.status();
        let message = match self.source.public_message() {
            Some(msg) => {
                if status.is_server_error() {
                    tracing::error!(error = ?self.source, "{}", self.internal_message);
                } else {
                    tracing::debug!(error = %self.source, "request rejected");
                }
                msg
            }
            None => {
                tracing::error!(error = ?self.source, "{}", self.internal_message);
                self.internal_message.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn token_failures_collapse_to_one_message() {
        for err in [
            AuthError::TokenInvalid,
            AuthError::TokenExpired,
            AuthError::TokenInvalidOrExpired,
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_of(response).await["error"], "Invalid or expired token");
        }
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_detail() {
        let err = AuthError::Repository(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        let response = err.context("Login failed").into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body, json!({ "error": "Login failed" }));
    }

    #[test]
    fn status_codes() {
        assert_eq!(AuthError::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::EmailNotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Notification(EmailError::SendFailed("smtp down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn token_errors_map_by_kind() {
        assert!(matches!(
            AuthError::from(TokenError::Expired),
            AuthError::TokenExpired
        ));
        assert!(matches!(
            AuthError::from(TokenError::Invalid),
            AuthError::TokenInvalid
        ));
    }
}
