//! JSON endpoints mounted under `/api/auth`.

use crate::error::{ApiError, AuthError};
use crate::services::{
    auth_service::{LoginRequest, SignupRequest},
    token_service::Claims,
};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Deserialize;
use serde_json::json;

// Fields are optional so an explicit `null` reaches validation like a
// missing field does.
#[derive(Debug, Default, Deserialize)]
pub struct SignupPayload {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyEmailPayload {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendVerificationPayload {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshPayload {
    pub refresh_token: Option<String>,
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!("rejected request body: {}", rejection);
        AuthError::Validation("Invalid request body".to_string())
    })
}

pub async fn signup_handler(
    State(state): State<AppState>,
    payload: Result<Json<SignupPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = parse_body(payload)?;

    let request = SignupRequest {
        email: form.email.unwrap_or_default(),
        password: form.password.unwrap_or_default(),
        name: form.name,
        locale: form.locale,
    };

    let user = state
        .auth_service
        .register(request)
        .await
        .map_err(|e| e.context("Registration failed"))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully. Please check your email for verification.",
            "user": user,
        })),
    )
        .into_response())
}

pub async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = parse_body(payload)?;

    let request = LoginRequest {
        email: form.email.unwrap_or_default(),
        password: form.password.unwrap_or_default(),
    };

    let outcome = state
        .auth_service
        .login(request)
        .await
        .map_err(|e| e.context("Login failed"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": outcome.token,
        "refresh_token": outcome.refresh_token,
        "user": outcome.user,
    }))
    .into_response())
}

pub async fn verify_email_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyEmailPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = parse_body(payload)?;

    let user = state
        .auth_service
        .verify_email(form.token.as_deref().unwrap_or_default())
        .await
        .map_err(|e| e.context("Email verification failed"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Email verified successfully",
        "user": user,
    }))
    .into_response())
}

pub async fn send_verification_handler(
    State(state): State<AppState>,
    payload: Result<Json<SendVerificationPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = parse_body(payload)?;

    state
        .auth_service
        .resend_verification(form.email.as_deref().unwrap_or_default())
        .await
        .map_err(|e| e.context("Failed to send verification email"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Verification email sent successfully",
    }))
    .into_response())
}

pub async fn refresh_handler(
    State(state): State<AppState>,
    payload: Result<Json<RefreshPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = parse_body(payload)?;

    let outcome = state
        .auth_service
        .refresh(form.refresh_token.as_deref().unwrap_or_default())
        .await
        .map_err(|e| e.context("Token refresh failed"))?;

    Ok(Json(json!({
        "success": true,
        "token": outcome.token,
        "user": outcome.user,
    }))
    .into_response())
}

pub async fn me_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let user = state
        .auth_service
        .current_user(&claims)
        .await
        .map_err(|e| e.context("Failed to load account"))?;

    Ok(Json(json!({
        "success": true,
        "user": user,
    }))
    .into_response())
}

pub async fn not_found_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
        .into_response()
}
