use axum::{
    http::{header, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Json, Response},
    Router,
};
use serde_json::json;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Bounds every request by `timeout`. A request that runs over answers
/// `408 {"error": "Request timed out"}`.
pub fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(map_response(json_timeout_response))
}

/// The timeout layer answers with an empty body; give it the usual JSON shape.
async fn json_timeout_response(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT
        && !response.headers().contains_key(header::CONTENT_TYPE)
    {
        return (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "error": "Request timed out" })),
        )
            .into_response();
    }
    response
}
