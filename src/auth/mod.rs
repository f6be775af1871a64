//! # Authentication Module
//!
//! Pre-shared key check for the services router. Every request must carry
//! the configured token in the `x-token` header; anything else is answered
//! with `401 Invalid basic token header` before it reaches a handler.
//!
//! An empty configured token matches nothing, so a service started without
//! `ROLLGATE_API_TOKEN` rejects all protected requests.

use crate::AppState;
use crate::constants::TOKEN_HEADER;
use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

pub const INVALID_TOKEN_DETAIL: &str = "Invalid basic token header";

/// Axum middleware rejecting requests without the expected `x-token`
pub async fn verify_token_header(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    if !token_matches(provided, &state.config.api_token) {
        debug!(
            path = %request.uri().path(),
            header_present = provided.is_some(),
            "Rejected request with invalid token header"
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": INVALID_TOKEN_DETAIL })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Whether `provided` is exactly the configured, non-empty token
pub fn token_matches(provided: Option<&str>, expected: &str) -> bool {
    match provided {
        Some(token) => !expected.is_empty() && token == expected,
        None => false,
    }
}
