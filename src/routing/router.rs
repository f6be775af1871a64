//! # Router Module
//!
//! Builds the axum router for rollgate.
//!
//! ## Architecture
//!
//! 1. Public routes: `/` (redirect), `/docs`, `/health`
//! 2. The services router, nested under `/v1/services`, wrapped in the token
//!    check (outer) and the request log (inner), so rejected requests are not logged
//! 3. Application state injection
//! 4. HTTP tracing middleware

use super::handlers::{
    list_loggers, log_request, openapi_document, root_redirect, rotate_logger, services_index,
};
use crate::AppState;
use crate::auth::verify_token_header;
use crate::constants::services_prefix;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

pub fn create_router(state: AppState) -> Router {
    let services = Router::new()
        .route("/", get(services_index))
        .route("/logs", get(list_loggers))
        .route("/logs/{name}/rotate", post(rotate_logger))
        .route_layer(middleware::from_fn_with_state(state.clone(), log_request))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            verify_token_header,
        ));

    Router::new()
        .route("/", get(root_redirect))
        .route("/docs", get(openapi_document))
        .route("/health", get(|| async { "OK" }))
        .nest(&services_prefix(), services)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{spawn_app, test_state};
    use reqwest::{Client, StatusCode, redirect::Policy};
    use std::fs;
    use tempfile::TempDir;

    const TOKEN: &str = "test-token";

    fn request_log(dir: &TempDir, state: &AppState) -> String {
        let path = dir.path().join(format!(
            "{}.log",
            state.request_logger.name().replace("::", ".")
        ));
        fs::read_to_string(path).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let dir = TempDir::new().unwrap();
        let base = spawn_app(test_state(dir.path(), TOKEN).await).await;

        let res = Client::new().get(format!("{}/health", base)).send().await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "OK");
    }

    #[tokio::test]
    async fn test_root_redirects_to_docs() {
        let dir = TempDir::new().unwrap();
        let base = spawn_app(test_state(dir.path(), TOKEN).await).await;
        let client = Client::builder().redirect(Policy::none()).build().unwrap();

        let res = client.get(format!("{}/", base)).send().await.unwrap();

        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()["location"], "/docs");
    }

    #[tokio::test]
    async fn test_docs_serves_openapi() {
        let dir = TempDir::new().unwrap();
        let base = spawn_app(test_state(dir.path(), TOKEN).await).await;

        let res = Client::new().get(format!("{}/docs", base)).send().await.unwrap();
        let body: serde_json::Value = res.json().await.unwrap();

        assert_eq!(body["info"]["title"], "rollgate");
        assert!(body["paths"]["/v1/services"].is_object());
    }

    #[tokio::test]
    async fn test_services_require_token() {
        let dir = TempDir::new().unwrap();
        let state = test_state(dir.path(), TOKEN).await;
        let base = spawn_app(state.clone()).await;
        let client = Client::new();

        let missing = client.get(format!("{}/v1/services", base)).send().await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = missing.json().await.unwrap();
        assert_eq!(body["detail"], "Invalid basic token header");

        let wrong = client
            .get(format!("{}/v1/services", base))
            .header("x-token", "nope")
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        // Rejected requests never reach the request log
        assert!(!request_log(&dir, &state).contains("Request received"));
    }

    #[tokio::test]
    async fn test_authorized_request_is_logged() {
        let dir = TempDir::new().unwrap();
        let state = test_state(dir.path(), TOKEN).await;
        let base = spawn_app(state.clone()).await;

        let res = Client::new()
            .get(format!("{}/v1/services?verbose=1", base))
            .header("x-token", TOKEN)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["version"], "v1");
        assert!(body["loggers"].is_array());

        let log = request_log(&dir, &state);
        assert!(log.contains("| handlers.log_request@"));
        let line = format!("| INFO: Request received: GET {}/v1/services?verbose=1", base);
        assert!(log.contains(&line));
    }

    #[tokio::test]
    async fn test_request_log_opens_with_create() {
        let dir = TempDir::new().unwrap();
        let state = test_state(dir.path(), TOKEN).await;

        let log = request_log(&dir, &state);
        assert!(log.lines().next().unwrap().ends_with("| INFO: Create"));
    }

    #[tokio::test]
    async fn test_empty_token_rejects_everything() {
        let dir = TempDir::new().unwrap();
        let base = spawn_app(test_state(dir.path(), "").await).await;

        let res = Client::new()
            .get(format!("{}/v1/services/logs", base))
            .header("x-token", "")
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rotate_endpoint() {
        let dir = TempDir::new().unwrap();
        let state = test_state(dir.path(), TOKEN).await;
        let base = spawn_app(state.clone()).await;
        let name = state.request_logger.name().to_string();

        let res = Client::new()
            .post(format!("{}/v1/services/logs/{}/rotate", base, name))
            .header("x-token", TOKEN)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["logger"], name);
        // The middleware logged this very request before the rollover ran
        assert!(body["archive"].as_str().unwrap().ends_with(".log.zip"));
    }
}
