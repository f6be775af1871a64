//! # Routing Handlers Module
//!
//! HTTP handlers and the request-logging middleware for rollgate.
//!
//! ## Routes
//!
//! - `GET /`: redirect to the OpenAPI document
//! - `GET /docs`: the OpenAPI document
//! - `GET /v1/services`: service metadata and registered loggers
//! - `GET /v1/services/logs`: each logger's file and next rollover
//! - `POST /v1/services/logs/{name}/rotate`: roll a logger over now
//!
//! Everything under `/v1/services` passes the token check first and is then
//! written to the request log by [`log_request`].

use crate::AppState;
use crate::constants::{API_DESCRIPTION, API_TITLE, API_VERSION};
use crate::here;
use crate::open_api::service_document;
use axum::{
    Json,
    extract::{OriginalUri, Path, Request, State},
    http::{HeaderMap, StatusCode, Uri, header::HOST},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use function_name::named;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Body of `GET /v1/services`
#[derive(Debug, Serialize)]
pub struct ServiceIndex {
    pub title: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub started_at: DateTime<Utc>,
    pub loggers: Vec<String>,
}

/// One entry of `GET /v1/services/logs`
#[derive(Debug, Serialize)]
pub struct LoggerSummary {
    pub name: String,
    pub level: String,
    pub file: String,
    pub next_rollover: Option<DateTime<Utc>>,
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

pub async fn root_redirect() -> Redirect {
    Redirect::temporary("/docs")
}

pub async fn openapi_document() -> Response {
    match service_document() {
        Ok(document) => Json(document).into_response(),
        Err(e) => {
            error!("Failed to build OpenAPI document: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "OpenAPI document unavailable" })),
            )
                .into_response()
        }
    }
}

pub async fn services_index(State(state): State<AppState>) -> Json<ServiceIndex> {
    Json(ServiceIndex {
        title: API_TITLE,
        version: API_VERSION,
        description: API_DESCRIPTION,
        started_at: state.started_at,
        loggers: state.registry.names(),
    })
}

pub async fn list_loggers(State(state): State<AppState>) -> Json<Vec<LoggerSummary>> {
    let summaries = state
        .registry
        .names()
        .into_iter()
        .filter_map(|name| state.registry.get(&name))
        .map(|logger| LoggerSummary {
            name: logger.name().to_string(),
            level: logger.level().to_string(),
            file: logger.sink().base_path().display().to_string(),
            next_rollover: DateTime::from_timestamp(logger.sink().rollover_at(), 0),
        })
        .collect();
    Json(summaries)
}

/// Force a rollover of the named logger's file
pub async fn rotate_logger(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Some(logger) = state.registry.get(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": format!("No logger named '{}'", name) })),
        )
            .into_response();
    };

    let rolled = tokio::task::spawn_blocking(move || logger.sink().force_rollover()).await;

    match rolled {
        Ok(Ok(archive)) => {
            let archive = archive.map(|path| path.display().to_string());
            info!(logger = %name, archive = ?archive, "Forced log rollover");
            Json(json!({ "logger": name, "archive": archive })).into_response()
        }
        Ok(Err(e)) => {
            error!(logger = %name, "Forced rollover failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!(logger = %name, "Rollover task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Middleware writing `Request received: <METHOD> <URL>` to the request log.
///
/// The write can trigger a rollover and its zip compression, so it runs on
/// the blocking pool.
#[named]
pub async fn log_request(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    request: Request,
    next: Next,
) -> Response {
    let message = format!(
        "Request received: {} {}",
        request.method(),
        request_url(request.headers(), &uri)
    );
    let location = here!(function_name!());
    let logger = state.request_logger.clone();

    match tokio::task::spawn_blocking(move || logger.info(message, location)).await {
        Ok(Ok(())) => {}
        // The record was written; only the archive step failed
        Ok(Err(e)) if e.is_rollover_failure() => warn!("Request log rollover failed: {}", e),
        Ok(Err(e)) => error!("Failed to write request log: {}", e),
        Err(e) => error!("Request log task failed: {}", e),
    }
    next.run(request).await
}

/// `http://<Host><path and query>`, or just the path when there is no `Host`
fn request_url(headers: &HeaderMap, uri: &Uri) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    match headers.get(HOST).and_then(|host| host.to_str().ok()) {
        Some(host) => format!("http://{}{}", host, uri),
        None => uri.to_string(),
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
