//! # OpenAPI Document
//!
//! Describes the service's HTTP surface as an OpenAPI 3 document, served at
//! `/docs`. The document is written as JSON and parsed into `openapiv3` types
//! so a malformed description fails loudly in tests rather than at a client.

use crate::constants::{
    API_CONTACT_NAME, API_CONTACT_URL, API_DESCRIPTION, API_TITLE, API_VERSION, TOKEN_HEADER,
    services_prefix,
};
use openapiv3::OpenAPI;
use serde_json::{Value, json};
use std::error::Error;
use std::fmt;

/// Custom error type for OpenAPI document operations
#[derive(Debug)]
pub enum OpenApiError {
    ParseError(String),
    ValidationError(String),
}

impl fmt::Display for OpenApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenApiError::ParseError(msg) => write!(f, "OpenAPI Parse Error: {}", msg),
            OpenApiError::ValidationError(msg) => write!(f, "OpenAPI Validation Error: {}", msg),
        }
    }
}

impl Error for OpenApiError {}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

/// The document describing this service
pub fn service_document() -> Result<OpenAPI, OpenApiError> {
    let services = services_prefix();
    let protected = json!([{ "token": [] }]);

    let document = json!({
        "openapi": "3.0.3",
        "info": {
            "title": API_TITLE,
            "version": API_VERSION,
            "description": API_DESCRIPTION,
            "contact": {
                "name": API_CONTACT_NAME,
                "url": API_CONTACT_URL
            }
        },
        "paths": {
            "/health": {
                "get": {
                    "summary": "Liveness probe",
                    "responses": { "200": { "description": "Service is up" } }
                }
            },
            services.clone(): {
                "get": {
                    "summary": "Service metadata and registered loggers",
                    "security": protected,
                    "responses": {
                        "200": { "description": "Service index" },
                        "401": { "description": "Invalid basic token header" }
                    }
                }
            },
            format!("{}/logs", services): {
                "get": {
                    "summary": "Registered loggers with their files and next rollover",
                    "security": protected,
                    "responses": {
                        "200": { "description": "Logger list" },
                        "401": { "description": "Invalid basic token header" }
                    }
                }
            },
            format!("{}/logs/{{name}}/rotate", services): {
                "post": {
                    "summary": "Roll a logger's file over immediately",
                    "security": protected,
                    "parameters": [{
                        "name": "name",
                        "in": "path",
                        "required": true,
                        "schema": { "type": "string" }
                    }],
                    "responses": {
                        "200": { "description": "Rollover result" },
                        "401": { "description": "Invalid basic token header" },
                        "404": { "description": "No logger with that name" },
                        "500": { "description": "Rollover failed" }
                    }
                }
            }
        },
        "components": {
            "securitySchemes": {
                "token": {
                    "type": "apiKey",
                    "in": "header",
                    "name": TOKEN_HEADER,
                    "description": "Required pre-shared key for any services route"
                }
            }
        }
    });

    parse_openapi_spec_from_value(document)
}

/// Parse and validate an OpenAPI document held as JSON
pub fn parse_openapi_spec_from_value(spec_value: Value) -> Result<OpenAPI, OpenApiError> {
    let openapi_spec: OpenAPI = serde_json::from_value(spec_value)
        .map_err(|e| OpenApiError::ParseError(format!("Invalid OpenAPI specification: {}", e)))?;

    validate_openapi_spec(&openapi_spec)?;

    Ok(openapi_spec)
}

///////////////////////////////////////////////////////////////////////////////
//****                       Private Functions                           ****//
///////////////////////////////////////////////////////////////////////////////

fn validate_openapi_spec(spec: &OpenAPI) -> Result<(), OpenApiError> {
    if !spec.openapi.starts_with("3.") {
        return Err(OpenApiError::ValidationError(format!(
            "Unsupported OpenAPI version: {}. Only version 3.x is supported.",
            spec.openapi
        )));
    }

    if spec.info.title.is_empty() {
        return Err(OpenApiError::ValidationError(
            "OpenAPI document must have a non-empty title".to_string(),
        ));
    }

    if spec.info.version.is_empty() {
        return Err(OpenApiError::ValidationError(
            "OpenAPI document must have a non-empty version".to_string(),
        ));
    }

    Ok(())
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
