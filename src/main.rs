//! # rollgate
//!
//! A small token-protected HTTP service whose own logs are written to
//! per-logger files that roll over weekly and are archived as verified zips.

mod auth;
mod cli;
mod constants;
mod database;
mod env;
mod logging;
mod open_api;
mod routing;
mod server;
#[cfg(test)]
mod tests;

use crate::database::DatabaseManager;
use crate::env::AppConfig;
use crate::logging::{LogError, Logger, LoggerRegistry};
use chrono::{DateTime, Utc};
use function_name::named;
use std::sync::Arc;

/// Logger that records every request reaching the services router
pub const REQUEST_LOGGER: &str = "rollgate::routing";

/// State shared by every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseManager,
    pub registry: Arc<LoggerRegistry>,
    pub request_logger: Arc<Logger>,
    pub config: AppConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    #[named]
    pub fn new(
        db: DatabaseManager,
        registry: Arc<LoggerRegistry>,
        config: AppConfig,
    ) -> Result<Self, LogError> {
        let request_logger = registry.get_logger(REQUEST_LOGGER, config.file_log_level)?;
        request_logger.info("Create", here!(function_name!()))?;
        Ok(Self {
            db,
            registry,
            request_logger,
            config,
            started_at: Utc::now(),
        })
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = cli::parse_cli_commands().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
