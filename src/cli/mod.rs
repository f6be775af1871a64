//! # CLI Module
//!
//! Command-line interface for rollgate.
//!
//! ## Commands
//!
//! - `start`: validate the environment, open the log registry and the
//!   database, then serve until Ctrl+C / SIGTERM
//! - `validate-env`: report the configuration the environment produces
//! - `env-example`: print an example `.env` file
//! - `rotate --name <logger>`: ask the running server to roll a logger's file
//!   over now, outside the schedule
//!
//! ## Usage Example
//!
//! ```bash
//! ROLLGATE_API_TOKEN=s3cret rollgate start
//! rollgate rotate --name rollgate
//! rollgate rotate --name rollgate::routing --url http://10.0.0.5:8000
//! ```
//!
//! `rotate` goes through `POST /v1/services/logs/{name}/rotate` so the
//! server's open sink performs the rollover. Without a server there is
//! nothing to rotate and the command fails.

use crate::AppState;
use crate::constants::{SERVICE_LOGGER, TOKEN_HEADER, services_prefix};
use crate::database::DatabaseManager;
use crate::env::{
    AppConfig, EnvValidationError, generate_env_example, print_validation_results,
    validate_environment,
};
use crate::here;
use crate::logging::layer::RegistryLayer;
use crate::logging::{LoggerRegistry, RegistryConfig, Severity, resolve_log_root};
use clap::{Parser, Subcommand};
use function_name::named;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::error::Error;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter, Targets};
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

pub type CliError = Box<dyn Error + Send + Sync>;

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Body of a successful rotate response
#[derive(Debug, Deserialize)]
pub struct RotationReply {
    pub logger: String,
    pub archive: Option<String>,
}

///////////////////////////////////////////////////////////////////////////////
//****                        Private Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

#[derive(Parser)]
#[command(name = "rollgate")]
#[command(about = "Token-protected service with weekly rotated, zipped log files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

///////////////////////////////////////////////////////////////////////////////
//****                         Private Types                             ****//
///////////////////////////////////////////////////////////////////////////////

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Start,
    /// Validate environment configuration
    #[command(name = "validate-env")]
    ValidateEnv,
    /// Print an example .env file
    #[command(name = "env-example")]
    EnvExample,
    /// Ask the running server to roll a logger's file over immediately
    Rotate {
        /// Logger name, e.g. `rollgate` or `rollgate::routing`
        #[arg(long)]
        name: String,
        /// Server base URL; defaults to the configured bind address
        #[arg(long)]
        url: Option<String>,
    },
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

pub async fn parse_cli_commands() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => start().await,
        Commands::ValidateEnv => {
            let result = validate_environment();
            print_validation_results(&result);
            result.map(|_| ()).map_err(validation_failed)
        }
        Commands::EnvExample => {
            print!("{}", generate_env_example());
            Ok(())
        }
        Commands::Rotate { name, url } => rotate(&name, url).await,
    }
}

/// Install the console subscriber, plus the file bridge when given
///
/// The console honours `filter`; the bridge sees rollgate and HTTP trace
/// events at or above `file_level`.
pub fn init_tracing(
    filter: &str,
    file_layer: Option<RegistryLayer>,
    file_level: Severity,
) -> Result<(), CliError> {
    let console_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let file_targets = Targets::new()
        .with_target("rollgate", level_filter(file_level))
        .with_target("tower_http", level_filter(file_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(console_filter))
        .with(file_layer.map(|layer| layer.with_filter(file_targets)))
        .try_init()?;
    Ok(())
}

/// Call the rotate endpoint of the server at `base`
pub async fn request_rotation(
    client: &Client,
    base: &str,
    token: &str,
    name: &str,
) -> Result<RotationReply, CliError> {
    let url = format!(
        "{}{}/logs/{}/rotate",
        base.trim_end_matches('/'),
        services_prefix(),
        name
    );
    let response = client
        .post(url)
        .header(TOKEN_HEADER, token)
        .send()
        .await
        .map_err(|e| format!("Could not reach rollgate at {}: {}", base, e))?;

    match response.status() {
        StatusCode::OK => Ok(response.json::<RotationReply>().await?),
        StatusCode::NOT_FOUND => Err(format!("The server has no logger named '{}'", name).into()),
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(format!("Rotation failed with {}: {}", status, body).into())
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Private Functions                           ****//
///////////////////////////////////////////////////////////////////////////////

#[named]
async fn start() -> Result<(), CliError> {
    let result = validate_environment();
    if result.is_err() {
        print_validation_results(&result);
    }
    let config = result.map_err(validation_failed)?;

    let registry = Arc::new(registry_for(&config));
    let service_logger = registry.get_logger(SERVICE_LOGGER, config.file_log_level)?;
    service_logger.info("Create", here!(function_name!()))?;
    init_tracing(
        &config.log_level,
        Some(RegistryLayer::new(service_logger)),
        config.file_log_level,
    )?;
    info!("Logging to {}", registry.log_root().display());

    let db = DatabaseManager::from_config_file(&config.db_config_path).await?;
    let state = AppState::new(db, registry, config)?;

    crate::server::start_server(state).await
}

async fn rotate(name: &str, url: Option<String>) -> Result<(), CliError> {
    let config = validate_environment().map_err(validation_failed)?;
    let base = url.unwrap_or_else(|| server_url(&config));

    let reply = request_rotation(&Client::new(), &base, &config.api_token, name).await?;
    match reply.archive {
        Some(archive) => println!("Rotated {} -> {}", reply.logger, archive),
        None => println!("Rotated {}, nothing to archive", reply.logger),
    }
    Ok(())
}

/// Where a local server bound with `config` can be reached
fn server_url(config: &AppConfig) -> String {
    let mut addr = config.bind_address;
    if addr.ip().is_unspecified() {
        addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    format!("http://{}", addr)
}

fn registry_for(config: &AppConfig) -> LoggerRegistry {
    let log_root = resolve_log_root(config.log_root.as_deref(), config.packaged);
    LoggerRegistry::new(RegistryConfig::new(log_root))
}

fn validation_failed(errors: Vec<EnvValidationError>) -> CliError {
    format!(
        "environment validation failed with {} problem(s)",
        errors.len()
    )
    .into()
}

fn level_filter(severity: Severity) -> LevelFilter {
    match severity {
        Severity::Debug => LevelFilter::DEBUG,
        Severity::Info => LevelFilter::INFO,
        Severity::Warning => LevelFilter::WARN,
        Severity::Error | Severity::Critical => LevelFilter::ERROR,
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::validate_with;
    use crate::tests::{spawn_app, test_state};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    const TOKEN: &str = "s3cret";

    #[test]
    fn test_cli_parses_rotate() {
        let cli = Cli::try_parse_from(["rollgate", "rotate", "--name", "rollgate::routing"]).unwrap();
        match cli.command {
            Commands::Rotate { name, url } => {
                assert_eq!(name, "rollgate::routing");
                assert!(url.is_none());
            }
            _ => panic!("expected rotate"),
        }
    }

    #[test]
    fn test_cli_rejects_rotate_without_name() {
        assert!(Cli::try_parse_from(["rollgate", "rotate"]).is_err());
    }

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(level_filter(Severity::Warning), LevelFilter::WARN);
        assert_eq!(level_filter(Severity::Critical), LevelFilter::ERROR);
    }

    #[test]
    fn test_registry_uses_configured_root() {
        let dir = TempDir::new().unwrap();
        let vars = HashMap::from([(
            "ROLLGATE_LOG_ROOT".to_string(),
            dir.path().display().to_string(),
        )]);
        let config = validate_with(|name| vars.get(name).cloned()).unwrap();

        let registry = registry_for(&config);

        assert_eq!(registry.log_root(), dir.path());
    }

    #[test]
    fn test_server_url_replaces_unspecified_host() {
        let vars = HashMap::from([("ROLLGATE_PORT".to_string(), "8123".to_string())]);
        let config = validate_with(|name| vars.get(name).cloned()).unwrap();

        assert_eq!(server_url(&config), "http://127.0.0.1:8123");
    }

    #[tokio::test]
    async fn test_rotation_runs_on_the_server_sink() {
        let dir = TempDir::new().unwrap();
        let state = test_state(dir.path(), TOKEN).await;
        let base = spawn_app(state.clone()).await;
        let logger = state.registry.get_logger("audit", Severity::Info).unwrap();
        logger.info("before rotation", here!("test")).unwrap();

        let reply = request_rotation(&Client::new(), &base, TOKEN, "audit")
            .await
            .unwrap();

        assert_eq!(reply.logger, "audit");
        let archive = reply.archive.unwrap();
        assert!(archive.ends_with(".log.zip"));
        assert!(std::path::Path::new(&archive).exists());

        // The server keeps writing to the fresh live file
        logger.info("after rotation", here!("test")).unwrap();
        let live = fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert!(live.contains("after rotation"));
        assert!(!live.contains("before rotation"));
    }

    #[tokio::test]
    async fn test_rotation_of_unknown_logger_fails() {
        let dir = TempDir::new().unwrap();
        let base = spawn_app(test_state(dir.path(), TOKEN).await).await;

        let err = request_rotation(&Client::new(), &base, TOKEN, "ghost")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no logger named 'ghost'"));
    }

    #[tokio::test]
    async fn test_rotation_with_wrong_token_fails() {
        let dir = TempDir::new().unwrap();
        let state = test_state(dir.path(), TOKEN).await;
        let base = spawn_app(state.clone()).await;
        let name = state.request_logger.name().to_string();

        let err = request_rotation(&Client::new(), &base, "wrong", &name)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("401"));
        assert!(!dir.path().read_dir().unwrap().flatten().any(|e| {
            e.file_name().to_string_lossy().ends_with(".zip")
        }));
    }
}
