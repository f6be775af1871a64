//! Environment variable validation and configuration module for rollgate
//!
//! All settings come from the environment and are validated once at startup.
//!
//! # Supported Environment Variables
//!
//! ## Server Configuration
//! - `ROLLGATE_HOST`: Server bind address (default: "0.0.0.0")
//! - `ROLLGATE_PORT`: Server port (default: "8000")
//!
//! ## Security Configuration
//! - `ROLLGATE_API_TOKEN`: Pre-shared key every `/services` request must send in `x-token`
//!
//! ## Database Configuration
//! - `ROLLGATE_DB_CONFIG`: YAML file holding `connection_string` (default: "config/db.yaml")
//!
//! ## Logging Configuration
//! - `RUST_LOG`: Standard Rust logging configuration for the console
//! - `ROLLGATE_LOG_LEVEL`: Console filter override
//! - `ROLLGATE_FILE_LOG_LEVEL`: Threshold for the rotated log files (default: "INFO")
//! - `ROLLGATE_LOG_ROOT`: Directory for log files (default: "./log")
//! - `ROLLGATE_PACKAGED`: Log next to the executable instead of the working directory (default: "false")

use crate::logging::Severity;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DB_CONFIG: &str = "config/db.yaml";
pub const DEFAULT_LOG_FILTER: &str = "rollgate=info,tower_http=info";

/// Environment validation errors
#[derive(Debug, Clone)]
pub struct EnvValidationError {
    pub variable: String,
    pub message: String,
    pub severity: ErrorSeverity,
}

impl EnvValidationError {
    fn new(variable: &str, message: impl Into<String>, severity: ErrorSeverity) -> Self {
        Self {
            variable: variable.to_string(),
            message: message.into(),
            severity,
        }
    }
}

/// Severity level for environment validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorSeverity {
    /// Prevents startup
    Critical,
    /// Missing or odd settings the service can still run with
    Warning,
    /// A default value was used
    Info,
}

/// Validated application configuration derived from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Server
    pub host: String,
    pub port: u16,
    pub bind_address: SocketAddr,

    // Security
    pub api_token: String,

    // Database
    pub db_config_path: PathBuf,

    // Logging
    pub log_level: String,
    pub file_log_level: Severity,
    pub log_root: Option<PathBuf>,
    pub packaged: bool,
}

/// Validate the process environment and return configuration or errors
pub fn validate_environment() -> Result<AppConfig, Vec<EnvValidationError>> {
    validate_with(|name| env::var(name).ok())
}

/// Validate settings read through `lookup`
pub fn validate_with<F>(lookup: F) -> Result<AppConfig, Vec<EnvValidationError>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Server configuration
    let host = lookup("ROLLGATE_HOST").unwrap_or_else(|| {
        warnings.push(EnvValidationError::new(
            "ROLLGATE_HOST",
            format!("Using default host '{}'", DEFAULT_HOST),
            ErrorSeverity::Info,
        ));
        DEFAULT_HOST.to_string()
    });

    let ip = match IpAddr::from_str(&host) {
        Ok(ip) => ip,
        Err(_) => {
            errors.push(EnvValidationError::new(
                "ROLLGATE_HOST",
                format!("Invalid IP address: {}", host),
                ErrorSeverity::Critical,
            ));
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        }
    };

    let port = match lookup("ROLLGATE_PORT") {
        Some(port_str) => match port_str.parse::<u16>() {
            Ok(port) => {
                if port < 1024 && port != 0 {
                    warnings.push(EnvValidationError::new(
                        "ROLLGATE_PORT",
                        format!("Using privileged port {}, may require root privileges", port),
                        ErrorSeverity::Warning,
                    ));
                }
                port
            }
            Err(_) => {
                errors.push(EnvValidationError::new(
                    "ROLLGATE_PORT",
                    format!("Invalid port number: {}", port_str),
                    ErrorSeverity::Critical,
                ));
                DEFAULT_PORT
            }
        },
        None => {
            warnings.push(EnvValidationError::new(
                "ROLLGATE_PORT",
                format!("Using default port {}", DEFAULT_PORT),
                ErrorSeverity::Info,
            ));
            DEFAULT_PORT
        }
    };

    let bind_address = SocketAddr::new(ip, port);

    // Security configuration
    let api_token = match lookup("ROLLGATE_API_TOKEN") {
        Some(token) if !token.is_empty() => token,
        _ => {
            warnings.push(EnvValidationError::new(
                "ROLLGATE_API_TOKEN",
                "No API token configured. Every /services request will be rejected.",
                ErrorSeverity::Warning,
            ));
            String::new()
        }
    };

    // Database configuration
    let db_config_path = lookup("ROLLGATE_DB_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            warnings.push(EnvValidationError::new(
                "ROLLGATE_DB_CONFIG",
                format!("Using default database config '{}'", DEFAULT_DB_CONFIG),
                ErrorSeverity::Info,
            ));
            PathBuf::from(DEFAULT_DB_CONFIG)
        });

    // Logging configuration
    let log_level = lookup("ROLLGATE_LOG_LEVEL")
        .or_else(|| lookup("RUST_LOG"))
        .unwrap_or_else(|| {
            warnings.push(EnvValidationError::new(
                "RUST_LOG/ROLLGATE_LOG_LEVEL",
                format!("Using default log level '{}'", DEFAULT_LOG_FILTER),
                ErrorSeverity::Info,
            ));
            DEFAULT_LOG_FILTER.to_string()
        });

    let file_log_level = parse_env_var_with_default(
        &lookup,
        "ROLLGATE_FILE_LOG_LEVEL",
        Severity::Info,
        &mut warnings,
    );

    let log_root = lookup("ROLLGATE_LOG_ROOT")
        .filter(|root| !root.is_empty())
        .map(PathBuf::from);

    let packaged =
        parse_bool_env_var_with_default(&lookup, "ROLLGATE_PACKAGED", false, &mut warnings);

    if packaged && log_root.is_some() {
        warnings.push(EnvValidationError::new(
            "ROLLGATE_PACKAGED/ROLLGATE_LOG_ROOT",
            "Both set; ROLLGATE_LOG_ROOT takes precedence",
            ErrorSeverity::Info,
        ));
    }

    // Warnings are reported alongside errors
    errors.extend(warnings);

    let has_critical_errors = errors.iter().any(|e| e.severity == ErrorSeverity::Critical);
    if has_critical_errors {
        return Err(errors);
    }

    for error in &errors {
        match error.severity {
            ErrorSeverity::Warning => warn!("{}: {}", error.variable, error.message),
            ErrorSeverity::Info => info!("{}: {}", error.variable, error.message),
            ErrorSeverity::Critical => {}
        }
    }

    Ok(AppConfig {
        host,
        port,
        bind_address,
        api_token,
        db_config_path,
        log_level,
        file_log_level,
        log_root,
        packaged,
    })
}

/// Print environment validation results in a user-friendly format
pub fn print_validation_results(result: &Result<AppConfig, Vec<EnvValidationError>>) {
    match result {
        Ok(config) => {
            println!("Environment validation successful");
            println!("Configuration:");
            println!("  Server: {}", config.bind_address);
            println!(
                "  API Token: {}",
                if config.api_token.is_empty() { "not set" } else { "set" }
            );
            println!("  Database Config: {}", config.db_config_path.display());
            println!("  Console Log Level: {}", config.log_level);
            println!("  File Log Level: {}", config.file_log_level);
            match config.log_root {
                Some(ref root) => println!("  Log Root: {}", root.display()),
                None if config.packaged => println!("  Log Root: <executable dir>/log"),
                None => println!("  Log Root: ./log"),
            }
        }
        Err(errors) => {
            let critical_count = errors
                .iter()
                .filter(|e| e.severity == ErrorSeverity::Critical)
                .count();
            let warning_count = errors
                .iter()
                .filter(|e| e.severity == ErrorSeverity::Warning)
                .count();
            let info_count = errors
                .iter()
                .filter(|e| e.severity == ErrorSeverity::Info)
                .count();

            eprintln!(
                "Environment validation failed with {} critical error(s), {} warning(s), {} info message(s):",
                critical_count, warning_count, info_count
            );

            for error in errors {
                let prefix = match error.severity {
                    ErrorSeverity::Critical => "❌ CRITICAL",
                    ErrorSeverity::Warning => "⚠️  WARNING",
                    ErrorSeverity::Info => "ℹ️  INFO",
                };
                println!("  {} - {}: {}", prefix, error.variable, error.message);
            }
        }
    }
}

/// Generate example environment configuration file
pub fn generate_env_example() -> String {
    format!(
        r#"# rollgate Environment Configuration
# Copy this file to .env and customize the values for your deployment

# =============================================================================
# Server Configuration
# =============================================================================

# Server bind address
# Default: {host}
# Examples:
#   ROLLGATE_HOST=0.0.0.0    # All interfaces
#   ROLLGATE_HOST=127.0.0.1  # Localhost only
ROLLGATE_HOST={host}

# Server port
# Default: {port}
# Note: Ports below 1024 may require root privileges
ROLLGATE_PORT={port}

# =============================================================================
# Security Configuration
# =============================================================================

# Pre-shared key, sent by clients in the x-token header
# Requests to /services are rejected while this is unset
# Generate with: openssl rand -hex 32
# ROLLGATE_API_TOKEN=change-me

# =============================================================================
# Database Configuration
# =============================================================================

# YAML file with a connection_string entry
# Default: {db_config}
ROLLGATE_DB_CONFIG={db_config}

# =============================================================================
# Logging Configuration
# =============================================================================

# Console log filter
# Default: {log_filter}
# Examples:
#   RUST_LOG=debug                             # Everything at debug level
#   RUST_LOG=rollgate=debug,tower_http=info    # Custom per-module levels
#   ROLLGATE_LOG_LEVEL=info                    # Override for rollgate only
RUST_LOG={log_filter}

# Threshold for the rotated log files: DEBUG, INFO, WARNING, ERROR, CRITICAL
# Default: INFO
ROLLGATE_FILE_LOG_LEVEL=INFO

# Directory for log files, rotated weekly on Monday and zipped
# Default: ./log
# ROLLGATE_LOG_ROOT=/var/log/rollgate

# Log next to the executable when no log root is set
# Default: false
ROLLGATE_PACKAGED=false
"#,
        host = DEFAULT_HOST,
        port = DEFAULT_PORT,
        db_config = DEFAULT_DB_CONFIG,
        log_filter = DEFAULT_LOG_FILTER,
    )
}

/// Parse `var_name` with `FromStr`, falling back to `default` with a warning
fn parse_env_var_with_default<T, F>(
    lookup: &F,
    var_name: &str,
    default: T,
    warnings: &mut Vec<EnvValidationError>,
) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Clone + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match lookup(var_name) {
        Some(value_str) => match value_str.parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warnings.push(EnvValidationError::new(
                    var_name,
                    format!("Invalid value '{}': {}. Using default: {}", value_str, e, default),
                    ErrorSeverity::Warning,
                ));
                default
            }
        },
        None => {
            warnings.push(EnvValidationError::new(
                var_name,
                format!("Using default value: {}", default),
                ErrorSeverity::Info,
            ));
            default
        }
    }
}

/// Accepts true/false, 1/0, yes/no and on/off
fn parse_bool_env_var_with_default<F>(
    lookup: &F,
    var_name: &str,
    default: bool,
    warnings: &mut Vec<EnvValidationError>,
) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        Some(value_str) => match value_str.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => {
                warnings.push(EnvValidationError::new(
                    var_name,
                    format!("Invalid boolean value '{}'. Using default: {}", value_str, default),
                    ErrorSeverity::Warning,
                ));
                default
            }
        },
        None => {
            warnings.push(EnvValidationError::new(
                var_name,
                format!("Using default value: {}", default),
                ErrorSeverity::Info,
            ));
            default
        }
    }
}
