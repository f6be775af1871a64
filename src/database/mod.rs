//! # Database Module for rollgate
//!
//! Opens the service's persistent SQLite pool from a small YAML file:
//!
//! ```yaml
//! connection_string: sqlite://rollgate.db
//! ```
//!
//! The database file is created when missing and the connection is checked
//! with `SELECT 1` before the pool is handed out.

use serde::Deserialize;
use sqlx::{Sqlite, migrate::MigrateDatabase, sqlite::SqlitePool};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Contents of the database YAML file
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub connection_string: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to read database config '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid database config '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Owns the connection pool
#[derive(Debug, Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

impl DbConfig {
    pub fn load(path: &Path) -> Result<Self, DatabaseError> {
        let raw = fs::read_to_string(path).map_err(|source| DatabaseError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| DatabaseError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl DatabaseManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read the YAML config at `path` and connect
    pub async fn from_config_file(path: &Path) -> Result<Self, DatabaseError> {
        let config = DbConfig::load(path)?;
        Self::connect_with_file_creation(&config.connection_string).await
    }

    /// Connect to the database, creating the file if it doesn't exist
    pub async fn connect_with_file_creation(database_url: &str) -> Result<Self, DatabaseError> {
        info!("Opening database at {}", database_url);

        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            info!("Database does not exist at {}, creating it", database_url);
            Sqlite::create_database(database_url).await?;
        }

        let manager = Self::new(SqlitePool::connect(database_url).await?);
        manager.ping().await?;
        info!("Database ready");
        Ok(manager)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
