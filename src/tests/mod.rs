//! Shared test fixtures for the rollgate unit tests
use crate::AppState;
use crate::database::DatabaseManager;
use crate::env::validate_with;
use crate::logging::{LoggerRegistry, RegistryConfig};
use crate::routing::router::create_router;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

/// State backed by an in-memory database, logging under `log_root`
pub(crate) async fn test_state(log_root: &Path, token: &str) -> AppState {
    let vars = HashMap::from([
        ("ROLLGATE_API_TOKEN", token.to_string()),
        ("ROLLGATE_HOST", "127.0.0.1".to_string()),
        ("ROLLGATE_PORT", "0".to_string()),
    ]);
    let config = validate_with(|name| vars.get(name).cloned()).unwrap();

    let db = DatabaseManager::connect_with_file_creation("sqlite::memory:")
        .await
        .unwrap();
    let registry = Arc::new(LoggerRegistry::new(RegistryConfig::new(log_root)));

    AppState::new(db, registry, config).unwrap()
}

/// Serve the router on an ephemeral port and return its base URL
pub(crate) async fn spawn_app(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}
