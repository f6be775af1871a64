//! Server module for rollgate.
//!
//! Binds the configured address, serves the router until a shutdown signal
//! arrives, then flushes every log file and closes the database pool.
//!
//! # Usage
//!
//! ```rust
//! let state = AppState::new(db, registry, config)?;
//! start_server(state).await?;
//! ```

pub mod shutdown;

use self::shutdown::ShutdownCoordinator;
use crate::AppState;
use crate::routing::router::create_router;
use std::error::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

pub type ServerError = Box<dyn Error + Send + Sync>;

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Start the server with graceful shutdown on Ctrl+C / SIGTERM
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let coordinator = ShutdownCoordinator::new();

    let listener = TcpListener::bind(state.config.bind_address).await?;
    info!("Rollgate listening on {}", listener.local_addr()?);

    let signal_listener = coordinator.clone();
    tokio::spawn(async move {
        signal_listener.wait_for_shutdown_signal().await;
    });

    serve(listener, state, coordinator).await
}

/// Serve on an already-bound listener until `coordinator` signals shutdown
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    coordinator: ShutdownCoordinator,
) -> Result<(), ServerError> {
    let app = create_router(state.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { coordinator.wait_for_shutdown().await })
        .await?;

    info!("Server stopped, flushing logs");
    if let Err(e) = state.registry.flush_all() {
        error!("Failed to flush log files on shutdown: {}", e);
    }
    state.db.close().await;

    info!("Graceful shutdown completed");
    Ok(())
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
