//! Reference analysis service.
//!
//! A loopback implementation of the wire contract the capture client speaks,
//! for development and end-to-end tests. Frames that arrive too quickly for a
//! session are debounced: the newest one is kept, answered with `202`, and
//! processed once the session has been quiet for the debounce delay.
//!
//! ```text
//! +------------------------------------------------+
//! |  Axum HTTP Server                              |
//! |  /health (GET)            -> health check      |
//! |  /analyze_emotion/ (POST) -> 200 ok | 202      |
//! |  /get_result/ (GET)       -> ok|pending|none   |
//! +------------------------------------------------+
//!          |
//!          v
//! +------------------------------------------------+
//! |  SlotRegistry (DashMap)                        |
//! |    +-- "session-a": last result, pending frame |
//! |    +-- "default":   ...                        |
//! +------------------------------------------------+
//! ```
//!
//! This module is only available with the `server` feature.

mod analyzer;
mod handlers;
mod slots;
pub mod types;

pub use analyzer::{FrameAnalyzer, StaticAnalyzer};
pub use handlers::{AppState, ServerConfig};
pub use slots::{Admission, SlotRegistry, DEFAULT_SESSION};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How often idle sessions are swept.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Start the service on `127.0.0.1:port` (0 picks a free port).
///
/// Returns the bound address and a token that shuts the server down.
pub async fn start_server(
    port: u16,
    config: ServerConfig,
    analyzer: Arc<dyn FrameAnalyzer>,
) -> anyhow::Result<(SocketAddr, CancellationToken)> {
    let (state, shutdown_token) = AppState::new(config, analyzer);

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Analysis service listening on {}", actual_addr);

    spawn_cleanup(state.clone(), shutdown_token.clone());

    let server_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(server_shutdown.cancelled_owned())
            .await
        {
            tracing::error!("Server error: {}", e);
        }
        state.slots.cancel_all();
    });

    Ok((actual_addr, shutdown_token))
}

/// Periodically drop sessions idle for longer than the configured TTL.
fn spawn_cleanup(state: Arc<AppState>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let cleaned = state.slots.cleanup_idle(Instant::now(), state.config.session_ttl);
                    if cleaned > 0 {
                        tracing::info!("Cleaned up {} idle sessions", cleaned);
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("Session cleanup task shutting down");
                    break;
                }
            }
        }
    });
}

/// Run the service until Ctrl-C.
pub async fn serve_until_ctrl_c(
    port: u16,
    config: ServerConfig,
    analyzer: Arc<dyn FrameAnalyzer>,
) -> anyhow::Result<()> {
    let (addr, shutdown) = start_server(port, config, analyzer).await?;
    eprintln!("Analysis service listening on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down analysis service");
    shutdown.cancel();
    Ok(())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/analyze_emotion/", post(handlers::analyze_emotion))
        .route("/get_result/", get(handlers::get_result))
        .with_state(state)
}
