//! Operational HTTP surface.
//!
//! A minimal server exposing the engine's health indicator for external
//! monitoring. Not part of the product API; the hosting application keeps
//! its own surface.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::application::services::EngineHealth;

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum HttpServerError {
    /// Could not bind the listen address.
    #[error("failed to bind health endpoint on {addr}: {source}")]
    Bind {
        /// Configured address.
        addr: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The server stopped with an error.
    #[error("health endpoint failed: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Clone)]
struct AppState {
    health_rx: watch::Receiver<EngineHealth>,
}

/// Build the health router.
#[must_use]
pub fn health_router(health_rx: watch::Receiver<EngineHealth>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/live", get(live))
        .with_state(AppState { health_rx })
}

/// Bind the health endpoint listener.
///
/// # Errors
///
/// Returns [`HttpServerError::Bind`] when the address is unusable.
pub async fn bind(addr: &str) -> Result<TcpListener, HttpServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| HttpServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serve the health endpoint until shutdown.
///
/// # Errors
///
/// Returns [`HttpServerError::Serve`] if the server fails.
pub async fn serve(
    listener: TcpListener,
    health_rx: watch::Receiver<EngineHealth>,
    shutdown: CancellationToken,
) -> Result<(), HttpServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, "health endpoint listening");
    }

    axum::serve(listener, health_router(health_rx))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<EngineHealth> {
    Json(state.health_rx.borrow().clone())
}

async fn live() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedMode;

    #[tokio::test]
    async fn serves_health_snapshot() {
        let (health_tx, health_rx) = watch::channel(EngineHealth::starting(FeedMode::Streaming));
        let shutdown = CancellationToken::new();

        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, health_rx, shutdown.clone()));

        health_tx.send_modify(|h| {
            h.active_triggers = 4;
            h.feed_mode = FeedMode::Polling;
        });

        let body: serde_json::Value =
            reqwest::get(format!("http://{addr}/health"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();

        assert_eq!(body["active_triggers"], 4);
        assert_eq!(body["feed_mode"], "polling");
        assert_eq!(body["consecutive_rebuild_failures"], 0);

        let live = reqwest::get(format!("http://{addr}/live"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(live, "ok");

        shutdown.cancel();
        let _ = server.await;
    }

    #[tokio::test]
    async fn bind_rejects_bad_address() {
        assert!(matches!(
            bind("999.999.999.999:0").await,
            Err(HttpServerError::Bind { .. })
        ));
    }
}
