//! Streaming HTTP server
//!
//! One router per server instance; nothing is registered globally, so
//! several servers can run side by side in one process.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use streamgate_core::config::GatewayConfig;
use streamgate_core::{GatewayError, InfoHash, TorrentRegistry};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::handlers::{list_torrents, stream_torrent};

/// Tunables of the `/stream` endpoint.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Longest wait for a pending torrent's metadata per request
    pub readiness_timeout: Duration,
    pub chunk_size: usize,
    pub read_stall_timeout: Option<Duration>,
}

impl StreamSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            readiness_timeout: config.server.readiness_timeout,
            chunk_size: config.stream.chunk_size.max(1),
            read_stall_timeout: config.stream.read_stall_timeout,
        }
    }
}

/// Shared state of one server instance
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TorrentRegistry>,
    pub settings: StreamSettings,
    /// Port the server actually listens on, for building stream links
    pub port: u16,
}

/// Builds the router of one server instance.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/stream", get(stream_torrent))
        .route("/torrents", get(list_torrents))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Link under which a torrent is streamed.
pub fn stream_url(port: u16, info_hash: &InfoHash) -> String {
    format!("http://localhost:{port}/stream?ep={info_hash}")
}

/// Background server task with graceful shutdown.
pub struct StreamServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl StreamServer {
    /// Binds `addr` and serves in a background task.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Server` - If the address cannot be bound
    pub async fn start(
        addr: SocketAddr,
        registry: Arc<TorrentRegistry>,
        settings: StreamSettings,
    ) -> Result<Self, GatewayError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Server {
                reason: format!("Failed to bind {addr}: {e}"),
            })?;
        let local_addr = listener.local_addr().map_err(|e| GatewayError::Server {
            reason: format!("Failed to read bound address: {e}"),
        })?;

        let router = build_router(AppState {
            registry,
            settings,
            port: local_addr.port(),
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = &result {
                tracing::error!("Stream server failed: {}", e);
            }
            result
        });

        tracing::info!("Stream server listening on http://{}", local_addr);
        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections. In-flight streams keep running.
    pub fn stop_accepting(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }

    /// Stops the server, giving in-flight streams `grace` to finish before
    /// the server task is aborted.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Server` - If the server task had failed
    pub async fn shutdown(mut self, grace: Duration) -> Result<(), GatewayError> {
        self.stop_accepting();
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(Ok(()))) => {
                tracing::debug!("Stream server on {} stopped", self.local_addr);
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(GatewayError::Server {
                reason: e.to_string(),
            }),
            Ok(Err(e)) => Err(GatewayError::Server {
                reason: format!("Server task failed: {e}"),
            }),
            Err(_) => {
                tracing::warn!(
                    "Stream server on {} did not drain within {:?}, aborting",
                    self.local_addr,
                    grace
                );
                task.abort();
                Ok(())
            }
        }
    }
}

impl Drop for StreamServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
