//! Streamgate Core - torrent ingestion and bookkeeping for the streaming gateway
//!
//! This crate owns everything below the HTTP layer: the torrent engine seam
//! and its bundled piece-store engine, the registry of managed torrents,
//! source classification and ingestion, playable file selection, data
//! directory resolution and configuration.

pub mod adder;
pub mod config;
pub mod engine;
pub mod registry;
pub mod selector;
pub mod storage_locator;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
pub mod torrent;
pub mod tracing_setup;

use std::path::PathBuf;
use std::time::Duration;

pub use adder::{TorrentAdder, TorrentSource};
pub use config::GatewayConfig;
pub use engine::{EngineError, EngineTorrent, FileReader, LocalEngine, TorrentEngine};
pub use registry::TorrentRegistry;
pub use selector::select_playable_file;
pub use storage_locator::resolve_data_dir;
pub use torrent::{InfoHash, MetadataState, Torrent, TorrentFile, TorrentInfo};

/// Errors surfaced by the gateway to library callers and HTTP handlers.
///
/// Every variant is returned to the immediate caller; none of them is fatal
/// to the process.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Engine error: {0}")]
    Engine(EngineError),

    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {after:?} waiting for {operation}")]
    Timeout { operation: String, after: Duration },

    #[error("Torrent {info_hash} is already managed")]
    Duplicate { info_hash: InfoHash },

    #[error("Server error: {reason}")]
    Server { reason: String },
}

impl GatewayError {
    /// Returns true when repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Download { .. } | GatewayError::Timeout { .. }
        )
    }

    /// Checks if this error is due to caller input rather than a failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GatewayError::Validation { .. } | GatewayError::NotFound { .. }
        )
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        GatewayError::NotFound { what: what.into() }
    }
}

impl From<EngineError> for GatewayError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::DuplicateTorrent { info_hash } => GatewayError::Duplicate { info_hash },
            EngineError::TorrentNotFound { info_hash }
            | EngineError::TorrentDropped { info_hash } => {
                GatewayError::not_found(format!("torrent {info_hash}"))
            }
            other => GatewayError::Engine(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
