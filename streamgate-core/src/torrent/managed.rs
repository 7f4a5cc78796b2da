//! Managed torrent record shared between the registry and HTTP handlers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{InfoHash, MetadataState, TorrentFile, TorrentInfo};
use crate::GatewayError;
use crate::engine::{EngineTorrent, FileReader};

/// A torrent under management.
///
/// Holds a non-owning association with the engine's handle: the engine owns
/// transfer state, this record owns the lifecycle state as seen by callers.
pub struct Torrent {
    handle: Arc<dyn EngineTorrent>,
    state: Mutex<MetadataState>,
    added_at: DateTime<Utc>,
}

impl Torrent {
    /// Wraps an engine handle in the `Adding` state.
    pub fn new(handle: Arc<dyn EngineTorrent>) -> Self {
        Self {
            handle,
            state: Mutex::new(MetadataState::Adding),
            added_at: Utc::now(),
        }
    }

    pub fn info_hash(&self) -> InfoHash {
        self.handle.info_hash()
    }

    /// Torrent name from metadata, falling back to the magnet display name
    /// and then to the info hash.
    pub fn name(&self) -> String {
        if let Some(info) = self.handle.info() {
            return info.name.clone();
        }
        self.handle
            .display_name()
            .unwrap_or_else(|| self.info_hash().to_string())
    }

    pub fn state(&self) -> MetadataState {
        *self.state.lock()
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// Metadata if it is already known.
    pub fn info(&self) -> Option<Arc<TorrentInfo>> {
        self.handle.info()
    }

    /// Files in listing order; empty until metadata is ready.
    pub fn files(&self) -> Vec<TorrentFile> {
        self.info()
            .map(|info| info.files.clone())
            .unwrap_or_default()
    }

    /// Timestamp used for `Last-Modified`: the metafile creation date when
    /// present, otherwise the moment the torrent was added.
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.info()
            .and_then(|info| info.creation_date)
            .unwrap_or(self.added_at)
    }

    /// Moves the lifecycle forward. Returns false if the transition is not
    /// allowed from the current state.
    pub(crate) fn advance(&self, next: MetadataState) -> bool {
        let mut state = self.state.lock();
        if state.can_advance_to(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    /// Waits until the metadata-ready event fired, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// - `GatewayError::NotFound` - If the torrent was dropped
    /// - `GatewayError::Timeout` - If metadata did not arrive in time
    /// - `GatewayError::Engine` - If the engine failed while waiting
    pub async fn wait_ready(&self, timeout: Duration) -> Result<Arc<TorrentInfo>, GatewayError> {
        if self.state() == MetadataState::Dropped {
            return Err(GatewayError::not_found(format!(
                "torrent {}",
                self.info_hash()
            )));
        }

        let info = tokio::time::timeout(timeout, self.handle.wait_metadata())
            .await
            .map_err(|_| GatewayError::Timeout {
                operation: format!("metadata of {}", self.info_hash()),
                after: timeout,
            })??;

        if self.advance(MetadataState::Ready) {
            tracing::info!(
                "Metadata ready for {} ({} files)",
                self.info_hash(),
                info.files.len()
            );
        }
        Ok(info)
    }

    /// Opens a range reader on one of the torrent's files.
    ///
    /// # Errors
    ///
    /// - `GatewayError::NotFound` - If the metadata has no such file
    /// - `GatewayError::Engine` - If the engine refused to open it
    pub fn open_file(&self, file: &TorrentFile) -> Result<Arc<dyn FileReader>, GatewayError> {
        Ok(self.handle.open_file(file.index)?)
    }

    /// Marks the torrent dropped and tells the engine to release it.
    ///
    /// Does nothing for a torrent that is already dropped or was never
    /// registered; see [`Torrent::discard`] for the latter.
    pub(crate) fn release(&self) -> Result<(), GatewayError> {
        if !self.advance(MetadataState::Dropped) {
            return Ok(());
        }
        tracing::info!("Dropping torrent {}", self.info_hash());
        Ok(self.handle.drop_torrent()?)
    }

    /// Releases the engine handle of a record the registry rejected. The
    /// record stays in `Adding`.
    pub(crate) fn discard(&self) -> Result<(), GatewayError> {
        tracing::debug!("Discarding unregistered torrent {}", self.info_hash());
        Ok(self.handle.drop_torrent()?)
    }

    /// Whether both records wrap the same engine handle.
    pub(crate) fn shares_handle(&self, other: &Torrent) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }
}

impl std::fmt::Debug for Torrent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Torrent")
            .field("info_hash", &self.info_hash())
            .field("state", &self.state())
            .field("added_at", &self.added_at)
            .finish()
    }
}
