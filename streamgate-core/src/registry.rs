//! Registry of torrents managed by one gateway client

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::torrent::{InfoHash, MetadataState, Torrent};
use crate::{GatewayError, Result};

/// Concurrent map from info hash to managed torrent.
///
/// The lock is held only for the map operation itself; callers get
/// `Arc<Torrent>` handles and never read torrent data under the lock.
#[derive(Debug, Default)]
pub struct TorrentRegistry {
    torrents: RwLock<HashMap<InfoHash, Arc<Torrent>>>,
}

impl TorrentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a torrent and moves it to `MetadataPending`.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Duplicate` - If a torrent with the same info hash exists
    pub fn add(&self, torrent: Arc<Torrent>) -> Result<()> {
        let info_hash = torrent.info_hash();
        {
            let mut torrents = self.torrents.write();
            if torrents.contains_key(&info_hash) {
                return Err(GatewayError::Duplicate { info_hash });
            }
            torrents.insert(info_hash, Arc::clone(&torrent));
        }
        torrent.advance(MetadataState::MetadataPending);
        tracing::debug!("Registered torrent {}", info_hash);
        Ok(())
    }

    pub fn find_by_info_hash(&self, info_hash: &InfoHash) -> Option<Arc<Torrent>> {
        self.torrents.read().get(info_hash).cloned()
    }

    /// Looks up a torrent by the canonical lowercase hex of its info hash.
    ///
    /// Anything that is not an exact canonical rendering misses.
    pub fn find_by_hex(&self, token: &str) -> Option<Arc<Torrent>> {
        let info_hash = InfoHash::from_hex(token).ok()?;
        self.find_by_info_hash(&info_hash)
    }

    /// Snapshot of all torrents, ordered by the time they were added.
    pub fn list(&self) -> Vec<Arc<Torrent>> {
        let mut torrents: Vec<_> = self.torrents.read().values().cloned().collect();
        torrents.sort_by_key(|torrent| torrent.added_at());
        torrents
    }

    /// Removes a torrent, marks it dropped and releases it in the engine.
    ///
    /// # Errors
    ///
    /// - `GatewayError::NotFound` - If no such torrent is registered
    /// - `GatewayError::Engine` - If the engine failed to release it
    pub fn remove(&self, info_hash: &InfoHash) -> Result<Arc<Torrent>> {
        let torrent = self
            .torrents
            .write()
            .remove(info_hash)
            .ok_or_else(|| GatewayError::not_found(format!("torrent {info_hash}")))?;
        torrent.release()?;
        Ok(torrent)
    }

    /// Removes `torrent` only if it is still the registered entry for its hash.
    ///
    /// Used to undo a registration that did not complete.
    pub(crate) fn remove_entry(&self, torrent: &Arc<Torrent>) {
        let info_hash = torrent.info_hash();
        let removed = {
            let mut torrents = self.torrents.write();
            match torrents.get(&info_hash) {
                Some(current) if Arc::ptr_eq(current, torrent) => torrents.remove(&info_hash),
                _ => None,
            }
        };
        if removed.is_some() {
            tracing::debug!("Unregistered incomplete torrent {}", info_hash);
        }
        if let Err(e) = torrent.release() {
            tracing::warn!("Failed to release incomplete torrent {}: {}", info_hash, e);
        }
    }

    /// Removes and releases every torrent, collecting release errors.
    pub fn drain(&self) -> Vec<GatewayError> {
        let drained: Vec<_> = self.torrents.write().drain().map(|(_, t)| t).collect();
        drained
            .iter()
            .filter_map(|torrent| torrent.release().err())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.torrents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.read().is_empty()
    }
}
