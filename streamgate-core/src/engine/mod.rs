//! Torrent engine seam
//!
//! The gateway never speaks the BitTorrent wire protocol itself. It drives an
//! engine through these traits: add a torrent, wait for its metadata, read
//! byte ranges of its files, drop it. [`LocalEngine`] is the bundled
//! implementation backed by an on-disk piece store.

mod local;
pub mod magnet;
pub mod metainfo;
mod piece_store;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
pub use local::LocalEngine;
pub use piece_store::{PieceSet, PieceStore};

use crate::torrent::{InfoHash, TorrentInfo};

/// Operations the gateway needs from a torrent engine.
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Adds a torrent from a magnet link.
    ///
    /// The returned torrent may still be waiting for its metadata.
    ///
    /// # Errors
    /// - `EngineError::InvalidMagnet` - Malformed magnet URI
    /// - `EngineError::DuplicateTorrent` - Torrent already exists
    /// - `EngineError::Closed` - Engine was closed
    async fn add_magnet(&self, magnet_link: &str) -> Result<Arc<dyn EngineTorrent>, EngineError>;

    /// Adds a torrent from a metafile on disk.
    ///
    /// # Errors
    /// - `EngineError::InvalidMetainfo` - File is not a valid metafile
    /// - `EngineError::DuplicateTorrent` - Torrent already exists
    /// - `EngineError::Io` - File could not be read
    async fn add_metainfo_file(&self, path: &Path)
    -> Result<Arc<dyn EngineTorrent>, EngineError>;

    /// Releases every torrent and refuses further adds.
    ///
    /// Returns every error encountered; an empty vector is a clean close.
    async fn close(&self) -> Vec<EngineError>;
}

/// Engine-side handle of one torrent.
#[async_trait]
pub trait EngineTorrent: Send + Sync {
    fn info_hash(&self) -> InfoHash;

    /// Display name from the source, if any, before metadata is known.
    fn display_name(&self) -> Option<String>;

    /// Metadata if it already arrived.
    fn info(&self) -> Option<Arc<TorrentInfo>>;

    /// Resolves once metadata is available. Fires at most once per torrent;
    /// later calls resolve immediately with the same metadata.
    ///
    /// # Errors
    /// - `EngineError::TorrentDropped` - Torrent was dropped while waiting
    async fn wait_metadata(&self) -> Result<Arc<TorrentInfo>, EngineError>;

    /// Opens a range reader over the file at `index` in the file list.
    ///
    /// # Errors
    /// - `EngineError::MetadataPending` - Metadata is not known yet
    /// - `EngineError::FileIndexOutOfRange` - No such file
    fn open_file(&self, index: usize) -> Result<Arc<dyn FileReader>, EngineError>;

    /// Stops managing the torrent. Readers opened earlier keep working
    /// against data already stored, and reads waiting for missing pieces
    /// end with `EngineError::Closed`.
    ///
    /// # Errors
    /// - `EngineError::TorrentNotFound` - Already dropped
    fn drop_torrent(&self) -> Result<(), EngineError>;
}

/// Random access into one file of a torrent.
///
/// Reads wait until the pieces covering the range are stored, so callers
/// never observe bytes that have not been downloaded.
#[async_trait]
pub trait FileReader: Send + Sync {
    /// File size in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads `length` bytes starting at `offset`, truncated at end of file.
    ///
    /// Returns an empty buffer when `offset` is at or past the end.
    ///
    /// # Errors
    /// - `EngineError::Io` - Stored piece data could not be read
    /// - `EngineError::Closed` - Torrent state was torn down
    async fn read_at(&self, offset: u64, length: usize) -> Result<Bytes, EngineError>;
}

/// Errors reported by torrent engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid metainfo: {reason}")]
    InvalidMetainfo { reason: String },

    #[error("Invalid magnet link: {reason}")]
    InvalidMagnet { reason: String },

    #[error("Torrent {info_hash} already exists")]
    DuplicateTorrent { info_hash: InfoHash },

    #[error("Torrent {info_hash} not found")]
    TorrentNotFound { info_hash: InfoHash },

    #[error("Torrent {info_hash} was dropped")]
    TorrentDropped { info_hash: InfoHash },

    #[error("Metadata for {info_hash} is not available yet")]
    MetadataPending { info_hash: InfoHash },

    #[error("File index {index} out of range ({count} files)")]
    FileIndexOutOfRange { index: usize, count: usize },

    #[error("Piece {index} rejected: {reason}")]
    InvalidPiece { index: u32, reason: String },

    #[error("Engine is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
