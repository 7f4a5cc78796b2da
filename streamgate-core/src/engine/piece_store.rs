//! File-based piece storage
//!
//! Pieces are stored as individual files in a directory per info hash:
//! `<root>/<info hash>/piece_<n>`. The metafile of every torrent is cached
//! next to it as `<root>/<info hash>.torrent` so metadata survives restarts.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::EngineError;
use crate::torrent::{InfoHash, TorrentInfo};

/// Directory-backed store for verified piece data.
#[derive(Debug, Clone)]
pub struct PieceStore {
    root: PathBuf,
}

impl PieceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn torrent_dir(&self, info_hash: InfoHash) -> PathBuf {
        self.root.join(info_hash.to_string())
    }

    fn piece_path(&self, info_hash: InfoHash, index: u32) -> PathBuf {
        self.torrent_dir(info_hash).join(format!("piece_{index}"))
    }

    /// Location of the cached metafile for a torrent.
    pub fn metafile_path(&self, info_hash: InfoHash) -> PathBuf {
        self.root.join(format!("{info_hash}.torrent"))
    }

    /// Writes piece data, replacing any previous copy atomically.
    ///
    /// # Errors
    ///
    /// - `EngineError::Io` - If the file system operation failed
    pub async fn store_piece(
        &self,
        info_hash: InfoHash,
        index: u32,
        piece_bytes: &[u8],
    ) -> Result<(), EngineError> {
        let piece_path = self.piece_path(info_hash, index);
        fs::create_dir_all(self.torrent_dir(info_hash)).await?;

        let partial = piece_path.with_extension("part");
        fs::write(&partial, piece_bytes).await?;
        fs::rename(&partial, &piece_path).await?;
        Ok(())
    }

    /// Reads `length` bytes at `offset` inside a stored piece.
    ///
    /// # Errors
    ///
    /// - `EngineError::Io` - If the piece is missing or shorter than requested
    pub async fn read_piece_slice(
        &self,
        info_hash: InfoHash,
        index: u32,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, EngineError> {
        let mut file = fs::File::open(self.piece_path(info_hash, index)).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buffer = vec![0u8; length];
        file.read_exact(&mut buffer).await?;
        Ok(buffer)
    }

    /// Scans the store for pieces already written by an earlier run.
    ///
    /// A piece counts as present when its file exists with the expected size.
    pub async fn stored_pieces(&self, info: &TorrentInfo) -> PieceSet {
        let mut pieces = PieceSet::empty(info.piece_count());
        if fs::metadata(self.torrent_dir(info.info_hash)).await.is_err() {
            return pieces;
        }

        for index in 0..info.piece_count() {
            let stored_len = fs::metadata(self.piece_path(info.info_hash, index))
                .await
                .map(|meta| meta.len());
            if stored_len.is_ok_and(|len| len == info.piece_size(index)) {
                pieces.insert(index);
            }
        }
        pieces
    }

    /// Persists a metafile for later restarts.
    ///
    /// # Errors
    ///
    /// - `EngineError::Io` - If the file could not be written
    pub async fn cache_metafile(
        &self,
        info_hash: InfoHash,
        metafile: &[u8],
    ) -> Result<(), EngineError> {
        fs::write(self.metafile_path(info_hash), metafile).await?;
        Ok(())
    }

    /// Loads a cached metafile, if one exists.
    pub async fn cached_metafile(&self, info_hash: InfoHash) -> Option<Vec<u8>> {
        fs::read(self.metafile_path(info_hash)).await.ok()
    }
}

/// Completion bitmap of a torrent's pieces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PieceSet {
    completed: Vec<bool>,
}

impl PieceSet {
    pub fn empty(piece_count: u32) -> Self {
        Self {
            completed: vec![false; piece_count as usize],
        }
    }

    pub fn insert(&mut self, index: u32) -> bool {
        match self.completed.get_mut(index as usize) {
            Some(slot) if !*slot => {
                *slot = true;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, index: u32) -> bool {
        self.completed.get(index as usize).copied().unwrap_or(false)
    }

    /// True when every piece in `first..=last` is complete.
    pub fn contains_range(&self, first: u32, last: u32) -> bool {
        (first..=last).all(|index| self.contains(index))
    }

    pub fn completed_count(&self) -> usize {
        self.completed.iter().filter(|&&done| done).count()
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}
