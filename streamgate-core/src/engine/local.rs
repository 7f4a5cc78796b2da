//! Piece-store backed torrent engine
//!
//! `LocalEngine` keeps torrent metadata and piece data on disk under one data
//! directory. It does not talk to peers: metadata arrives either with a
//! metafile or through [`LocalEngine::supply_metadata`], and piece data
//! through [`LocalEngine::write_piece`]. Readers block until the pieces they
//! need are stored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::magnet::parse_magnet_link;
use super::metainfo::{encode_metafile, info_hash_of, parse_info_dict, parse_metainfo};
use super::piece_store::{PieceSet, PieceStore};
use super::{EngineError, EngineTorrent, FileReader, TorrentEngine};
use crate::torrent::{InfoHash, TorrentInfo};

type TorrentMap = RwLock<HashMap<InfoHash, Arc<LocalTorrent>>>;

/// Torrent engine backed by a local piece store.
pub struct LocalEngine {
    store: PieceStore,
    torrents: Arc<TorrentMap>,
    closed: AtomicBool,
}

impl LocalEngine {
    /// Opens an engine rooted at `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// - `EngineError::Io` - If the directory could not be created
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Arc<Self>, EngineError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir).await?;
        tracing::debug!("Local engine opened at {}", data_dir.display());

        Ok(Arc::new(Self {
            store: PieceStore::new(data_dir),
            torrents: Arc::new(RwLock::new(HashMap::new())),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn data_dir(&self) -> &Path {
        self.store.root()
    }

    /// Number of torrents currently managed by the engine.
    pub fn torrent_count(&self) -> usize {
        self.torrents.read().len()
    }

    /// Delivers the info dictionary of a torrent added by magnet link.
    ///
    /// The bytes must hash to the torrent's info hash. The first delivery
    /// wins; later ones are accepted and ignored.
    ///
    /// # Errors
    ///
    /// - `EngineError::TorrentNotFound` - If the torrent is not managed
    /// - `EngineError::InvalidMetainfo` - If the bytes do not match the hash or do not parse
    /// - `EngineError::Io` - If the metafile could not be cached
    pub async fn supply_metadata(
        &self,
        info_hash: InfoHash,
        info_bytes: &[u8],
    ) -> Result<(), EngineError> {
        let torrent = self.get(info_hash)?;
        let computed = info_hash_of(info_bytes);
        if computed != info_hash {
            return Err(EngineError::InvalidMetainfo {
                reason: format!("Info dictionary hashes to {computed}, expected {info_hash}"),
            });
        }

        let info = parse_info_dict(info_bytes, torrent.trackers.clone())?;
        self.store
            .cache_metafile(info_hash, &encode_metafile(info_bytes, &torrent.trackers))
            .await?;
        self.install(&torrent, info).await;
        Ok(())
    }

    /// Stores one piece of a torrent and wakes readers waiting for it.
    ///
    /// Only the piece size is checked; piece hashes are not verified.
    ///
    /// # Errors
    ///
    /// - `EngineError::TorrentNotFound` - If the torrent is not managed
    /// - `EngineError::MetadataPending` - If metadata has not arrived yet
    /// - `EngineError::InvalidPiece` - If the index or size is wrong
    /// - `EngineError::Io` - If the piece could not be written
    pub async fn write_piece(
        &self,
        info_hash: InfoHash,
        index: u32,
        piece_bytes: &[u8],
    ) -> Result<(), EngineError> {
        let torrent = self.get(info_hash)?;
        let info = torrent
            .info()
            .ok_or(EngineError::MetadataPending { info_hash })?;

        if index >= info.piece_count() {
            return Err(EngineError::InvalidPiece {
                index,
                reason: format!("torrent has {} pieces", info.piece_count()),
            });
        }
        let expected = info.piece_size(index);
        if piece_bytes.len() as u64 != expected {
            return Err(EngineError::InvalidPiece {
                index,
                reason: format!("expected {expected} bytes, got {}", piece_bytes.len()),
            });
        }

        self.store.store_piece(info_hash, index, piece_bytes).await?;
        torrent.pieces.send_modify(|pieces| {
            pieces.insert(index);
        });
        tracing::debug!("Piece {} stored for torrent {}", index, info_hash);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::Acquire) {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn get(&self, info_hash: InfoHash) -> Result<Arc<LocalTorrent>, EngineError> {
        self.torrents
            .read()
            .get(&info_hash)
            .cloned()
            .ok_or(EngineError::TorrentNotFound { info_hash })
    }

    /// Inserts a new torrent. The duplicate check and the insert happen
    /// under one write lock.
    fn register(
        &self,
        info_hash: InfoHash,
        display_name: Option<String>,
        trackers: Vec<String>,
    ) -> Result<Arc<LocalTorrent>, EngineError> {
        let mut torrents = self.torrents.write();
        if torrents.contains_key(&info_hash) {
            return Err(EngineError::DuplicateTorrent { info_hash });
        }

        let torrent = Arc::new(LocalTorrent::new(
            info_hash,
            display_name,
            trackers,
            self.store.clone(),
            Arc::downgrade(&self.torrents),
        ));
        torrents.insert(info_hash, Arc::clone(&torrent));
        Ok(torrent)
    }

    async fn install(&self, torrent: &LocalTorrent, info: TorrentInfo) {
        let stored = self.store.stored_pieces(&info).await;
        let completed = stored.completed_count();
        if torrent.install_metadata(Arc::new(info), stored) {
            tracing::info!(
                "Metadata installed for torrent {} ({} pieces already stored)",
                torrent.info_hash,
                completed
            );
        }
    }

    async fn cached_info(&self, info_hash: InfoHash) -> Option<TorrentInfo> {
        let bytes = self.store.cached_metafile(info_hash).await?;
        match parse_metainfo(&bytes) {
            Ok(info) if info.info_hash == info_hash => Some(info),
            Ok(_) | Err(_) => {
                tracing::warn!("Ignoring unusable cached metafile for {}", info_hash);
                None
            }
        }
    }
}

#[async_trait]
impl TorrentEngine for LocalEngine {
    async fn add_magnet(&self, magnet_link: &str) -> Result<Arc<dyn EngineTorrent>, EngineError> {
        self.ensure_open()?;
        let magnet = parse_magnet_link(magnet_link)?;
        let cached = self.cached_info(magnet.info_hash).await;

        let torrent = self.register(magnet.info_hash, magnet.display_name, magnet.trackers)?;
        tracing::info!("Added magnet torrent {}", torrent.info_hash);
        if let Some(info) = cached {
            self.install(&torrent, info).await;
        }
        Ok(torrent)
    }

    async fn add_metainfo_file(
        &self,
        path: &Path,
    ) -> Result<Arc<dyn EngineTorrent>, EngineError> {
        self.ensure_open()?;
        let metafile = tokio::fs::read(path).await?;
        let info = parse_metainfo(&metafile)?;

        let torrent = self.register(
            info.info_hash,
            Some(info.name.clone()),
            info.announce_urls.clone(),
        )?;
        if let Err(e) = self.store.cache_metafile(info.info_hash, &metafile).await {
            self.torrents.write().remove(&info.info_hash);
            return Err(e);
        }
        tracing::info!("Added torrent {} from {}", info.info_hash, path.display());
        self.install(&torrent, info).await;
        Ok(torrent)
    }

    async fn close(&self) -> Vec<EngineError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }

        let drained: Vec<_> = self.torrents.write().drain().map(|(_, t)| t).collect();
        for torrent in &drained {
            torrent.dropped.send_replace(true);
        }
        tracing::debug!("Local engine closed, released {} torrents", drained.len());
        Vec::new()
    }
}

/// Engine-side state of one torrent.
struct LocalTorrent {
    info_hash: InfoHash,
    display_name: Option<String>,
    trackers: Vec<String>,
    metadata: watch::Sender<Option<Arc<TorrentInfo>>>,
    pieces: watch::Sender<PieceSet>,
    dropped: watch::Sender<bool>,
    /// Serializes metadata installs
    install: Mutex<()>,
    store: PieceStore,
    registry: Weak<TorrentMap>,
}

impl LocalTorrent {
    fn new(
        info_hash: InfoHash,
        display_name: Option<String>,
        trackers: Vec<String>,
        store: PieceStore,
        registry: Weak<TorrentMap>,
    ) -> Self {
        Self {
            info_hash,
            display_name,
            trackers,
            metadata: watch::channel(None).0,
            pieces: watch::channel(PieceSet::default()).0,
            dropped: watch::channel(false).0,
            install: Mutex::new(()),
            store,
            registry,
        }
    }

    /// Publishes metadata exactly once. Returns false if it was already set.
    fn install_metadata(&self, info: Arc<TorrentInfo>, stored: PieceSet) -> bool {
        let _install = self.install.lock();
        if self.metadata.borrow().is_some() {
            return false;
        }
        // Pieces can only be written once metadata is visible, so the stored
        // set is published first.
        self.pieces.send_replace(stored);
        self.metadata.send_replace(Some(info));
        true
    }
}

#[async_trait]
impl EngineTorrent for LocalTorrent {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    fn display_name(&self) -> Option<String> {
        self.display_name.clone()
    }

    fn info(&self) -> Option<Arc<TorrentInfo>> {
        self.metadata.borrow().clone()
    }

    async fn wait_metadata(&self) -> Result<Arc<TorrentInfo>, EngineError> {
        if let Some(info) = self.info() {
            return Ok(info);
        }

        let mut metadata = self.metadata.subscribe();
        let mut dropped = self.dropped.subscribe();
        tokio::select! {
            ready = metadata.wait_for(Option::is_some) => {
                let info = ready.map(|info| info.clone()).map_err(|_| EngineError::Closed)?;
                info.ok_or(EngineError::Closed)
            }
            _ = dropped.wait_for(|dropped| *dropped) => Err(EngineError::TorrentDropped {
                info_hash: self.info_hash,
            }),
        }
    }

    fn open_file(&self, index: usize) -> Result<Arc<dyn FileReader>, EngineError> {
        let info = self.info().ok_or(EngineError::MetadataPending {
            info_hash: self.info_hash,
        })?;
        let file = info
            .files
            .get(index)
            .ok_or(EngineError::FileIndexOutOfRange {
                index,
                count: info.files.len(),
            })?;

        let (offset, length) = (file.offset, file.length);
        Ok(Arc::new(LocalFileReader {
            store: self.store.clone(),
            info,
            offset,
            length,
            pieces: self.pieces.subscribe(),
            dropped: self.dropped.subscribe(),
        }))
    }

    fn drop_torrent(&self) -> Result<(), EngineError> {
        if self.dropped.send_replace(true) {
            return Err(EngineError::TorrentNotFound {
                info_hash: self.info_hash,
            });
        }

        if let Some(torrents) = self.registry.upgrade() {
            let mut torrents = torrents.write();
            if torrents
                .get(&self.info_hash)
                .is_some_and(|existing| std::ptr::eq(Arc::as_ptr(existing), self))
            {
                torrents.remove(&self.info_hash);
            }
        }
        tracing::debug!("Engine released torrent {}", self.info_hash);
        Ok(())
    }
}

/// Reader over one file of a torrent, waiting for pieces as needed.
struct LocalFileReader {
    store: PieceStore,
    info: Arc<TorrentInfo>,
    /// Offset of the file within the torrent content
    offset: u64,
    length: u64,
    pieces: watch::Receiver<PieceSet>,
    dropped: watch::Receiver<bool>,
}

#[async_trait]
impl FileReader for LocalFileReader {
    fn len(&self) -> u64 {
        self.length
    }

    async fn read_at(&self, offset: u64, length: usize) -> Result<Bytes, EngineError> {
        if offset >= self.length || length == 0 {
            return Ok(Bytes::new());
        }

        let start = self.offset + offset;
        let end = self.offset + (offset + length as u64).min(self.length);
        let piece_length = self.info.piece_length;
        let first = (start / piece_length) as u32;
        let last = ((end - 1) / piece_length) as u32;

        // Pieces already stored stay readable after the torrent is dropped;
        // a read still waiting for missing ones ends.
        let mut pieces = self.pieces.clone();
        let mut dropped = self.dropped.clone();
        let available = tokio::select! {
            biased;
            ready = pieces.wait_for(|pieces| pieces.contains_range(first, last)) => ready.is_ok(),
            _ = dropped.wait_for(|dropped| *dropped) => false,
        };
        if !available {
            return Err(EngineError::Closed);
        }

        let mut buffer = BytesMut::with_capacity((end - start) as usize);
        let mut position = start;
        while position < end {
            let index = (position / piece_length) as u32;
            let piece_start = u64::from(index) * piece_length;
            let piece_end = (piece_start + self.info.piece_size(index)).min(end);
            let chunk = self
                .store
                .read_piece_slice(
                    self.info.info_hash,
                    index,
                    position - piece_start,
                    (piece_end - position) as usize,
                )
                .await?;
            buffer.extend_from_slice(&chunk);
            position = piece_end;
        }
        Ok(buffer.freeze())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_fixtures::{BuiltTorrent, TorrentFixture};

    fn show_fixture() -> BuiltTorrent {
        TorrentFixture::new("Show")
            .piece_length(16)
            .file("readme.txt", vec![b'r'; 10])
            .file("season/movie.mkv", (0..40).collect())
            .build()
    }

    async fn write_all_pieces(engine: &LocalEngine, fixture: &BuiltTorrent) {
        for (index, piece) in fixture.pieces.iter().enumerate() {
            engine
                .write_piece(fixture.info_hash, index as u32, piece)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_metafile_add_reads_across_pieces() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path().join("data")).await.unwrap();
        let fixture = show_fixture();
        let path = fixture.write_metafile(temp_dir.path());

        let torrent = engine.add_metainfo_file(&path).await.unwrap();
        assert_eq!(torrent.info_hash(), fixture.info_hash);
        assert!(torrent.info().is_some());
        write_all_pieces(&engine, &fixture).await;

        let reader = torrent.open_file(1).unwrap();
        assert_eq!(reader.len(), 40);
        // Bytes 4..24 of the file span pieces 0 and 1 of the torrent
        let bytes = reader.read_at(4, 20).await.unwrap();
        assert_eq!(&bytes[..], &fixture.content[14..34]);

        let tail = reader.read_at(35, 100).await.unwrap();
        assert_eq!(tail.len(), 5);
        assert!(reader.read_at(40, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let fixture = show_fixture();

        engine.add_magnet(&fixture.magnet_link()).await.unwrap();
        let result = engine.add_magnet(&fixture.magnet_link()).await;
        assert!(matches!(result, Err(EngineError::DuplicateTorrent { .. })));
        assert_eq!(engine.torrent_count(), 1);
    }

    #[tokio::test]
    async fn test_supply_metadata_wakes_waiters() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let fixture = show_fixture();

        let torrent = engine.add_magnet(&fixture.magnet_link()).await.unwrap();
        assert!(torrent.info().is_none());
        assert!(matches!(
            torrent.open_file(0),
            Err(EngineError::MetadataPending { .. })
        ));

        let waiter = {
            let torrent = Arc::clone(&torrent);
            tokio::spawn(async move { torrent.wait_metadata().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine
            .supply_metadata(fixture.info_hash, &fixture.info_bytes)
            .await
            .unwrap();

        let info = waiter.await.unwrap().unwrap();
        assert_eq!(info.files.len(), 2);
        // A second delivery is ignored
        engine
            .supply_metadata(fixture.info_hash, &fixture.info_bytes)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&info, &torrent.info().unwrap()));
    }

    #[tokio::test]
    async fn test_supply_metadata_rejects_wrong_hash() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let fixture = show_fixture();
        let other = TorrentFixture::new("other").single_file(vec![1u8; 3]).build();

        engine.add_magnet(&fixture.magnet_link()).await.unwrap();
        let result = engine
            .supply_metadata(fixture.info_hash, &other.info_bytes)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidMetainfo { .. })));
    }

    #[tokio::test]
    async fn test_read_waits_for_piece() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let fixture = show_fixture();
        let path = fixture.write_metafile(temp_dir.path());
        let torrent = engine.add_metainfo_file(&path).await.unwrap();
        let reader = torrent.open_file(1).unwrap();

        let pending = tokio::spawn(async move { reader.read_at(0, 6).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        engine
            .write_piece(fixture.info_hash, 0, &fixture.pieces[0])
            .await
            .unwrap();
        let bytes = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(&bytes[..], &fixture.content[10..16]);
    }

    #[tokio::test]
    async fn test_write_piece_checks_size() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let fixture = show_fixture();
        let path = fixture.write_metafile(temp_dir.path());
        engine.add_metainfo_file(&path).await.unwrap();

        let short = engine.write_piece(fixture.info_hash, 0, b"abc").await;
        assert!(matches!(short, Err(EngineError::InvalidPiece { index: 0, .. })));
        let out_of_range = engine.write_piece(fixture.info_hash, 9, b"abc").await;
        assert!(matches!(out_of_range, Err(EngineError::InvalidPiece { index: 9, .. })));
    }

    #[tokio::test]
    async fn test_restart_reuses_cached_metadata_and_pieces() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fixture = show_fixture();
        {
            let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
            engine.add_magnet(&fixture.magnet_link()).await.unwrap();
            engine
                .supply_metadata(fixture.info_hash, &fixture.info_bytes)
                .await
                .unwrap();
            write_all_pieces(&engine, &fixture).await;
            assert!(engine.close().await.is_empty());
        }

        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let torrent = engine.add_magnet(&fixture.magnet_link()).await.unwrap();
        let info = torrent.info().expect("metadata restored from cache");
        assert_eq!(info.name, "Show");

        let reader = torrent.open_file(1).unwrap();
        let bytes = tokio::time::timeout(Duration::from_secs(1), reader.read_at(0, 40))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&bytes[..], &fixture.content[10..]);
    }

    #[tokio::test]
    async fn test_drop_wakes_metadata_waiters() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let fixture = show_fixture();
        let torrent = engine.add_magnet(&fixture.magnet_link()).await.unwrap();

        let waiter = {
            let torrent = Arc::clone(&torrent);
            tokio::spawn(async move { torrent.wait_metadata().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        torrent.drop_torrent().unwrap();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(EngineError::TorrentDropped { .. })));
        assert_eq!(engine.torrent_count(), 0);
        assert!(torrent.drop_torrent().is_err());
    }

    #[tokio::test]
    async fn test_drop_ends_reads_waiting_for_pieces() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let fixture = show_fixture();
        let path = fixture.write_metafile(temp_dir.path());
        let torrent = engine.add_metainfo_file(&path).await.unwrap();
        engine
            .write_piece(fixture.info_hash, 0, &fixture.pieces[0])
            .await
            .unwrap();
        let reader = torrent.open_file(1).unwrap();

        let pending = {
            let reader = Arc::clone(&reader);
            tokio::spawn(async move { reader.read_at(0, 40).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        // The handle stays alive, so only the dropped flag can end the wait
        torrent.drop_torrent().unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(EngineError::Closed)));

        let stored = reader.read_at(0, 6).await.unwrap();
        assert_eq!(&stored[..], &fixture.content[10..16]);
        assert_eq!(torrent.info_hash(), fixture.info_hash);
    }

    #[tokio::test]
    async fn test_close_ends_reads_waiting_for_pieces() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let fixture = show_fixture();
        let path = fixture.write_metafile(temp_dir.path());
        let torrent = engine.add_metainfo_file(&path).await.unwrap();
        let reader = torrent.open_file(1).unwrap();

        let pending = tokio::spawn(async move { reader.read_at(0, 6).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(engine.close().await.is_empty());

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(EngineError::Closed)));
        assert!(torrent.info().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_metadata_delivery_keeps_written_pieces() {
        let fixture = show_fixture();
        let info_hash = fixture.info_hash;

        for _ in 0..20 {
            let temp_dir = tempfile::tempdir().unwrap();
            let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
            let torrent = engine.add_magnet(&fixture.magnet_link()).await.unwrap();

            let suppliers: Vec<_> = (0..4)
                .map(|_| {
                    let engine = Arc::clone(&engine);
                    let info_bytes = fixture.info_bytes.clone();
                    tokio::spawn(async move { engine.supply_metadata(info_hash, &info_bytes).await })
                })
                .collect();
            let writer = {
                let engine = Arc::clone(&engine);
                let pieces = fixture.pieces.clone();
                tokio::spawn(async move {
                    for (index, piece) in pieces.iter().enumerate() {
                        loop {
                            match engine.write_piece(info_hash, index as u32, piece).await {
                                Ok(()) => break,
                                Err(EngineError::MetadataPending { .. }) => {
                                    tokio::task::yield_now().await;
                                }
                                Err(e) => return Err(e),
                            }
                        }
                    }
                    Ok(())
                })
            };

            for supplier in suppliers {
                supplier.await.unwrap().unwrap();
            }
            writer.await.unwrap().unwrap();

            let reader = torrent.open_file(1).unwrap();
            let bytes = tokio::time::timeout(Duration::from_secs(1), reader.read_at(0, 40))
                .await
                .expect("every written piece is visible to readers")
                .unwrap();
            assert_eq!(&bytes[..], &fixture.content[10..]);
        }
    }

    #[tokio::test]
    async fn test_closed_engine_refuses_adds() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::open(temp_dir.path()).await.unwrap();
        let fixture = show_fixture();
        engine.add_magnet(&fixture.magnet_link()).await.unwrap();

        assert!(engine.close().await.is_empty());
        assert_eq!(engine.torrent_count(), 0);
        let result = engine.add_magnet(&fixture.magnet_link()).await;
        assert!(matches!(result, Err(EngineError::Closed)));
    }
}
