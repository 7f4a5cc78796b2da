//! Torrent ingestion from magnet links, remote metafiles and local paths

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::config::GatewayConfig;
use crate::engine::{EngineTorrent, TorrentEngine};
use crate::registry::TorrentRegistry;
use crate::torrent::Torrent;
use crate::{GatewayError, Result};

/// Where a torrent comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    Magnet(String),
    Url(String),
    File(PathBuf),
}

impl TorrentSource {
    /// Classifies a user-supplied source string, first match wins:
    /// `magnet` prefix, then an `http://` or `https://` marker, then a path.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Validation` - If the source is blank
    pub fn classify(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(GatewayError::Validation {
                reason: "Torrent source is empty".to_string(),
            });
        }

        if source.starts_with("magnet:") {
            Ok(TorrentSource::Magnet(source.to_string()))
        } else if source.contains("http://") || source.contains("https://") {
            Ok(TorrentSource::Url(source.to_string()))
        } else {
            Ok(TorrentSource::File(PathBuf::from(source)))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TorrentSource::Magnet(_) => "magnet",
            TorrentSource::Url(_) => "url",
            TorrentSource::File(_) => "file",
        }
    }
}

/// Adds torrents to the engine and the registry.
pub struct TorrentAdder {
    engine: Arc<dyn TorrentEngine>,
    registry: Arc<TorrentRegistry>,
    http: reqwest::Client,
    metadata_timeout: Duration,
}

impl TorrentAdder {
    /// Creates an adder using the timeouts and user agent from `config`.
    ///
    /// # Panics
    ///
    /// Panics if HTTP client creation fails due to invalid configuration.
    /// This should never happen with valid timeout and user agent values.
    pub fn new(
        engine: Arc<dyn TorrentEngine>,
        registry: Arc<TorrentRegistry>,
        config: &GatewayConfig,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.network.download_timeout)
            .user_agent(config.network.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .expect("HTTP client creation should not fail");

        Self {
            engine,
            registry,
            http,
            metadata_timeout: config.torrent.metadata_timeout,
        }
    }

    /// Adds a torrent and waits for its metadata, bounded by the configured
    /// metadata timeout.
    ///
    /// # Errors
    ///
    /// See [`TorrentAdder::add_torrent_within`].
    pub async fn add_torrent(&self, source: &str) -> Result<Arc<Torrent>> {
        self.add_torrent_within(source, self.metadata_timeout).await
    }

    /// Adds a torrent and waits at most `timeout` for its metadata.
    ///
    /// On success the torrent is `Ready` and registered. On failure, and when
    /// the returned future is dropped early, nothing stays registered.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Validation` - If the source is blank
    /// - `GatewayError::Download` - If a remote metafile could not be fetched
    /// - `GatewayError::Duplicate` - If the torrent is already managed
    /// - `GatewayError::Timeout` - If metadata did not arrive in time
    /// - `GatewayError::Engine` - If the engine rejected the source
    pub async fn add_torrent_within(&self, source: &str, timeout: Duration) -> Result<Arc<Torrent>> {
        let source = TorrentSource::classify(source)?;
        tracing::debug!("Adding torrent from {} source", source.kind());

        let handle = match &source {
            TorrentSource::Magnet(link) => self.engine.add_magnet(link).await?,
            TorrentSource::File(path) => self.engine.add_metainfo_file(path).await?,
            TorrentSource::Url(url) => {
                let metafile = self.download_metafile(url).await?;
                self.engine.add_metainfo_file(metafile.path()).await?
            }
        };

        self.register_and_wait(handle, timeout).await
    }

    async fn register_and_wait(
        &self,
        handle: Arc<dyn EngineTorrent>,
        timeout: Duration,
    ) -> Result<Arc<Torrent>> {
        let torrent = Arc::new(Torrent::new(handle));
        if let Err(e) = self.registry.add(Arc::clone(&torrent)) {
            // Some engines hand back the live handle when a torrent is added
            // twice; that one belongs to the registered torrent.
            let registered = self.registry.find_by_info_hash(&torrent.info_hash());
            if registered.is_some_and(|existing| existing.shares_handle(&torrent)) {
                tracing::debug!(
                    "Engine returned the handle of managed torrent {}",
                    torrent.info_hash()
                );
            } else if let Err(release_error) = torrent.discard() {
                tracing::warn!("Failed to release rejected torrent: {}", release_error);
            }
            return Err(e);
        }

        let pending = PendingRegistration {
            registry: &self.registry,
            torrent: Some(Arc::clone(&torrent)),
        };
        let info = torrent.wait_ready(timeout).await?;
        pending.complete();

        tracing::info!(
            "Torrent {} ready: {} ({} files)",
            torrent.info_hash(),
            info.name,
            info.files.len()
        );
        Ok(torrent)
    }

    /// Downloads a remote metafile into a uniquely named temporary file.
    ///
    /// The file is deleted when the returned handle is dropped.
    async fn download_metafile(&self, url: &str) -> Result<NamedTempFile> {
        let download_error = |reason: String| GatewayError::Download {
            url: url.to_string(),
            reason,
        };

        let mut response = self.http.get(url).send().await.map_err(|e| {
            download_error(if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                "failed to connect".to_string()
            } else {
                e.to_string()
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP status {status}")));
        }
        let expected_length = response.content_length();

        let metafile = tempfile::Builder::new()
            .prefix("streamgate-")
            .suffix(".torrent")
            .tempfile()
            .map_err(|source| GatewayError::Storage {
                path: std::env::temp_dir(),
                source,
            })?;
        let storage_error = |source: std::io::Error| GatewayError::Storage {
            path: metafile.path().to_path_buf(),
            source,
        };

        let writer = metafile.as_file().try_clone().map_err(storage_error)?;
        let mut file = tokio::fs::File::from_std(writer);
        let mut received: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_error(e.to_string()))?
        {
            file.write_all(&chunk).await.map_err(storage_error)?;
            received += chunk.len() as u64;
        }
        file.flush().await.map_err(storage_error)?;

        if let Some(expected) = expected_length {
            if received != expected {
                return Err(download_error(format!(
                    "truncated body: received {received} of {expected} bytes"
                )));
            }
        }

        tracing::debug!(
            "Downloaded metafile {} ({} bytes) to {}",
            url,
            received,
            metafile.path().display()
        );
        Ok(metafile)
    }
}

/// Undoes a registration unless [`PendingRegistration::complete`] is called.
///
/// Covers both error returns and the add future being dropped mid-wait.
struct PendingRegistration<'a> {
    registry: &'a TorrentRegistry,
    torrent: Option<Arc<Torrent>>,
}

impl PendingRegistration<'_> {
    fn complete(mut self) {
        self.torrent = None;
    }
}

impl Drop for PendingRegistration<'_> {
    fn drop(&mut self) {
        if let Some(torrent) = self.torrent.take() {
            self.registry.remove_entry(&torrent);
        }
    }
}
