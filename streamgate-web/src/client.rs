//! Gateway client lifecycle
//!
//! A [`GatewayClient`] owns one engine, one registry and one streaming
//! server. Several clients can live in one process as long as they use
//! different ports and data directories.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use streamgate_core::{
    GatewayConfig, GatewayError, LocalEngine, Result, Torrent, TorrentAdder, TorrentEngine,
    TorrentRegistry, resolve_data_dir,
};

use crate::server::{StreamServer, StreamSettings, stream_url};

/// Running gateway: torrent ingestion plus the `/stream` endpoint.
pub struct GatewayClient {
    config: GatewayConfig,
    data_dir: PathBuf,
    engine: Arc<dyn TorrentEngine>,
    registry: Arc<TorrentRegistry>,
    adder: TorrentAdder,
    server: StreamServer,
}

impl GatewayClient {
    /// Resolves the data directory, opens the bundled local engine on it and
    /// starts serving.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Validation` - If the client name is not a valid directory name
    /// - `GatewayError::Storage` - If the data directory could not be created
    /// - `GatewayError::Engine` - If the engine could not be opened
    /// - `GatewayError::Server` - If the configured address cannot be bound
    pub async fn init(config: GatewayConfig) -> Result<Self> {
        let data_dir = data_dir_for(&config)?;
        let engine = LocalEngine::open(&data_dir).await?;
        Self::launch(config, data_dir, engine).await
    }

    /// Starts serving with an injected engine.
    ///
    /// The data directory is still resolved so that it exists and is
    /// reported by [`GatewayClient::data_dir`].
    ///
    /// # Errors
    ///
    /// - `GatewayError::Validation` - If the client name is not a valid directory name
    /// - `GatewayError::Storage` - If the data directory could not be created
    /// - `GatewayError::Server` - If the configured address cannot be bound
    pub async fn start(config: GatewayConfig, engine: Arc<dyn TorrentEngine>) -> Result<Self> {
        let data_dir = data_dir_for(&config)?;
        Self::launch(config, data_dir, engine).await
    }

    async fn launch(
        config: GatewayConfig,
        data_dir: PathBuf,
        engine: Arc<dyn TorrentEngine>,
    ) -> Result<Self> {
        let registry = Arc::new(TorrentRegistry::new());
        let server = match StreamServer::start(
            config.bind_addr(),
            Arc::clone(&registry),
            StreamSettings::from_config(&config),
        )
        .await
        {
            Ok(server) => server,
            Err(e) => {
                for close_error in engine.close().await {
                    tracing::warn!("Engine close after failed start: {}", close_error);
                }
                return Err(e);
            }
        };
        let adder = TorrentAdder::new(Arc::clone(&engine), Arc::clone(&registry), &config);

        tracing::info!(
            "Gateway client '{}' started on {} with data in {}",
            config.client.name,
            server.local_addr(),
            data_dir.display()
        );
        Ok(Self {
            config,
            data_dir,
            engine,
            registry,
            adder,
            server,
        })
    }

    /// Adds a torrent from a magnet link, an HTTP(S) metafile URL or a
    /// local metafile path and waits for its metadata.
    ///
    /// # Errors
    ///
    /// See [`TorrentAdder::add_torrent_within`].
    pub async fn add_torrent(&self, source: &str) -> Result<Arc<Torrent>> {
        self.adder.add_torrent(source).await
    }

    /// Like [`GatewayClient::add_torrent`] with an explicit metadata deadline.
    ///
    /// # Errors
    ///
    /// See [`TorrentAdder::add_torrent_within`].
    pub async fn add_torrent_within(&self, source: &str, timeout: Duration) -> Result<Arc<Torrent>> {
        self.adder.add_torrent_within(source, timeout).await
    }

    /// Looks a torrent up by its canonical hex info hash.
    ///
    /// # Errors
    ///
    /// - `GatewayError::NotFound` - If no managed torrent has that hash
    pub fn find_by_info_hash(&self, info_hash: &str) -> Result<Arc<Torrent>> {
        self.registry
            .find_by_hex(info_hash)
            .ok_or_else(|| GatewayError::NotFound {
                what: format!("torrent {info_hash}"),
            })
    }

    /// Snapshot of the managed torrents, oldest first.
    pub fn list_torrents(&self) -> Vec<Arc<Torrent>> {
        self.registry.list()
    }

    /// Stops managing a torrent. Streams already in flight can still read
    /// stored pieces but no longer wait for missing ones.
    ///
    /// # Errors
    ///
    /// - `GatewayError::NotFound` - If the torrent is not managed
    /// - `GatewayError::Engine` - If the engine failed to release it
    pub fn drop_torrent(&self, torrent: &Torrent) -> Result<()> {
        self.registry.remove(&torrent.info_hash())?;
        Ok(())
    }

    /// Link under which `torrent` is streamed by this client.
    pub fn stream_url(&self, torrent: &Torrent) -> String {
        stream_url(self.port(), &torrent.info_hash())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn port(&self) -> u16 {
        self.server.local_addr().port()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Shuts the client down and returns every error encountered.
    ///
    /// New connections are refused first, then every torrent is dropped and
    /// the engine closed, which ends streams still waiting for pieces. In-flight
    /// responses get `server.shutdown_grace` to finish before the server task
    /// is aborted. An empty vector means a clean close.
    pub async fn close(self) -> Vec<GatewayError> {
        let GatewayClient {
            config,
            engine,
            registry,
            mut server,
            ..
        } = self;

        server.stop_accepting();
        let mut errors = registry.drain();
        errors.extend(engine.close().await.into_iter().map(GatewayError::from));
        if let Err(e) = server.shutdown(config.server.shutdown_grace).await {
            errors.push(e);
        }

        if errors.is_empty() {
            tracing::info!("Gateway client '{}' closed", config.client.name);
        } else {
            tracing::warn!(
                "Gateway client '{}' closed with {} errors",
                config.client.name,
                errors.len()
            );
        }
        errors
    }
}

fn data_dir_for(config: &GatewayConfig) -> Result<PathBuf> {
    resolve_data_dir(&config.client.name, config.storage.root_dir.as_deref())
}
