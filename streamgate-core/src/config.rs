//! Centralized configuration for Streamgate.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for a gateway client.
///
/// Groups related settings into logical sections. Supports environment
/// variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub torrent: TorrentConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub stream: StreamConfig,
}

/// Identity of the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Client name, also the name of the data directory
    pub name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "streamgate".to_string(),
        }
    }
}

/// Streaming HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    /// Listening port; 0 picks a free port
    pub port: u16,
    /// How long a stream request waits for a pending torrent's metadata
    pub readiness_timeout: Duration,
    /// Time given to in-flight streams on close before they are aborted
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            readiness_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Torrent ingestion settings.
#[derive(Debug, Clone)]
pub struct TorrentConfig {
    /// Upper bound on waiting for metadata when adding a torrent
    pub metadata_timeout: Duration,
}

impl Default for TorrentConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Outbound HTTP settings for metafile downloads.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Whole-request timeout for downloading a remote metafile
    pub download_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            download_timeout: Duration::from_secs(30),
            user_agent: "streamgate/0.1.0".to_string(),
        }
    }
}

/// Persistent storage settings.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Parent of the data directory; the user cache directory when unset
    pub root_dir: Option<PathBuf>,
}

/// Stream body settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Bytes read from the engine per body chunk
    pub chunk_size: usize,
    /// Longest wait for a single chunk before the body fails (None = forever)
    pub read_stall_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: 65536, // 64 KiB
            read_stall_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl GatewayConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("STREAMGATE_CLIENT_NAME") {
            if !name.trim().is_empty() {
                config.client.name = name;
            }
        }

        if let Ok(port) = std::env::var("STREAMGATE_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Ok(host) = std::env::var("STREAMGATE_HOST") {
            if let Ok(host) = host.parse::<IpAddr>() {
                config.server.host = host;
            }
        }

        if let Ok(timeout) = std::env::var("STREAMGATE_METADATA_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.torrent.metadata_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(timeout) = std::env::var("STREAMGATE_DOWNLOAD_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.network.download_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(root) = std::env::var("STREAMGATE_DATA_ROOT") {
            if !root.is_empty() {
                config.storage.root_dir = Some(PathBuf::from(root));
            }
        }

        config
    }

    /// Creates a configuration for tests: random port, short timeouts and
    /// storage under `root_dir`.
    pub fn for_testing(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig {
                port: 0,
                readiness_timeout: Duration::from_secs(2),
                shutdown_grace: Duration::from_millis(200),
                ..ServerConfig::default()
            },
            torrent: TorrentConfig {
                metadata_timeout: Duration::from_secs(5),
            },
            network: NetworkConfig {
                download_timeout: Duration::from_secs(5),
                ..NetworkConfig::default()
            },
            storage: StorageConfig {
                root_dir: Some(root_dir.into()),
            },
            stream: StreamConfig {
                chunk_size: 16,
                read_stall_timeout: Some(Duration::from_secs(5)),
            },
            ..Default::default()
        }
    }

    /// Socket address the streaming server binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = GatewayConfig::default();

        assert_eq!(config.client.name, "streamgate");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.torrent.metadata_timeout, Duration::from_secs(300));
        assert_eq!(config.network.download_timeout, Duration::from_secs(30));
        assert_eq!(config.stream.chunk_size, 65536);
        assert!(config.storage.root_dir.is_none());
    }

    #[test]
    fn test_testing_preset() {
        let config = GatewayConfig::for_testing("/tmp/streamgate-test");
        assert_eq!(config.server.port, 0);
        assert_eq!(
            config.storage.root_dir.as_deref(),
            Some(std::path::Path::new("/tmp/streamgate-test"))
        );
        assert!(config.server.readiness_timeout < Duration::from_secs(10));
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("STREAMGATE_CLIENT_NAME", "envclient");
            std::env::set_var("STREAMGATE_PORT", "9191");
            std::env::set_var("STREAMGATE_METADATA_TIMEOUT", "42");
            std::env::set_var("STREAMGATE_DOWNLOAD_TIMEOUT", "not-a-number");
        }

        let config = GatewayConfig::from_env();

        assert_eq!(config.client.name, "envclient");
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.torrent.metadata_timeout, Duration::from_secs(42));
        assert_eq!(config.network.download_timeout, Duration::from_secs(30));

        // Cleanup
        unsafe {
            std::env::remove_var("STREAMGATE_CLIENT_NAME");
            std::env::remove_var("STREAMGATE_PORT");
            std::env::remove_var("STREAMGATE_METADATA_TIMEOUT");
            std::env::remove_var("STREAMGATE_DOWNLOAD_TIMEOUT");
        }
    }
}
