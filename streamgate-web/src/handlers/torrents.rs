//! `/torrents` listing

use axum::extract::State;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use streamgate_core::{InfoHash, MetadataState, Torrent, TorrentFile};

use crate::server::{AppState, stream_url};

/// One managed torrent as listed by `/torrents`
#[derive(Debug, Serialize)]
pub struct TorrentSummary {
    pub info_hash: InfoHash,
    pub name: String,
    pub state: MetadataState,
    pub files: Vec<TorrentFile>,
    pub stream_url: String,
    pub added_at: DateTime<Utc>,
}

impl TorrentSummary {
    pub fn new(torrent: &Torrent, port: u16) -> Self {
        Self {
            info_hash: torrent.info_hash(),
            name: torrent.name(),
            state: torrent.state(),
            files: torrent.files(),
            stream_url: stream_url(port, &torrent.info_hash()),
            added_at: torrent.added_at(),
        }
    }
}

/// Lists managed torrents, oldest first.
pub async fn list_torrents(State(state): State<AppState>) -> Json<Vec<TorrentSummary>> {
    let torrents = state
        .registry
        .list()
        .iter()
        .map(|torrent| TorrentSummary::new(torrent, state.port))
        .collect();
    Json(torrents)
}
