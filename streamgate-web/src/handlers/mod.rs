//! HTTP request handlers

pub mod range;
pub mod stream;
pub mod torrents;

pub use stream::{ApiError, StreamQuery, sanitize_token, status_for, stream_torrent};
pub use torrents::{TorrentSummary, list_torrents};
