//! Playable file selection

use crate::torrent::TorrentFile;

/// Container extensions served by the gateway, without the leading dot.
const PLAYABLE_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "avif", "av1", "mov", "flv", "f4v", "webm", "wmv", "mpeg", "mpg",
    "mlv", "hevc", "flac", "flic",
];

/// Returns the first file, in listing order, with a playable extension.
///
/// Extensions are compared as given; `movie.MKV` does not match.
pub fn select_playable_file(files: &[TorrentFile]) -> Option<&TorrentFile> {
    files.iter().find(|file| is_playable(file))
}

fn is_playable(file: &TorrentFile) -> bool {
    file.extension
        .as_deref()
        .and_then(|ext| ext.strip_prefix('.'))
        .is_some_and(|ext| PLAYABLE_EXTENSIONS.contains(&ext))
}
