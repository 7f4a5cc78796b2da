//! Torrent identity, metadata and the managed torrent record

mod managed;

use std::fmt;

use chrono::{DateTime, Utc};
pub use managed::Torrent;
use serde::Serialize;

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary from a torrent file. The
/// canonical rendering is 40 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses the canonical lowercase hex form.
    ///
    /// Uppercase input is rejected so that a successful parse is equivalent
    /// to an exact match against `to_string()`.
    ///
    /// # Errors
    ///
    /// - `InvalidInfoHash` - If the input is not 40 lowercase hex characters
    pub fn from_hex(hex_str: &str) -> Result<Self, InvalidInfoHash> {
        let canonical = hex_str.len() == 40
            && hex_str
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !canonical {
            return Err(InvalidInfoHash {
                input: hex_str.to_string(),
            });
        }

        let mut hash = [0u8; 20];
        hex::decode_to_slice(hex_str, &mut hash).map_err(|_| InvalidInfoHash {
            input: hex_str.to_string(),
        })?;
        Ok(Self(hash))
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for InfoHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Input that is not a canonical info hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid info hash: {input:?}")]
pub struct InvalidInfoHash {
    pub input: String,
}

/// One file inside a torrent, in listing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentFile {
    /// Position in the torrent's file list
    pub index: usize,
    /// Path relative to the torrent root, components joined with '/'
    pub path: String,
    /// Extension including the leading dot, case as given
    pub extension: Option<String>,
    /// File size in bytes
    pub length: u64,
    /// Byte offset of the file within the concatenated torrent content
    pub offset: u64,
}

impl TorrentFile {
    /// Creates a file entry, deriving the extension from the last path component.
    pub fn new(index: usize, path: String, length: u64, offset: u64) -> Self {
        let extension = extension_of(&path);
        Self {
            index,
            path,
            extension,
            length,
            offset,
        }
    }
}

fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let dot = file_name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(file_name[dot..].to_string())
}

/// Metadata of a torrent once it is known.
///
/// Immutable after construction; shared as `Arc<TorrentInfo>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    pub info_hash: InfoHash,
    pub name: String,
    pub piece_length: u64,
    pub piece_hashes: Vec<[u8; 20]>,
    pub total_length: u64,
    pub files: Vec<TorrentFile>,
    pub creation_date: Option<DateTime<Utc>>,
    pub announce_urls: Vec<String>,
}

impl TorrentInfo {
    /// Number of pieces in the torrent.
    pub fn piece_count(&self) -> u32 {
        self.piece_hashes.len() as u32
    }

    /// Actual size of a piece; the last piece may be shorter.
    pub fn piece_size(&self, index: u32) -> u64 {
        let count = self.piece_count();
        if index >= count {
            0
        } else if index == count - 1 {
            self.total_length - u64::from(count - 1) * self.piece_length
        } else {
            self.piece_length
        }
    }
}

/// Lifecycle of a managed torrent.
///
/// `Adding → MetadataPending → Ready → Dropped`; a pending torrent may also
/// be dropped directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataState {
    Adding,
    MetadataPending,
    Ready,
    Dropped,
}

impl MetadataState {
    /// Returns true if moving from `self` to `next` is allowed.
    pub fn can_advance_to(self, next: MetadataState) -> bool {
        matches!(
            (self, next),
            (MetadataState::Adding, MetadataState::MetadataPending)
                | (MetadataState::MetadataPending, MetadataState::Ready)
                | (MetadataState::MetadataPending, MetadataState::Dropped)
                | (MetadataState::Ready, MetadataState::Dropped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetadataState::Adding => "adding",
            MetadataState::MetadataPending => "metadata_pending",
            MetadataState::Ready => "ready",
            MetadataState::Dropped => "dropped",
        }
    }
}

impl fmt::Display for MetadataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_display() {
        let hash = [
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef, 0x01, 0x23, 0x45, 0x67,
        ];
        let info_hash = InfoHash::new(hash);
        assert_eq!(
            info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[test]
    fn test_info_hash_from_hex_round_trip() {
        let text = "0123456789abcdef0123456789abcdef01234567";
        let info_hash = InfoHash::from_hex(text).unwrap();
        assert_eq!(info_hash.to_string(), text);
    }

    #[test]
    fn test_info_hash_rejects_non_canonical() {
        assert!(InfoHash::from_hex("deadbeef").is_err());
        assert!(InfoHash::from_hex("0123456789ABCDEF0123456789abcdef01234567").is_err());
        assert!(InfoHash::from_hex("0123456789abcdef0123456789abcdef0123456z").is_err());
        assert!(InfoHash::from_hex("").is_err());
    }

    #[test]
    fn test_file_extension_keeps_case() {
        let file = TorrentFile::new(0, "Season 1/Episode.MKV".to_string(), 10, 0);
        assert_eq!(file.extension.as_deref(), Some(".MKV"));

        let hidden = TorrentFile::new(1, "dir.d/.hidden".to_string(), 1, 10);
        assert_eq!(hidden.extension, None);

        let bare = TorrentFile::new(2, "README".to_string(), 1, 11);
        assert_eq!(bare.extension, None);
    }

    #[test]
    fn test_piece_size_last_piece_shorter() {
        let info = TorrentInfo {
            info_hash: InfoHash::new([0u8; 20]),
            name: "t".to_string(),
            piece_length: 16,
            piece_hashes: vec![[0u8; 20]; 3],
            total_length: 40,
            files: vec![],
            creation_date: None,
            announce_urls: vec![],
        };
        assert_eq!(info.piece_size(0), 16);
        assert_eq!(info.piece_size(2), 8);
        assert_eq!(info.piece_size(3), 0);
    }

    #[test]
    fn test_state_transitions() {
        use MetadataState::*;
        assert!(Adding.can_advance_to(MetadataPending));
        assert!(MetadataPending.can_advance_to(Ready));
        assert!(Ready.can_advance_to(Dropped));
        assert!(MetadataPending.can_advance_to(Dropped));
        assert!(!Adding.can_advance_to(Ready));
        assert!(!Dropped.can_advance_to(Ready));
        assert!(!Ready.can_advance_to(MetadataPending));
    }
}
