//! Test fixtures for torrent ingestion and streaming.
//!
//! Builds real bencoded metafiles with matching piece data so tests can
//! drive the engine, registry and HTTP layer end to end.

use sha1::{Digest, Sha1};

use crate::engine::metainfo::info_hash_of;
use crate::torrent::InfoHash;

const DEFAULT_PIECE_LENGTH: u64 = 16 * 1024;

/// Builder for deterministic test torrents.
#[derive(Debug, Clone)]
pub struct TorrentFixture {
    name: String,
    piece_length: u64,
    files: Vec<(String, Vec<u8>)>,
    single_file: Option<Vec<u8>>,
    creation_date: Option<i64>,
    announce: Option<String>,
}

/// Output of [`TorrentFixture::build`].
#[derive(Debug, Clone)]
pub struct BuiltTorrent {
    pub name: String,
    pub info_hash: InfoHash,
    /// Complete `.torrent` file
    pub metafile: Vec<u8>,
    /// Raw info dictionary, as a peer would deliver it for a magnet link
    pub info_bytes: Vec<u8>,
    /// Piece data in index order
    pub pieces: Vec<Vec<u8>>,
    /// Concatenated content of all files
    pub content: Vec<u8>,
}

impl TorrentFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            piece_length: DEFAULT_PIECE_LENGTH,
            files: Vec::new(),
            single_file: None,
            creation_date: None,
            announce: None,
        }
    }

    pub fn piece_length(mut self, piece_length: u64) -> Self {
        self.piece_length = piece_length;
        self
    }

    /// Adds a file to a multi-file torrent; `path` is split on '/'.
    pub fn file(mut self, path: &str, content: Vec<u8>) -> Self {
        self.files.push((path.to_string(), content));
        self
    }

    /// Makes this a single-file torrent named after the torrent itself.
    pub fn single_file(mut self, content: Vec<u8>) -> Self {
        self.single_file = Some(content);
        self
    }

    pub fn creation_date(mut self, unix_secs: i64) -> Self {
        self.creation_date = Some(unix_secs);
        self
    }

    pub fn announce(mut self, url: &str) -> Self {
        self.announce = Some(url.to_string());
        self
    }

    /// Encodes the torrent.
    ///
    /// # Panics
    ///
    /// Panics if neither files nor single file content were given.
    pub fn build(self) -> BuiltTorrent {
        let content: Vec<u8> = match &self.single_file {
            Some(data) => data.clone(),
            None => {
                assert!(!self.files.is_empty(), "fixture needs at least one file");
                self.files.iter().flat_map(|(_, data)| data.clone()).collect()
            }
        };

        let pieces: Vec<Vec<u8>> = content
            .chunks(self.piece_length as usize)
            .map(<[u8]>::to_vec)
            .collect();
        let mut piece_hashes = Vec::with_capacity(pieces.len() * 20);
        for piece in &pieces {
            piece_hashes.extend_from_slice(&Sha1::digest(piece));
        }

        // Info dictionary keys in sorted order
        let mut info = vec![b'd'];
        if self.single_file.is_none() {
            push_str(&mut info, "files");
            info.push(b'l');
            for (path, data) in &self.files {
                info.push(b'd');
                push_str(&mut info, "length");
                push_int(&mut info, data.len() as i64);
                push_str(&mut info, "path");
                info.push(b'l');
                for component in path.split('/') {
                    push_str(&mut info, component);
                }
                info.push(b'e');
                info.push(b'e');
            }
            info.push(b'e');
        } else {
            push_str(&mut info, "length");
            push_int(&mut info, content.len() as i64);
        }
        push_str(&mut info, "name");
        push_str(&mut info, &self.name);
        push_str(&mut info, "piece length");
        push_int(&mut info, self.piece_length as i64);
        push_str(&mut info, "pieces");
        push_raw(&mut info, &piece_hashes);
        info.push(b'e');

        let mut metafile = vec![b'd'];
        if let Some(url) = &self.announce {
            push_str(&mut metafile, "announce");
            push_str(&mut metafile, url);
        }
        if let Some(secs) = self.creation_date {
            push_str(&mut metafile, "creation date");
            push_int(&mut metafile, secs);
        }
        push_str(&mut metafile, "info");
        metafile.extend_from_slice(&info);
        metafile.push(b'e');

        BuiltTorrent {
            name: self.name,
            info_hash: info_hash_of(&info),
            metafile,
            info_bytes: info,
            pieces,
            content,
        }
    }
}

impl BuiltTorrent {
    /// Magnet link carrying only the info hash and display name.
    pub fn magnet_link(&self) -> String {
        let name: String = url::form_urlencoded::byte_serialize(self.name.as_bytes()).collect();
        format!("magnet:?xt=urn:btih:{}&dn={name}", self.info_hash)
    }

    /// Writes the metafile into `dir` and returns its path.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_metafile(&self, dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join(format!("{}.torrent", self.info_hash));
        std::fs::write(&path, &self.metafile).unwrap();
        path
    }
}

fn push_str(out: &mut Vec<u8>, value: &str) {
    push_raw(out, value.as_bytes());
}

fn push_raw(out: &mut Vec<u8>, value: &[u8]) {
    out.extend_from_slice(value.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(value);
}

fn push_int(out: &mut Vec<u8>, value: i64) {
    out.push(b'i');
    out.extend_from_slice(value.to_string().as_bytes());
    out.push(b'e');
}
