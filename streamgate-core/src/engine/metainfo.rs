//! Metafile parsing and info hash calculation

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

use super::EngineError;
use crate::torrent::{InfoHash, TorrentFile, TorrentInfo};

type BencodeDict<'a> = std::collections::HashMap<&'a [u8], bencode_rs::Value<'a>>;
type ParseResult<T> = Result<T, EngineError>;

/// Parses a complete metafile (`.torrent`).
///
/// # Errors
///
/// - `EngineError::InvalidMetainfo` - If bencode parsing or metadata extraction failed
pub fn parse_metainfo(torrent_bytes: &[u8]) -> ParseResult<TorrentInfo> {
    let root = parse_root_dict(torrent_bytes)?;
    let bencode_rs::Value::Dictionary(dict) = &root else {
        return Err(invalid("Root element must be dictionary"));
    };

    let info_bytes = info_dict_span(torrent_bytes)?;
    let info_dict = match dict.get(b"info".as_slice()) {
        Some(bencode_rs::Value::Dictionary(info)) => info,
        Some(_) => return Err(invalid("Info field must be dictionary")),
        None => return Err(invalid("Missing 'info' field")),
    };

    let creation_date = match dict.get(b"creation date".as_slice()) {
        Some(bencode_rs::Value::Integer(secs)) => DateTime::<Utc>::from_timestamp(*secs, 0),
        _ => None,
    };

    info_from_dict(
        info_hash_of(info_bytes),
        info_dict,
        extract_announce_urls(dict),
        creation_date,
    )
}

/// Parses a bare info dictionary, as delivered for a magnet link.
///
/// # Errors
///
/// - `EngineError::InvalidMetainfo` - If the dictionary is malformed
pub fn parse_info_dict(
    info_bytes: &[u8],
    announce_urls: Vec<String>,
) -> ParseResult<TorrentInfo> {
    let root = parse_root_dict(info_bytes)?;
    let bencode_rs::Value::Dictionary(info_dict) = &root else {
        return Err(invalid("Info dictionary must be dictionary"));
    };
    if value_end(info_bytes)? != info_bytes.len() {
        return Err(invalid("Trailing data after info dictionary"));
    }
    info_from_dict(info_hash_of(info_bytes), info_dict, announce_urls, None)
}

/// SHA-1 of the raw info dictionary bytes.
pub fn info_hash_of(info_bytes: &[u8]) -> InfoHash {
    let digest = Sha1::digest(info_bytes);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest);
    InfoHash::new(hash)
}

/// Wraps a raw info dictionary into a minimal metafile.
pub fn encode_metafile(info_bytes: &[u8], announce_urls: &[String]) -> Vec<u8> {
    let mut out = Vec::with_capacity(info_bytes.len() + 64);
    out.push(b'd');
    if let Some(primary) = announce_urls.first() {
        push_bytes(&mut out, b"announce");
        push_bytes(&mut out, primary.as_bytes());
    }
    if announce_urls.len() > 1 {
        push_bytes(&mut out, b"announce-list");
        out.push(b'l');
        for url in announce_urls {
            out.push(b'l');
            push_bytes(&mut out, url.as_bytes());
            out.push(b'e');
        }
        out.push(b'e');
    }
    push_bytes(&mut out, b"info");
    out.extend_from_slice(info_bytes);
    out.push(b'e');
    out
}

fn push_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

fn parse_root_dict(bytes: &[u8]) -> ParseResult<bencode_rs::Value<'_>> {
    let mut parsed = bencode_rs::Value::parse(bytes)
        .map_err(|e| invalid(format!("Bencode parsing failed: {e:?}")))?;
    if parsed.is_empty() {
        return Err(invalid("Empty bencode data"));
    }
    Ok(parsed.swap_remove(0))
}

/// Locates the raw bytes of the top-level `info` value.
fn info_dict_span(data: &[u8]) -> ParseResult<&[u8]> {
    if data.first() != Some(&b'd') {
        return Err(invalid("Expected dictionary start"));
    }

    let mut pos = 1;
    while pos < data.len() && data[pos] != b'e' {
        let key_end = pos + value_end(&data[pos..])?;
        let value_stop = key_end + value_end(&data[key_end..])?;
        if &data[pos..key_end] == b"4:info" {
            return Ok(&data[key_end..value_stop]);
        }
        pos = value_stop;
    }

    Err(invalid("Missing 'info' field"))
}

/// Returns the length of the bencode value at the start of `data`.
fn value_end(data: &[u8]) -> ParseResult<usize> {
    let mut pos = 0;
    let mut depth = 0usize;

    loop {
        match data.get(pos) {
            Some(b'd' | b'l') => {
                depth += 1;
                pos += 1;
            }
            Some(b'e') if depth > 0 => {
                depth -= 1;
                pos += 1;
            }
            Some(b'i') => {
                let end = data[pos..]
                    .iter()
                    .position(|&b| b == b'e')
                    .ok_or_else(|| invalid("Unterminated integer"))?;
                pos += end + 1;
            }
            Some(b'0'..=b'9') => {
                let colon = data[pos..]
                    .iter()
                    .position(|&b| b == b':')
                    .ok_or_else(|| invalid("Invalid string format"))?;
                let length: usize = std::str::from_utf8(&data[pos..pos + colon])
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| invalid("Invalid string length"))?;
                pos += colon + 1 + length;
                if pos > data.len() {
                    return Err(invalid("String exceeds data"));
                }
            }
            Some(_) => return Err(invalid("Invalid bencode character")),
            None => return Err(invalid("Incomplete bencode value")),
        }

        if depth == 0 {
            return Ok(pos);
        }
    }
}

fn info_from_dict(
    info_hash: InfoHash,
    info: &BencodeDict<'_>,
    announce_urls: Vec<String>,
    creation_date: Option<DateTime<Utc>>,
) -> ParseResult<TorrentInfo> {
    let name = extract_string(info, b"name")?;
    let piece_length = extract_integer(info, b"piece length")?;
    if piece_length <= 0 {
        return Err(invalid("Piece length must be positive"));
    }
    let piece_length = piece_length as u64;

    let pieces_bytes = extract_bytes(info, b"pieces")?;
    if !pieces_bytes.len().is_multiple_of(20) {
        return Err(invalid("Invalid pieces length"));
    }
    let piece_hashes: Vec<[u8; 20]> = pieces_bytes
        .chunks(20)
        .map(|chunk| {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(chunk);
            hash
        })
        .collect();

    let files = match info.get(b"files".as_slice()) {
        Some(bencode_rs::Value::List(entries)) => extract_files(entries)?,
        Some(_) => return Err(invalid("Invalid files structure")),
        None => {
            let length = extract_integer(info, b"length")?;
            if length < 0 {
                return Err(invalid("Negative file length"));
            }
            vec![TorrentFile::new(0, name.clone(), length as u64, 0)]
        }
    };

    let total_length: u64 = files.iter().map(|f| f.length).sum();
    let expected_pieces = total_length.div_ceil(piece_length);
    if expected_pieces != piece_hashes.len() as u64 {
        return Err(invalid(format!(
            "Piece count {} does not cover {} bytes",
            piece_hashes.len(),
            total_length
        )));
    }

    Ok(TorrentInfo {
        info_hash,
        name,
        piece_length,
        piece_hashes,
        total_length,
        files,
        creation_date,
        announce_urls,
    })
}

fn extract_files(entries: &[bencode_rs::Value<'_>]) -> ParseResult<Vec<TorrentFile>> {
    let mut files = Vec::with_capacity(entries.len());
    let mut offset = 0u64;

    for (index, entry) in entries.iter().enumerate() {
        let bencode_rs::Value::Dictionary(file_dict) = entry else {
            return Err(invalid("Invalid file entry type"));
        };
        let length = extract_integer(file_dict, b"length")?;
        if length < 0 {
            return Err(invalid("Negative file length"));
        }

        let Some(bencode_rs::Value::List(components)) = file_dict.get(b"path".as_slice()) else {
            return Err(invalid("Missing or invalid path in file"));
        };
        let mut path = Vec::with_capacity(components.len());
        for component in components {
            let bencode_rs::Value::Bytes(bytes) = component else {
                return Err(invalid("Invalid path component type"));
            };
            let component = std::str::from_utf8(bytes)
                .map_err(|_| invalid("Invalid UTF-8 in file path"))?;
            path.push(component);
        }
        if path.is_empty() {
            return Err(invalid("Empty file path"));
        }

        files.push(TorrentFile::new(index, path.join("/"), length as u64, offset));
        offset += length as u64;
    }

    Ok(files)
}

fn extract_announce_urls(dict: &BencodeDict<'_>) -> Vec<String> {
    let mut announce_urls = Vec::new();

    if let Ok(announce) = extract_string(dict, b"announce") {
        announce_urls.push(announce);
    }

    if let Some(bencode_rs::Value::List(tiers)) = dict.get(b"announce-list".as_slice()) {
        for tier in tiers {
            if let bencode_rs::Value::List(tier_urls) = tier {
                for url_value in tier_urls {
                    if let bencode_rs::Value::Bytes(url_bytes) = url_value
                        && let Ok(url) = String::from_utf8(url_bytes.to_vec())
                        && !announce_urls.contains(&url)
                    {
                        announce_urls.push(url);
                    }
                }
            }
        }
    }

    announce_urls
}

fn extract_string(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<String> {
    let bytes = extract_bytes(dict, key)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| {
        invalid(format!(
            "Invalid UTF-8 in field: {:?}",
            String::from_utf8_lossy(key)
        ))
    })
}

fn extract_bytes<'a>(dict: &'a BencodeDict<'_>, key: &[u8]) -> ParseResult<&'a [u8]> {
    match dict.get(key) {
        Some(bencode_rs::Value::Bytes(bytes)) => Ok(bytes),
        _ => Err(invalid(format!(
            "Missing or invalid field: {:?}",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn extract_integer(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<i64> {
    match dict.get(key) {
        Some(bencode_rs::Value::Integer(value)) => Ok(*value),
        _ => Err(invalid(format!(
            "Missing or invalid integer field: {:?}",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn invalid(reason: impl Into<String>) -> EngineError {
    EngineError::InvalidMetainfo {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TorrentFixture;

    #[test]
    fn test_value_end_nested() {
        assert_eq!(value_end(b"d3:keyd4:namei42eee").unwrap(), 19);
        assert_eq!(value_end(b"d4:listl4:testi42eeetrailing").unwrap(), 20);
        assert_eq!(value_end(b"i-3e").unwrap(), 4);
        assert_eq!(value_end(b"4:spam").unwrap(), 6);
    }

    #[test]
    fn test_value_end_incomplete() {
        assert!(value_end(b"d3:key").is_err());
        assert!(value_end(b"d3:key999:").is_err());
        assert!(value_end(b"x").is_err());
    }

    #[test]
    fn test_info_span_skips_nested_info_keys() {
        // A nested "4:info" inside another value must not be picked up.
        let data = b"d1:ad4:infoi1ee4:infod4:name1:xee";
        assert_eq!(info_dict_span(data).unwrap(), b"d4:name1:xe");
    }

    #[test]
    fn test_parse_multi_file_fixture() {
        let fixture = TorrentFixture::new("Show")
            .piece_length(16)
            .file("readme.txt", vec![b'r'; 10])
            .file("season/movie.mkv", vec![b'm'; 40])
            .creation_date(1_700_000_000)
            .announce("http://tracker.example.com/announce")
            .build();

        let info = parse_metainfo(&fixture.metafile).unwrap();
        assert_eq!(info.info_hash, fixture.info_hash);
        assert_eq!(info.name, "Show");
        assert_eq!(info.total_length, 50);
        assert_eq!(info.piece_count(), 4);
        assert_eq!(info.files.len(), 2);
        assert_eq!(info.files[1].path, "season/movie.mkv");
        assert_eq!(info.files[1].offset, 10);
        assert_eq!(info.files[1].extension.as_deref(), Some(".mkv"));
        assert_eq!(
            info.creation_date.map(|d| d.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(info.announce_urls, vec!["http://tracker.example.com/announce"]);
    }

    #[test]
    fn test_parse_info_dict_matches_metafile() {
        let fixture = TorrentFixture::new("clip.mp4")
            .piece_length(8)
            .single_file(vec![1u8; 20])
            .build();

        let from_info = parse_info_dict(&fixture.info_bytes, vec![]).unwrap();
        let from_file = parse_metainfo(&fixture.metafile).unwrap();
        assert_eq!(from_info.info_hash, from_file.info_hash);
        assert_eq!(from_info.files, from_file.files);
        assert_eq!(from_info.files[0].path, "clip.mp4");
    }

    #[test]
    fn test_encode_metafile_preserves_hash() {
        let fixture = TorrentFixture::new("a.webm")
            .single_file(vec![0u8; 5])
            .build();
        let trackers = vec![
            "udp://one.example:1337".to_string(),
            "udp://two.example:1337".to_string(),
        ];
        let encoded = encode_metafile(&fixture.info_bytes, &trackers);
        let info = parse_metainfo(&encoded).unwrap();
        assert_eq!(info.info_hash, fixture.info_hash);
        assert_eq!(info.announce_urls, trackers);
    }

    #[test]
    fn test_missing_info_field() {
        let result = parse_metainfo(b"d8:announce9:test:8080e");
        assert!(result.unwrap_err().to_string().contains("Missing 'info' field"));
    }

    #[test]
    fn test_invalid_pieces_length() {
        let data = b"d4:infod6:lengthi1000e4:name8:test.txt12:piece lengthi32768e6:pieces19:1234567890123456789ee";
        let result = parse_metainfo(data);
        assert!(result.unwrap_err().to_string().contains("Invalid pieces length"));
    }

    #[test]
    fn test_piece_count_must_cover_content() {
        // 1000 bytes at 100 bytes per piece needs 10 hashes, only 1 given
        let data = b"d4:infod6:lengthi1000e4:name8:test.txt12:piece lengthi100e6:pieces20:12345678901234567890ee";
        assert!(parse_metainfo(data).is_err());
    }

    #[test]
    fn test_invalid_utf8_in_path() {
        let mut data = Vec::from(
            &b"d4:infod5:filesld6:lengthi5e4:pathl4:"[..],
        );
        data.extend_from_slice(&[0xFF, 0xFE, 0xFD, 0xFC]);
        data.extend_from_slice(b"eee4:name1:x12:piece lengthi16e6:pieces20:12345678901234567890ee");
        assert!(parse_metainfo(&data).is_err());
    }
}
