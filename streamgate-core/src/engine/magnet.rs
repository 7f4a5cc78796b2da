//! Magnet link parsing

use super::EngineError;
use crate::torrent::InfoHash;

/// Parsed magnet link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
}

/// Parses magnet link to extract torrent information.
///
/// Only `urn:btih:` topics in hex form are accepted; the hash is compared
/// case-insensitively and stored canonically.
///
/// # Errors
/// - `EngineError::InvalidMagnet` - Malformed magnet URI or missing info hash
pub fn parse_magnet_link(magnet_link: &str) -> Result<MagnetLink, EngineError> {
    let magnet = magnet_url::Magnet::new(magnet_link).map_err(|e| EngineError::InvalidMagnet {
        reason: format!("{e}"),
    })?;

    let url = url::Url::parse(magnet_link).map_err(|e| EngineError::InvalidMagnet {
        reason: e.to_string(),
    })?;

    let mut info_hash = None;
    let mut display_name = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "xt" if info_hash.is_none() => {
                if let Some(hash) = value.strip_prefix("urn:btih:") {
                    info_hash = Some(parse_hash(hash)?);
                }
            }
            "dn" if display_name.is_none() => display_name = Some(value.into_owned()),
            _ => {}
        }
    }

    let info_hash = info_hash.ok_or_else(|| EngineError::InvalidMagnet {
        reason: format!("Missing or invalid info hash in magnet link: {magnet_link}"),
    })?;

    Ok(MagnetLink {
        info_hash,
        display_name,
        trackers: magnet.trackers().to_vec(),
    })
}

fn parse_hash(hash: &str) -> Result<InfoHash, EngineError> {
    if hash.len() != 40 {
        return Err(EngineError::InvalidMagnet {
            reason: format!("Invalid hash length: {} (expected 40)", hash.len()),
        });
    }
    InfoHash::from_hex(&hash.to_ascii_lowercase()).map_err(|_| EngineError::InvalidMagnet {
        reason: format!("Invalid hex character in hash: {hash}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnet_link_parsing() {
        let magnet = "magnet:?xt=urn:btih:0123456789ABCDEF0123456789abcdef01234567&dn=Test%20Torrent&tr=http://tracker.example.com/announce";
        let parsed = parse_magnet_link(magnet).unwrap();

        assert_eq!(
            parsed.info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
        assert_eq!(parsed.display_name.as_deref(), Some("Test Torrent"));
        assert_eq!(parsed.trackers.len(), 1);
    }

    #[test]
    fn test_magnet_link_without_info_hash() {
        let magnet = "magnet:?dn=Test%20Torrent&tr=http://tracker.example.com/announce";
        let result = parse_magnet_link(magnet);
        assert!(matches!(result, Err(EngineError::InvalidMagnet { .. })));
    }

    #[test]
    fn test_magnet_link_invalid_hash_length() {
        let result = parse_magnet_link("magnet:?xt=urn:btih:tooshort&dn=Test");
        assert!(result.is_err());
    }

    #[test]
    fn test_not_a_magnet() {
        assert!(parse_magnet_link("invalid://not-a-magnet").is_err());
    }
}
