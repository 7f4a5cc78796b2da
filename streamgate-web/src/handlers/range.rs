//! HTTP range and conditional request handling
//!
//! Implements single-range RFC 7233 byte ranges plus the date-based
//! validators (`Last-Modified`, `If-Modified-Since`, `If-Range`).

use axum::http::HeaderMap;
use axum::http::header::{IF_MODIFIED_SINCE, IF_RANGE, RANGE};
use chrono::{DateTime, Utc};

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a `206` response.
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{total_size}", self.start, self.end)
    }
}

/// How a request's `Range` header applies to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable range; serve the whole file
    Full,
    Partial(ByteRange),
    /// Syntactically valid but outside the file
    Unsatisfiable,
}

/// Resolves a `Range` header against a file of `total_size` bytes.
///
/// Handles `bytes=a-b`, `bytes=a-` and `bytes=-n`. Headers in another unit,
/// with several ranges, or malformed are ignored and the whole file is served.
///
/// # Examples
/// ```
/// use streamgate_web::handlers::range::{ByteRange, RangeOutcome, resolve_range};
/// let outcome = resolve_range(Some("bytes=100-199"), 1000);
/// assert_eq!(outcome, RangeOutcome::Partial(ByteRange { start: 100, end: 199 }));
/// ```
pub fn resolve_range(header: Option<&str>, total_size: u64) -> RangeOutcome {
    let Some(ranges) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    if ranges.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((start_str, end_str)) = ranges.trim().split_once('-') else {
        return RangeOutcome::Full;
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        // Suffix range: last n bytes
        let Ok(suffix) = end_str.parse::<u64>() else {
            return RangeOutcome::Full;
        };
        if suffix == 0 || total_size == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        return RangeOutcome::Partial(ByteRange {
            start: total_size.saturating_sub(suffix),
            end: total_size - 1,
        });
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return RangeOutcome::Full;
    };
    let end = if end_str.is_empty() {
        None
    } else {
        match end_str.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return RangeOutcome::Full,
        }
    };

    if start >= total_size {
        return RangeOutcome::Unsatisfiable;
    }
    let last = total_size - 1;
    RangeOutcome::Partial(ByteRange {
        start,
        end: end.map_or(last, |end| end.min(last)),
    })
}

/// Formats a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parses an HTTP date in IMF-fixdate (RFC 2822 compatible) form.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// Drops sub-second precision, which HTTP dates cannot carry.
pub fn truncate_to_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or(time)
}

/// True when `If-Modified-Since` allows answering `304 Not Modified`.
pub fn not_modified(headers: &HeaderMap, last_modified: DateTime<Utc>) -> bool {
    header_date(headers, IF_MODIFIED_SINCE.as_str())
        .is_some_and(|since| truncate_to_seconds(last_modified) <= since)
}

/// Returns the `Range` header if it applies, honouring `If-Range`.
///
/// An `If-Range` date older than the resource, or an entity tag (no tags are
/// issued), voids the range so the full file is sent.
pub fn effective_range(headers: &HeaderMap, last_modified: DateTime<Utc>) -> Option<&str> {
    let range = headers.get(RANGE).and_then(|value| value.to_str().ok())?;
    match headers.get(IF_RANGE) {
        None => Some(range),
        Some(_) => header_date(headers, IF_RANGE.as_str())
            .filter(|date| truncate_to_seconds(last_modified) <= *date)
            .map(|_| range),
    }
}

fn header_date(headers: &HeaderMap, name: &str) -> Option<DateTime<Utc>> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    use super::*;

    fn partial(start: u64, end: u64) -> RangeOutcome {
        RangeOutcome::Partial(ByteRange { start, end })
    }

    #[test]
    fn test_resolve_range_forms() {
        assert_eq!(resolve_range(Some("bytes=100-199"), 1000), partial(100, 199));
        assert_eq!(resolve_range(Some("bytes=500-"), 1000), partial(500, 999));
        assert_eq!(resolve_range(Some("bytes=-100"), 1000), partial(900, 999));
        assert_eq!(resolve_range(Some("bytes=-5000"), 1000), partial(0, 999));
        assert_eq!(resolve_range(Some("bytes=900-5000"), 1000), partial(900, 999));
    }

    #[test]
    fn test_resolve_range_ignored() {
        assert_eq!(resolve_range(None, 1000), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("invalid"), 1000), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("items=0-1"), 1000), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("bytes=0-1,5-6"), 1000), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("bytes=20-10"), 1000), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("bytes=x-10"), 1000), RangeOutcome::Full);
    }

    #[test]
    fn test_resolve_range_unsatisfiable() {
        assert_eq!(
            resolve_range(Some("bytes=1000-"), 1000),
            RangeOutcome::Unsatisfiable
        );
        assert_eq!(resolve_range(Some("bytes=-0"), 1000), RangeOutcome::Unsatisfiable);
        assert_eq!(resolve_range(Some("bytes=0-"), 0), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_http_date_round_trip() {
        let time = DateTime::from_timestamp(784_111_777, 0).unwrap();
        let text = format_http_date(time);
        assert_eq!(text, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date(&text), Some(time));
        assert_eq!(parse_http_date("yesterday"), None);
    }

    #[test]
    fn test_if_modified_since() {
        let modified = DateTime::from_timestamp(1_700_000_000, 500).unwrap();
        let mut headers = HeaderMap::new();
        assert!(!not_modified(&headers, modified));

        headers.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_str(&format_http_date(modified)).unwrap(),
        );
        assert!(not_modified(&headers, modified));

        let earlier = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        headers.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_str(&format_http_date(earlier)).unwrap(),
        );
        assert!(!not_modified(&headers, modified));
    }

    #[test]
    fn test_if_range_voids_stale_range() {
        let modified = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-9"));
        assert_eq!(effective_range(&headers, modified), Some("bytes=0-9"));

        headers.insert(
            IF_RANGE,
            HeaderValue::from_str(&format_http_date(modified)).unwrap(),
        );
        assert_eq!(effective_range(&headers, modified), Some("bytes=0-9"));

        let stale = DateTime::from_timestamp(1_000_000_000, 0).unwrap();
        headers.insert(
            IF_RANGE,
            HeaderValue::from_str(&format_http_date(stale)).unwrap(),
        );
        assert_eq!(effective_range(&headers, modified), None);

        headers.insert(IF_RANGE, HeaderValue::from_static("\"some-etag\""));
        assert_eq!(effective_range(&headers, modified), None);
    }

    proptest! {
        #[test]
        fn partial_ranges_stay_inside_file(
            total in 1u64..1_000_000,
            start in 0u64..1_200_000,
            len in 0u64..1_200_000,
        ) {
            let header = format!("bytes={}-{}", start, start.saturating_add(len));
            match resolve_range(Some(&header), total) {
                RangeOutcome::Partial(range) => {
                    prop_assert!(range.start <= range.end);
                    prop_assert!(range.end < total);
                    prop_assert_eq!(range.start, start);
                }
                RangeOutcome::Unsatisfiable => prop_assert!(start >= total),
                RangeOutcome::Full => prop_assert!(false, "valid range ignored"),
            }
        }
    }
}
