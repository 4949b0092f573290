//! Object metadata extracted from HTTP response headers
//!
//! Extraction is total: a missing or malformed header leaves its field at the
//! default value and never prevents the other headers from being read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Per-object (or per-part) SHA-256 checksum, optionally suffixed with `-<parts>`
pub const CHECKSUM_HEADER: &str = "x-jpmc-checksum-sha256";

/// Object version identifier
pub const VERSION_HEADER: &str = "x-jpmc-version-id";

/// Number of parts of a multipart object
pub const PARTS_COUNT_HEADER: &str = "x-jpmc-mp-parts-count";

/// Body length
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length";

/// Byte range of a ranged response
pub const CONTENT_RANGE_HEADER: &str = "Content-Range";

/// Response headers, name to values; names are matched case-sensitively
pub type HeaderMap = HashMap<String, Vec<String>>;

static CONTENT_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^bytes (\d+)-(\d+)/(\d+)$").unwrap());

/// Parsed `Content-Range` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRange {
    pub start: i64,
    pub end: i64,
    pub total: i64,
}

impl ContentRange {
    /// Sentinel for a missing or unparseable range
    pub const UNKNOWN: ContentRange = ContentRange {
        start: -1,
        end: -1,
        total: -1,
    };

    /// Parse `bytes <start>-<end>/<total>`, falling back to [`ContentRange::UNKNOWN`]
    pub fn parse(value: &str) -> Self {
        let Some(captures) = CONTENT_RANGE_RE.captures(value.trim()) else {
            return Self::UNKNOWN;
        };

        let field = |i: usize| captures.get(i).and_then(|m| m.as_str().parse::<i64>().ok());

        match (field(1), field(2), field(3)) {
            (Some(start), Some(end), Some(total)) => ContentRange { start, end, total },
            _ => Self::UNKNOWN,
        }
    }

    /// Whether this is a real range rather than the sentinel
    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl Default for ContentRange {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Metadata of an object or one of its parts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectHead {
    /// Version identifier
    pub version: Option<String>,

    /// Base64 checksum with any multipart suffix removed
    pub checksum: Option<String>,

    /// Number of parts (0 if not multipart or unparseable)
    pub part_count: u32,

    /// Set whenever the parts-count header is present
    pub is_multipart: bool,

    /// Body length in bytes (0 if absent)
    pub content_length: u64,

    /// Range covered by this response
    pub content_range: ContentRange,
}

impl ObjectHead {
    /// Build an `ObjectHead` from response headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let first = |name: &str| {
            headers
                .get(name)
                .and_then(|values| values.first())
                .map(String::as_str)
        };

        let checksum = first(CHECKSUM_HEADER).map(|value| match value.split_once('-') {
            Some((checksum, _)) => checksum.to_string(),
            None => value.to_string(),
        });

        let parts_header = first(PARTS_COUNT_HEADER);
        let part_count = parts_header
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);

        let content_length = first(CONTENT_LENGTH_HEADER)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let content_range = first(CONTENT_RANGE_HEADER)
            .map(ContentRange::parse)
            .unwrap_or_default();

        Self {
            version: first(VERSION_HEADER).map(str::to_string),
            checksum,
            part_count,
            is_multipart: parts_header.is_some(),
            content_length,
            content_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        map
    }

    #[test]
    fn test_multipart_checksum_suffix_stripped() {
        let head = ObjectHead::from_headers(&headers(&[
            (CHECKSUM_HEADER, "X-5"),
            (PARTS_COUNT_HEADER, "5"),
        ]));

        assert_eq!(head.checksum.as_deref(), Some("X"));
        assert!(head.is_multipart);
        assert_eq!(head.part_count, 5);
    }

    #[test]
    fn test_checksum_split_at_first_separator() {
        let head = ObjectHead::from_headers(&headers(&[(CHECKSUM_HEADER, "abc-2-extra")]));
        assert_eq!(head.checksum.as_deref(), Some("abc"));
    }

    #[test]
    fn test_not_multipart_without_parts_header() {
        let head = ObjectHead::from_headers(&headers(&[
            (CHECKSUM_HEADER, "X-5"),
            (VERSION_HEADER, "v1"),
            (CONTENT_LENGTH_HEADER, "1000"),
        ]));

        assert!(!head.is_multipart);
        assert_eq!(head.part_count, 0);
        assert_eq!(head.version.as_deref(), Some("v1"));
        assert_eq!(head.content_length, 1000);
    }

    #[test]
    fn test_parts_header_presence_alone_marks_multipart() {
        let head = ObjectHead::from_headers(&headers(&[(PARTS_COUNT_HEADER, "many")]));
        assert!(head.is_multipart);
        assert_eq!(head.part_count, 0);
    }

    #[test]
    fn test_content_range_parsing() {
        assert_eq!(
            ContentRange::parse("bytes 0-499/1000"),
            ContentRange {
                start: 0,
                end: 499,
                total: 1000
            }
        );
        assert_eq!(ContentRange::parse("invalid"), ContentRange::UNKNOWN);
        assert_eq!(ContentRange::parse("bytes 0-499/*"), ContentRange::UNKNOWN);
        assert!(!ContentRange::UNKNOWN.is_known());
    }

    #[test]
    fn test_malformed_range_does_not_block_other_headers() {
        let head = ObjectHead::from_headers(&headers(&[
            (CONTENT_RANGE_HEADER, "garbage"),
            (CONTENT_LENGTH_HEADER, "42"),
            (VERSION_HEADER, "v7"),
        ]));

        assert_eq!(head.content_range, ContentRange::UNKNOWN);
        assert_eq!(head.content_length, 42);
        assert_eq!(head.version.as_deref(), Some("v7"));
    }

    #[test]
    fn test_empty_headers_give_defaults() {
        let head = ObjectHead::from_headers(&HeaderMap::new());
        assert_eq!(head, ObjectHead::default());
        assert_eq!(head.content_range, ContentRange::UNKNOWN);
    }

    #[test]
    fn test_header_names_are_case_sensitive() {
        let head = ObjectHead::from_headers(&headers(&[
            ("content-length", "10"),
            ("X-JPMC-MP-PARTS-COUNT", "3"),
        ]));
        assert_eq!(head.content_length, 0);
        assert!(!head.is_multipart);
    }

    #[test]
    fn test_first_value_wins() {
        let head = ObjectHead::from_headers(&headers(&[
            (VERSION_HEADER, "first"),
            (VERSION_HEADER, "second"),
        ]));
        assert_eq!(head.version.as_deref(), Some("first"));
    }
}
