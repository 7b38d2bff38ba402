//! Chunk envelope protocol.
//!
//! A payload that does not fit into a single backend entry is split into pages stored at
//! derived keys, and the main entry is replaced by a media-type marker carrying the page count:
//!
//! ```text
//! <key>       = "application/multipart-secret; pages=3"
//! <key>-0001  = payload[0..2048]
//! <key>-0002  = payload[2048..4096]
//! <key>-0003  = payload[4096..]
//! ```
//!
//! Pages always end on a UTF-8 character boundary because backends store strings. A page of a
//! non-ASCII payload may therefore be up to three bytes short of [`MAX_ENTRY_SIZE`], and such a
//! record can have a different page layout than a writer that cuts at exact byte offsets.
//! Readers are unaffected: the marker carries the page count and pages are concatenated as
//! stored. ASCII payloads, base64 included, use the exact `ceil(len / 2048)` layout.
//!
//! A single-entry payload starting with [`MULTIPART_MEDIA_TYPE`] would be read back as a marker,
//! so such values are never stored verbatim (see [`is_marker_like`]).
//!
//! Everything in this module is pure; the storage engine owns the I/O.

use std::borrow::Cow;
use std::num::ParseIntError;
use std::ops::Range;

/// Media type written to the main entry of a multipart secret.
pub const MULTIPART_MEDIA_TYPE: &str = "application/multipart-secret";

/// Smallest page count a valid marker can carry.
pub const MIN_PAGES: usize = 2;

/// Largest payload, in bytes, stored in a single backend entry.
pub const MAX_ENTRY_SIZE: usize = 2048;

const PAGES_PARAM: &str = "pages";

/// Failures while decoding a multipart marker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// The marker is not a well-formed media type.
    #[error("Invalid media parameters: {message}")]
    InvalidParams { message: Cow<'static, str> },

    /// The `pages` parameter is missing or not an integer.
    #[error("Invalid pages parameter {value:?}: {source}")]
    InvalidPages { value: String, source: ParseIntError },

    /// The `pages` parameter parsed but cannot describe a multipart record.
    #[error("Invalid secret pages: {pages}")]
    PageCountOutOfRange { pages: i64 },

    /// A single-entry payload starts with the multipart media type.
    #[error("Value starts with the multipart media type")]
    MarkerCollision,
}

/// One chunk of a split payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// Byte range of the page inside the payload.
    pub range: Range<usize>,
}

impl Page {
    /// Returns the slice of `payload` covered by this page.
    ///
    /// # Panics
    /// Panics if `payload` is not the payload this page was planned for.
    #[must_use]
    pub fn slice<'a>(&self, payload: &'a str) -> &'a str {
        &payload[self.range.clone()]
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.range.end - self.range.start
    }
}

/// Returns `true` if `payload` must be split across several entries.
#[must_use]
pub const fn should_split(payload: &str) -> bool {
    payload.len() > MAX_ENTRY_SIZE
}

/// Returns `true` if `payload`, stored verbatim in a main entry, would be decoded as a marker.
#[must_use]
pub fn is_marker_like(payload: &str) -> bool {
    payload.starts_with(MULTIPART_MEDIA_TYPE)
}

/// Computes contiguous, non-overlapping pages covering `payload` exactly once.
///
/// Every page but the last holds [`MAX_ENTRY_SIZE`] bytes. A boundary that would cut through a
/// multi-byte UTF-8 sequence moves back to the previous character boundary, so pages of
/// non-ASCII payloads may be up to three bytes shorter.
#[must_use]
pub fn plan_pages(payload: &str) -> Vec<Page> {
    let mut pages = Vec::with_capacity(payload.len().div_ceil(MAX_ENTRY_SIZE));
    let mut start = 0;

    while start < payload.len() {
        let mut end = (start + MAX_ENTRY_SIZE).min(payload.len());
        while !payload.is_char_boundary(end) {
            end -= 1;
        }
        pages.push(Page { number: pages.len() + 1, range: start..end });
        start = end;
    }

    pages
}

/// Encodes the main-entry marker for a record of `pages` chunks.
#[must_use]
pub fn encode_marker(pages: usize) -> String {
    format!("{MULTIPART_MEDIA_TYPE}; {PAGES_PARAM}={pages}")
}

/// Decodes a main-entry value.
///
/// Returns `Ok(None)` when `value` is a plain payload, `Ok(Some(pages))` for a valid marker.
///
/// # Errors
/// * [`EnvelopeError::InvalidParams`] If the media type cannot be parsed.
/// * [`EnvelopeError::InvalidPages`] If `pages` is missing or not an integer.
/// * [`EnvelopeError::PageCountOutOfRange`] If `pages` is below [`MIN_PAGES`].
pub fn decode_marker(value: &str) -> Result<Option<usize>, EnvelopeError> {
    if !is_marker_like(value) {
        return Ok(None);
    }

    let params = parse_media_params(value)?;
    let raw = params
        .iter()
        .find_map(|(name, v)| (name == PAGES_PARAM).then_some(v.as_str()))
        .unwrap_or_default();

    let pages: i64 = raw
        .parse()
        .map_err(|source| EnvelopeError::InvalidPages { value: raw.to_owned(), source })?;

    match usize::try_from(pages) {
        Ok(n) if n >= MIN_PAGES => Ok(Some(n)),
        _ => Err(EnvelopeError::PageCountOutOfRange { pages }),
    }
}

/// Derives the backend key of page `page` of `key`.
///
/// The page number is 1-based and zero-padded to four digits: `k` → `k-0001`.
#[must_use]
pub fn page_key(key: &str, page: usize) -> String {
    format!("{key}-{page:04}")
}

fn invalid(message: &'static str) -> EnvelopeError {
    EnvelopeError::InvalidParams { message: message.into() }
}

/// Parses `type/subtype; name=value; ...` following RFC 2045 token and quoted-string rules.
fn parse_media_params(value: &str) -> Result<Vec<(String, String)>, EnvelopeError> {
    let (media, mut rest) = value.split_at(value.find(';').unwrap_or(value.len()));
    if !media.trim().eq_ignore_ascii_case(MULTIPART_MEDIA_TYPE) {
        return Err(invalid("unexpected media type"));
    }

    let mut params: Vec<(String, String)> = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let Some(after) = rest.strip_prefix(';') else {
            return Err(invalid("expected ';' between parameters"));
        };
        let after = after.trim_start();
        if after.is_empty() {
            break;
        }

        let (name, after) = take_token(after);
        if name.is_empty() {
            return Err(invalid("invalid media parameter"));
        }
        let Some(after) = after.trim_start().strip_prefix('=') else {
            return Err(invalid("invalid media parameter"));
        };
        let after = after.trim_start();

        let (param, after) = match after.strip_prefix('"') {
            Some(quoted) => take_quoted(quoted)?,
            None => {
                let (token, after) = take_token(after);
                if token.is_empty() {
                    return Err(invalid("invalid media parameter"));
                }
                (token.to_owned(), after)
            },
        };

        let name = name.to_ascii_lowercase();
        if params.iter().any(|(n, _)| *n == name) {
            return Err(invalid("duplicate parameter name"));
        }
        params.push((name, param));
        rest = after;
    }

    Ok(params)
}

const fn is_tspecial(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '='
    )
}

fn take_token(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| c.is_whitespace() || c.is_control() || is_tspecial(c));
    s.split_at(end.unwrap_or(s.len()))
}

fn take_quoted(s: &str) -> Result<(String, &str), EnvelopeError> {
    let mut out = String::new();
    let mut chars = s.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &s[i + 1..])),
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            c => out.push(c),
        }
    }

    Err(invalid("unterminated quoted parameter"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_split_threshold() {
        assert!(!should_split(""));
        assert!(!should_split(&"a".repeat(MAX_ENTRY_SIZE)));
        assert!(should_split(&"a".repeat(MAX_ENTRY_SIZE + 1)));
    }

    #[test]
    fn test_plan_pages_exact_arithmetic() {
        let payload = "x".repeat(6139);
        let pages = plan_pages(&payload);

        assert_eq!(
            pages,
            vec![
                Page { number: 1, range: 0..2048 },
                Page { number: 2, range: 2048..4096 },
                Page { number: 3, range: 4096..6139 },
            ]
        );
    }

    #[test]
    fn test_plan_pages_boundary_plus_one() {
        let payload = "y".repeat(MAX_ENTRY_SIZE + 1);
        let pages = plan_pages(&payload);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), MAX_ENTRY_SIZE);
        assert_eq!(pages[1].len(), 1);
    }

    #[test]
    fn test_plan_pages_never_splits_a_code_point() {
        // 3-byte characters: 2048 is not a multiple of 3.
        let payload = "€".repeat(1000);
        let pages = plan_pages(&payload);

        assert_eq!(pages[0].range, 0..2046);
        let rebuilt: String = pages.iter().map(|p| p.slice(&payload)).collect();
        assert_eq!(rebuilt, payload);
        assert!(pages.iter().all(|p| p.len() <= MAX_ENTRY_SIZE));
    }

    #[test]
    fn test_plan_pages_empty_payload() {
        assert!(plan_pages("").is_empty());
    }

    #[test]
    fn test_encode_marker_format() {
        assert_eq!(encode_marker(3), "application/multipart-secret; pages=3");
        assert_eq!(encode_marker(12), "application/multipart-secret; pages=12");
    }

    #[test]
    fn test_decode_marker_roundtrip() {
        for pages in [2, 3, 9, 10, 9999, 10_000] {
            assert_eq!(decode_marker(&encode_marker(pages)), Ok(Some(pages)));
        }
    }

    #[test]
    fn test_decode_plain_value_is_not_multipart() {
        assert_eq!(decode_marker("hunter2"), Ok(None));
        assert_eq!(decode_marker(""), Ok(None));
        assert_eq!(decode_marker("application/json"), Ok(None));
    }

    #[test]
    fn test_marker_like_matches_what_decode_inspects() {
        assert!(is_marker_like("application/multipart-secret"));
        assert!(is_marker_like("application/multipart-secretive"));
        assert!(!is_marker_like(" application/multipart-secret; pages=2"));
        assert!(!is_marker_like("application/json"));
        assert!(decode_marker("application/multipart-secret").is_err());
    }

    #[test]
    fn test_decode_accepts_rfc2045_variants() {
        assert_eq!(decode_marker("application/multipart-secret;pages=4"), Ok(Some(4)));
        assert_eq!(decode_marker("application/multipart-secret; PAGES=\"5\""), Ok(Some(5)));
        assert_eq!(decode_marker("application/multipart-secret; pages=2;"), Ok(Some(2)));
    }

    #[test]
    fn test_decode_rejects_empty_parameter() {
        let err = decode_marker("application/multipart-secret; pages=").unwrap_err();
        assert_eq!(err, EnvelopeError::InvalidParams { message: "invalid media parameter".into() });
    }

    #[test]
    fn test_decode_rejects_non_numeric_pages() {
        let err = decode_marker("application/multipart-secret; pages=hello").unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidPages { ref value, .. } if value == "hello"));
    }

    #[test]
    fn test_decode_rejects_missing_pages() {
        let err = decode_marker("application/multipart-secret; chunks=4").unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidPages { ref value, .. } if value.is_empty()));
    }

    #[test]
    fn test_decode_rejects_single_page() {
        let err = decode_marker("application/multipart-secret; pages=1").unwrap_err();
        assert_eq!(err, EnvelopeError::PageCountOutOfRange { pages: 1 });
        assert_eq!(err.to_string(), "Invalid secret pages: 1");

        let err = decode_marker("application/multipart-secret; pages=-4").unwrap_err();
        assert_eq!(err, EnvelopeError::PageCountOutOfRange { pages: -4 });
    }

    #[test]
    fn test_decode_rejects_garbage_after_prefix() {
        assert!(matches!(
            decode_marker("application/multipart-secretive; pages=3"),
            Err(EnvelopeError::InvalidParams { .. })
        ));
        assert!(matches!(
            decode_marker("application/multipart-secret; pages=\"3"),
            Err(EnvelopeError::InvalidParams { .. })
        ));
        assert!(matches!(
            decode_marker("application/multipart-secret; pages=3; pages=4"),
            Err(EnvelopeError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_page_key_is_zero_padded_and_one_based() {
        assert_eq!(page_key("k", 1), "k-0001");
        assert_eq!(page_key("k", 42), "k-0042");
        assert_eq!(page_key("k", 9999), "k-9999");
        assert_eq!(page_key("k", 10_000), "k-10000");
    }
}
