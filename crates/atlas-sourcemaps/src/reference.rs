//! Classification and decoding of source map references.
//!
//! A script's `sourceMapURL` is either a self-contained `data:` URL carrying
//! the map inline, or a URL (absolute or relative to the script) that must be
//! fetched from the page context. An empty reference means the script has no
//! map at all.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

/// A non-empty source map reference attached to a parsed script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapReference {
    /// The map payload is embedded in a `data:` URL.
    Inline(String),
    /// The map must be fetched from this URL (possibly relative to the script).
    Remote(String),
}

impl MapReference {
    /// Classify a raw `sourceMapURL` value.
    ///
    /// Returns `None` for an empty reference; such scripts are excluded from
    /// acquisition entirely.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            None
        } else if raw.starts_with("data:") {
            Some(Self::Inline(raw.to_string()))
        } else {
            Some(Self::Remote(raw.to_string()))
        }
    }
}

/// Decode the payload of an inline `data:` URL into map text.
///
/// Takes the portion after the first `,`. If the header declares `base64`,
/// the payload is base64-decoded and interpreted as UTF-8; otherwise it is
/// used as-is. The error string is the underlying decoder's own diagnostic
/// and is surfaced verbatim in the result record, so decode failures read
/// the same way parse failures do.
pub fn decode_inline(data_url: &str) -> Result<String, String> {
    let Some((header, payload)) = data_url.split_once(',') else {
        return Err("invalid data URL: missing ',' separator".to_string());
    };

    if header.ends_with(";base64") {
        let bytes = B64.decode(payload).map_err(|e| e.to_string())?;
        String::from_utf8(bytes).map_err(|e| e.to_string())
    } else {
        Ok(payload.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_reference() {
        assert_eq!(MapReference::parse(""), None);
    }

    #[test]
    fn test_parse_data_url_is_inline() {
        let reference = MapReference::parse("data:application/json;base64,e30=").unwrap();
        assert_eq!(
            reference,
            MapReference::Inline("data:application/json;base64,e30=".to_string())
        );
    }

    #[test]
    fn test_parse_absolute_url_is_remote() {
        let reference = MapReference::parse("https://example.com/app.js.map").unwrap();
        assert_eq!(
            reference,
            MapReference::Remote("https://example.com/app.js.map".to_string())
        );
    }

    #[test]
    fn test_parse_relative_url_is_remote() {
        let reference = MapReference::parse("app.js.map").unwrap();
        assert_eq!(reference, MapReference::Remote("app.js.map".to_string()));
    }

    #[test]
    fn test_decode_inline_base64() {
        let text = decode_inline("data:application/json;base64,e30=").unwrap();
        assert_eq!(text, "{}");
    }

    #[test]
    fn test_decode_inline_plain_payload() {
        let text = decode_inline("data:application/json,{\"version\":3}").unwrap();
        assert_eq!(text, "{\"version\":3}");
    }

    #[test]
    fn test_decode_inline_is_idempotent() {
        let data_url = "data:application/json;charset=utf-8;base64,eyJ2ZXJzaW9uIjozfQ==";
        let first = decode_inline(data_url).unwrap();
        let second = decode_inline(data_url).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "{\"version\":3}");
    }

    #[test]
    fn test_decode_inline_missing_separator() {
        let err = decode_inline("data:application/json;base64").unwrap_err();
        assert!(err.contains("missing ','"));
    }

    #[test]
    fn test_decode_inline_invalid_base64() {
        let err = decode_inline("data:application/json;base64,!!!").unwrap_err();
        assert!(err.contains("Invalid"), "unexpected diagnostic: {err}");
    }

    #[test]
    fn test_decode_inline_invalid_utf8() {
        // base64 of the single byte 0xFF, which is not valid UTF-8.
        let err = decode_inline("data:application/json;base64,/w==").unwrap_err();
        assert!(err.contains("utf-8"), "unexpected diagnostic: {err}");
    }
}
