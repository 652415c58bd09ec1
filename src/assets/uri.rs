//! URI classification and resolution.
//!
//! Buffer and image references in an asset document come in three shapes:
//! `data:` URIs carrying their payload inline, absolute URIs with a scheme,
//! and relative paths resolved against the document's base URI.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::errors::{GeosceneError, Result};

/// The shape of a candidate URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriKind {
    /// `data:` scheme, payload inline.
    Data,
    /// Carries its own scheme (`http://`, `file://`, ...).
    Absolute,
    /// Resolved against the base URI.
    Relative,
}

/// Classifies a candidate URI.
#[must_use]
pub fn classify(uri: &str) -> UriKind {
    if uri.starts_with("data:") {
        return UriKind::Data;
    }
    if has_scheme(uri) {
        return UriKind::Absolute;
    }
    UriKind::Relative
}

/// Matches `^[a-z][-+.0-9a-z]*://`.
fn has_scheme(uri: &str) -> bool {
    let Some((scheme, _)) = uri.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
}

/// Returns a fetchable URI for `uri` relative to `base`.
///
/// Data and absolute URIs are returned as-is. A relative URI is appended to
/// the base with its last path segment stripped (the final `/` stays on the
/// prefix; the prefix is empty when the base has no `/`).
#[must_use]
pub fn resolve(uri: &str, base: &str) -> String {
    match classify(uri) {
        UriKind::Data | UriKind::Absolute => uri.to_string(),
        UriKind::Relative => {
            let prefix = match base.rfind('/') {
                Some(pos) => &base[..=pos],
                None => "",
            };
            format!("{prefix}{uri}")
        }
    }
}

/// Decodes the payload of a `data:` URI.
///
/// Returns the media type (when present) and the raw bytes. Base64 payloads
/// are decoded; other payloads are taken verbatim.
pub fn decode_data_uri(uri: &str) -> Result<(Option<String>, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| GeosceneError::DataUriError(format!("not a data URI: {uri}")))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| GeosceneError::DataUriError("missing ',' separator".to_string()))?;

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(mt) => (mt, true),
        None => (header, false),
    };
    let media_type = if media_type.is_empty() {
        None
    } else {
        Some(media_type.to_string())
    };

    let bytes = if is_base64 {
        BASE64.decode(payload)?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok((media_type, bytes))
}
