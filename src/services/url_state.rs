//! URL state codec — shareable links that carry a whole design.
//!
//! DESIGN
//! ======
//! A design is serialized to JSON, raw-DEFLATE compressed, and written as
//! URL-safe base64 without padding into a single `design` query parameter.
//! That alphabet (`A-Z a-z 0-9 - _`) never needs percent-encoding, so the
//! payload length is exactly what lands in the address bar.
//!
//! Links longer than [`MAX_URL_LENGTH`] are refused rather than truncated;
//! callers fall back to local storage and can warn the user.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here panics or propagates host failures. Encode and decode return
//! typed errors whose `tag()` is the stable string the UI keys messages on.

use std::io::{Read, Write};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use tracing::{debug, warn};
use url::Url;

use crate::backend::{Clipboard, ClipboardError, Navigator};
use crate::design::DesignSystem;

/// Hard ceiling on a shareable URL, in characters.
pub const MAX_URL_LENGTH: usize = 2000;

/// Query parameter holding the compressed design.
pub const DESIGN_PARAM: &str = "design";

/// Upper bound on inflated payload size, guarding against compression bombs.
const MAX_DECOMPRESSED_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UrlEncodeError {
    #[error("shareable URL is {length} characters; the limit is {MAX_URL_LENGTH}")]
    TooLong { length: usize },
    #[error("design could not be encoded: {0}")]
    EncodingFailed(String),
}

impl UrlEncodeError {
    /// Stable warning tag.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::TooLong { .. } => "url-too-long",
            Self::EncodingFailed(_) => "encoding-failed",
        }
    }

    /// Computed URL length, when the failure was an overflow.
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        match self {
            Self::TooLong { length } => Some(*length),
            Self::EncodingFailed(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UrlDecodeError {
    #[error("no design parameter in URL")]
    NoParam,
    #[error("design parameter is not a valid compressed payload")]
    InvalidCompression,
    #[error("design parameter holds invalid JSON: {0}")]
    InvalidJson(String),
    #[error("design parameter could not be decoded: {0}")]
    DecodingFailed(String),
}

impl UrlDecodeError {
    /// Stable error tag.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::NoParam => "no-param",
            Self::InvalidCompression => "invalid-compression",
            Self::InvalidJson(_) => "invalid-json",
            Self::DecodingFailed(_) => "decoding-failed",
        }
    }
}

/// A successfully built share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedUrl {
    pub url: String,
    pub length: usize,
}

// =============================================================================
// PAYLOAD CODEC
// =============================================================================

/// Compress a design into the query-parameter payload.
///
/// # Errors
///
/// Returns [`UrlEncodeError::EncodingFailed`] if serialization or
/// compression fails.
pub fn encode_payload(design: &DesignSystem) -> Result<String, UrlEncodeError> {
    let json = serde_json::to_string(design).map_err(|e| UrlEncodeError::EncodingFailed(e.to_string()))?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(json.as_bytes())
        .map_err(|e| UrlEncodeError::EncodingFailed(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| UrlEncodeError::EncodingFailed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Inverse of [`encode_payload`].
///
/// # Errors
///
/// `InvalidCompression` for bad base64, bad DEFLATE data, non-UTF-8 or
/// empty output; `InvalidJson` for a JSON syntax error; `DecodingFailed`
/// for JSON that does not describe a design.
pub fn decode_payload(payload: &str) -> Result<DesignSystem, UrlDecodeError> {
    let json = decompress(payload)?;
    serde_json::from_str(&json).map_err(|e| {
        if e.is_syntax() || e.is_eof() {
            UrlDecodeError::InvalidJson(e.to_string())
        } else {
            UrlDecodeError::DecodingFailed(e.to_string())
        }
    })
}

fn decompress(payload: &str) -> Result<String, UrlDecodeError> {
    let compressed = URL_SAFE_NO_PAD.decode(payload.trim()).map_err(|e| {
        debug!(error = %e, "design payload is not base64");
        UrlDecodeError::InvalidCompression
    })?;

    let mut json = String::new();
    let read = DeflateDecoder::new(compressed.as_slice())
        .take(MAX_DECOMPRESSED_BYTES + 1)
        .read_to_string(&mut json);
    match read {
        Ok(0) => Err(UrlDecodeError::InvalidCompression),
        Ok(n) if n as u64 > MAX_DECOMPRESSED_BYTES => {
            warn!(limit = MAX_DECOMPRESSED_BYTES, "design payload inflates past limit");
            Err(UrlDecodeError::InvalidCompression)
        }
        Ok(_) => Ok(json),
        Err(e) => {
            debug!(error = %e, "design payload failed to inflate");
            Err(UrlDecodeError::InvalidCompression)
        }
    }
}

// =============================================================================
// URL HELPERS
// =============================================================================

fn design_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == DESIGN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// `<origin><path>?design=<payload>` for the page at `href`, unbounded.
///
/// # Errors
///
/// Returns [`UrlEncodeError::EncodingFailed`] if `href` is not a URL or the
/// design cannot be compressed.
pub fn build_share_url(href: &str, design: &DesignSystem) -> Result<String, UrlEncodeError> {
    let base = Url::parse(href).map_err(|e| UrlEncodeError::EncodingFailed(format!("invalid page URL: {e}")))?;
    let payload = encode_payload(design)?;
    Ok(format!(
        "{}{}?{DESIGN_PARAM}={payload}",
        base.origin().ascii_serialization(),
        base.path()
    ))
}

/// Decode the design carried by an arbitrary URL.
///
/// # Errors
///
/// As [`decode_payload`], plus `NoParam` when `href` is unparseable or
/// carries no non-empty `design` parameter.
pub fn decode_design_from_href(href: &str) -> Result<DesignSystem, UrlDecodeError> {
    let url = Url::parse(href).map_err(|e| {
        debug!(error = %e, "page URL is unparseable");
        UrlDecodeError::NoParam
    })?;
    let payload = design_param(&url).ok_or(UrlDecodeError::NoParam)?;
    decode_payload(&payload)
}

fn strip_design_param(href: &str) -> Option<String> {
    let Ok(mut url) = Url::parse(href) else {
        return None;
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != DESIGN_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    Some(url.into())
}

// =============================================================================
// CODEC
// =============================================================================

/// Reads and writes designs through the page URL.
pub struct UrlStateCodec {
    navigator: Arc<dyn Navigator>,
    clipboard: Option<Arc<dyn Clipboard>>,
}

impl UrlStateCodec {
    #[must_use]
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self { navigator, clipboard: None }
    }

    #[must_use]
    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// Build a share link for `design`, refusing links over [`MAX_URL_LENGTH`].
    ///
    /// # Errors
    ///
    /// [`UrlEncodeError::TooLong`] with the computed length, or
    /// [`UrlEncodeError::EncodingFailed`].
    pub fn encode_design_to_url(&self, design: &DesignSystem) -> Result<EncodedUrl, UrlEncodeError> {
        let url = build_share_url(&self.navigator.href(), design)?;
        let length = url.len();
        if length > MAX_URL_LENGTH {
            return Err(UrlEncodeError::TooLong { length });
        }
        Ok(EncodedUrl { url, length })
    }

    /// Decode the design in the current page URL.
    ///
    /// # Errors
    ///
    /// See [`decode_design_from_href`].
    pub fn decode_url_to_design(&self) -> Result<DesignSystem, UrlDecodeError> {
        decode_design_from_href(&self.navigator.href())
    }

    /// Mirror `design` into the address bar.
    ///
    /// When the design cannot be encoded, the `design` parameter is stripped
    /// instead so the bar never holds a stale or oversized link.
    pub fn update_url(&self, design: &DesignSystem, replace: bool) -> bool {
        match self.encode_design_to_url(design) {
            Ok(encoded) => {
                if replace {
                    self.navigator.replace_state(&encoded.url);
                } else {
                    self.navigator.push_state(&encoded.url);
                }
                true
            }
            Err(e) => {
                warn!(warning = e.tag(), length = e.length(), "design not written to URL");
                self.clear_url_state(true);
                false
            }
        }
    }

    /// Remove the `design` parameter, keeping any other query parameters.
    pub fn clear_url_state(&self, replace: bool) {
        let href = self.navigator.href();
        let Some(stripped) = strip_design_param(&href) else {
            warn!(href = %href, "page URL is unparseable; leaving it alone");
            return;
        };
        if replace {
            self.navigator.replace_state(&stripped);
        } else {
            self.navigator.push_state(&stripped);
        }
    }

    #[must_use]
    pub fn has_design_in_url(&self) -> bool {
        Url::parse(&self.navigator.href()).is_ok_and(|url| design_param(&url).is_some())
    }

    /// Length the share link for `design` would have, ignoring the limit.
    #[must_use]
    pub fn estimate_url_length(&self, design: &DesignSystem) -> Option<usize> {
        match build_share_url(&self.navigator.href(), design) {
            Ok(url) => Some(url.len()),
            Err(e) => {
                debug!(error = %e, "could not estimate URL length");
                None
            }
        }
    }

    #[must_use]
    pub fn can_encode_to_url(&self, design: &DesignSystem) -> bool {
        self.estimate_url_length(design)
            .is_some_and(|length| length <= MAX_URL_LENGTH)
    }

    /// Encode `design` and put the link on the clipboard.
    pub async fn copy_shareable_url(&self, design: &DesignSystem) -> bool {
        let encoded = match self.encode_design_to_url(design) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(warning = e.tag(), "share link not copied");
                return false;
            }
        };
        let Some(clipboard) = &self.clipboard else {
            warn!(error = %ClipboardError::Unavailable, "share link not copied");
            return false;
        };
        match clipboard.write_text(&encoded.url).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "share link not copied");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "url_state_test.rs"]
mod tests;
