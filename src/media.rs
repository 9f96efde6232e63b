//! Selfie payload parsing and validation.
//!
//! A payload is either a data URL (`data:<mime>;base64,<data>`) or a bare
//! base64 string, which is assumed to be PNG.

use crate::error::{Result, TryOnError};
use base64::{engine::general_purpose, Engine};

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";

pub const SUPPORTED_MIME_TYPES: [&str; 2] = [MIME_PNG, MIME_JPEG];

/// 6 MiB
pub const DEFAULT_MAX_SELFIE_BYTES: usize = 6 * 1024 * 1024;

/// Result of validating a selfie payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub mime_type: String,
    pub size_bytes: usize,
}

/// Enforces the accepted formats and the decoded size limit
#[derive(Debug, Clone, Copy)]
pub struct MediaValidator {
    max_bytes: usize,
}

impl Default for MediaValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SELFIE_BYTES)
    }
}

impl MediaValidator {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Validate a payload and report its mime type and decoded size
    pub fn validate(&self, selfie: &str) -> Result<MediaInfo> {
        let (mime_type, data) = self.decode(selfie)?;
        Ok(MediaInfo {
            mime_type,
            size_bytes: data.len(),
        })
    }

    /// Validate a payload and return its mime type with the decoded bytes
    pub fn decode(&self, selfie: &str) -> Result<(String, Vec<u8>)> {
        let (mime_type, body) = split_payload(selfie)?;
        if !SUPPORTED_MIME_TYPES.contains(&mime_type) {
            return Err(TryOnError::UnsupportedMediaType {
                mime_type: mime_type.to_string(),
            });
        }

        let decoded = decode_base64(body)?;
        if decoded.len() > self.max_bytes {
            return Err(TryOnError::PayloadTooLarge {
                limit_bytes: self.max_bytes,
            });
        }

        Ok((mime_type.to_string(), decoded))
    }
}

/// Split a payload into `(mime_type, base64_body)`.
fn split_payload(selfie: &str) -> Result<(&str, &str)> {
    if let Some((mime, body)) = parse_data_url(selfie.trim()) {
        return Ok((mime, body));
    }

    if selfie.is_empty() || !selfie.chars().all(is_base64_or_space) {
        return Err(TryOnError::InvalidSelfieData);
    }
    Ok((MIME_PNG, selfie))
}

fn parse_data_url(payload: &str) -> Option<(&str, &str)> {
    let rest = payload.strip_prefix("data:")?;
    let (mime, body) = rest.split_once(";base64,")?;

    let mime_ok = !mime.is_empty()
        && mime
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '/' | '+' | '.' | '-'));
    let body_ok = !body.is_empty() && body.chars().all(is_base64_or_space);

    (mime_ok && body_ok).then_some((mime, body))
}

fn is_base64_or_space(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=') || c.is_whitespace()
}

fn decode_base64(body: &str) -> Result<Vec<u8>> {
    let cleaned: String = body.split_whitespace().collect();
    if cleaned.is_empty() {
        return Err(TryOnError::InvalidSelfieData);
    }

    general_purpose::STANDARD.decode(cleaned.as_bytes()).map_err(|err| {
        tracing::debug!("Rejecting selfie payload: {}", err);
        TryOnError::InvalidSelfieData
    })
}
