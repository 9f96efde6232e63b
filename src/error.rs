use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failures surfaced by the try-on core
///
/// Every variant maps onto a stable `code` and a boundary [`StatusClass`];
/// the transport layer only has to serialize [`ErrorBody`].
#[derive(Debug, Error)]
pub enum TryOnError {
    #[error("selfie exceeds the allowed size of {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: usize },

    #[error("unsupported image format `{mime_type}`, use PNG or JPEG")]
    UnsupportedMediaType { mime_type: String },

    #[error("selfie data is invalid or corrupt")]
    InvalidSelfieData,

    #[error("invalid request field `{field}`: {reason}")]
    InvalidRequest { field: &'static str, reason: String },

    #[error("image `{image_id}` does not exist or has expired")]
    ArtifactNotFound { image_id: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Boundary classification of a [`TryOnError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    BadRequest,
    NotFound,
    PayloadTooLarge,
    UnsupportedMediaType,
    Internal,
}

impl StatusClass {
    /// HTTP status code conventionally used for this class
    pub fn http_status(self) -> u16 {
        match self {
            StatusClass::BadRequest => 400,
            StatusClass::NotFound => 404,
            StatusClass::PayloadTooLarge => 413,
            StatusClass::UnsupportedMediaType => 415,
            StatusClass::Internal => 500,
        }
    }

    pub fn is_client_error(self) -> bool {
        self != StatusClass::Internal
    }
}

/// Error payload handed to the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

impl TryOnError {
    pub fn code(&self) -> &'static str {
        match self {
            TryOnError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            TryOnError::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            TryOnError::InvalidSelfieData => "INVALID_SELFIE",
            TryOnError::InvalidRequest { .. } => "VALIDATION_ERROR",
            TryOnError::ArtifactNotFound { .. } => "IMAGE_NOT_FOUND",
            TryOnError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusClass {
        match self {
            TryOnError::PayloadTooLarge { .. } => StatusClass::PayloadTooLarge,
            TryOnError::UnsupportedMediaType { .. } => StatusClass::UnsupportedMediaType,
            TryOnError::InvalidSelfieData | TryOnError::InvalidRequest { .. } => {
                StatusClass::BadRequest
            }
            TryOnError::ArtifactNotFound { .. } => StatusClass::NotFound,
            TryOnError::Internal(_) => StatusClass::Internal,
        }
    }

    /// Structured failure detail, if the variant carries any
    pub fn details(&self) -> Option<BTreeMap<String, String>> {
        let (key, value) = match self {
            TryOnError::PayloadTooLarge { limit_bytes } => ("max_bytes", limit_bytes.to_string()),
            TryOnError::UnsupportedMediaType { mime_type } => ("mime_type", mime_type.clone()),
            TryOnError::InvalidRequest { field, .. } => ("field", (*field).to_string()),
            TryOnError::ArtifactNotFound { image_id } => ("image_id", image_id.clone()),
            TryOnError::InvalidSelfieData | TryOnError::Internal(_) => return None,
        };
        Some(BTreeMap::from([(key.to_string(), value)]))
    }

    /// Build the boundary payload for this error.
    ///
    /// Internal errors are reported generically; their cause stays with
    /// the caller, which decides whether to log it.
    pub fn to_body(&self, request_id: &str) -> ErrorBody {
        let message = match self {
            TryOnError::Internal(_) => "error processing the image".to_string(),
            other => other.to_string(),
        };

        ErrorBody {
            code: self.code(),
            message,
            request_id: request_id.to_string(),
            details: self.details(),
        }
    }
}

pub type Result<T, E = TryOnError> = std::result::Result<T, E>;
