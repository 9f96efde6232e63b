use anyhow::Result;
use image::{GrayImage, RgbImage};
use std::fmt;

/// Continuous-valued matte produced by a backend
///
/// Values are in 0.0-1.0 (0.0 = background, 1.0 = hair), flattened in
/// row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Matte {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

/// Capability interface for native segmentation backends
///
/// Implementations must be shareable across request workers; any mutable
/// inference state lives behind the implementation's own lock.
pub trait SegmentationBackend: Send + Sync {
    /// Human readable model name
    fn name(&self) -> &str;

    /// Version identifier recorded in every result
    fn version(&self) -> &str;

    /// Whether the backend can currently serve inference calls
    fn is_available(&self) -> bool {
        true
    }

    /// Run inference on an RGB frame
    ///
    /// # Returns
    /// * `Ok(Some(matte))` on success
    /// * `Ok(None)` when the backend produced no mask
    fn segment(&self, frame: &RgbImage) -> Result<Option<Matte>>;

    /// Release native resources
    ///
    /// Default implementation: no-op for backends without explicit teardown
    fn release(&self) -> Result<()> {
        Ok(())
    }
}

/// Which capability produced a [`SegmentResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendTag {
    Native,
    Stub,
}

impl BackendTag {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendTag::Native => "native",
            BackendTag::Stub => "stub",
        }
    }
}

impl fmt::Display for BackendTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of segmenting a selfie
///
/// `mask_id` is the payload fingerprint and does not depend on `backend`.
/// Stub results carry no mask and zero dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResult {
    pub mask_id: String,
    pub model_version: String,
    pub mask: Option<GrayImage>,
    pub backend: BackendTag,
    pub width: u32,
    pub height: u32,
}

impl SegmentResult {
    pub fn stub(mask_id: String, model_version: &str) -> Self {
        Self {
            mask_id,
            model_version: model_version.to_string(),
            mask: None,
            backend: BackendTag::Stub,
            width: 0,
            height: 0,
        }
    }

    pub fn native(mask_id: String, model_version: &str, mask: GrayImage) -> Self {
        let (width, height) = mask.dimensions();
        Self {
            mask_id,
            model_version: model_version.to_string(),
            mask: Some(mask),
            backend: BackendTag::Native,
            width,
            height,
        }
    }
}
