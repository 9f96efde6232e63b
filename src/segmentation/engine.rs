use super::model_cache::ModelCache;
use super::preprocess::Preprocessor;
use super::types::{SegmentResult, SegmentationBackend};
use crate::media::MediaValidator;
use anyhow::{Context, Result};
use image::GrayImage;
use sha1::{Digest, Sha1};
use std::sync::Arc;

/// Hex characters kept from the payload digest
pub const FINGERPRINT_LEN: usize = 12;

/// Content fingerprint of a raw selfie payload: leading SHA-1 hex digits
///
/// Used as the mask identifier whichever backend handles the request.
pub fn fingerprint(selfie: &str) -> String {
    let digest = Sha1::digest(selfie.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Produces a [`SegmentResult`] for every payload, falling back to a stub
/// result whenever the native backend is missing or fails
#[derive(Debug, Clone)]
pub struct SegmentationEngine {
    cache: Arc<ModelCache>,
    validator: MediaValidator,
}

impl SegmentationEngine {
    pub fn new(cache: Arc<ModelCache>, validator: MediaValidator) -> Self {
        Self { cache, validator }
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn segment(&self, selfie: &str) -> SegmentResult {
        let _span = tracing::debug_span!("segment").entered();

        let mask_id = fingerprint(selfie);
        let model = self.cache.acquire();

        let backend = match model.backend() {
            Some(backend) if backend.is_available() => backend,
            _ => return SegmentResult::stub(mask_id, &model.version),
        };

        match self.segment_native(selfie, backend.as_ref()) {
            Ok(mask) => SegmentResult::native(mask_id, &model.version, mask),
            Err(err) => {
                tracing::warn!(
                    "Native segmentation failed for {}, using stub: {:#}",
                    mask_id,
                    err
                );
                SegmentResult::stub(mask_id, &model.version)
            }
        }
    }

    fn segment_native(&self, selfie: &str, backend: &dyn SegmentationBackend) -> Result<GrayImage> {
        let (_, bytes) = self
            .validator
            .decode(selfie)
            .context("Failed to decode selfie payload")?;

        let frame = image::load_from_memory(&bytes)
            .context("Failed to decode selfie image")?
            .to_rgb8();
        let (width, height) = frame.dimensions();

        let matte = backend
            .segment(&frame)?
            .context("Segmentation backend returned no mask")?;
        let matte = Preprocessor::fit_matte(matte, width, height)?;

        Ok(Preprocessor::binarize(&matte))
    }
}
