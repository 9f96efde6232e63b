use crate::config::ServiceConfig;
use crate::error::{Result, TryOnError};
use crate::media::MediaValidator;
use crate::output::{ArtifactRenderer, OutputStore, PlaceholderRenderer, RenderInput, StoredOutput};
use crate::postprocess::PostprocessEngine;
use crate::recolor::RecolorEngine;
use crate::segmentation::{create_model_cache, ModelCache, SegmentationEngine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Try-on request as received from the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryOnRequest {
    /// Data URL or bare base64 image
    pub selfie: String,
    pub color: String,
    /// 0-100
    pub intensity: u8,
    pub request_id: String,
}

impl TryOnRequest {
    /// Check field constraints that precede payload validation
    pub fn validate(&self) -> Result<()> {
        if self.color.trim().is_empty() {
            return Err(invalid("color", "must not be blank"));
        }
        if self.intensity > 100 {
            return Err(invalid("intensity", "must be between 0 and 100"));
        }
        if self.request_id.trim().is_empty() {
            return Err(invalid("request_id", "must not be blank"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> TryOnError {
    TryOnError::InvalidRequest {
        field,
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryOnResponse {
    pub image_url: String,
    /// Always at least 1
    pub processing_ms: u64,
    pub request_id: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

/// Absolute retrieval URL of a stored artifact
pub fn image_url(base_url: &str, image_id: &str) -> String {
    format!("{}/images/{}", base_url.trim_end_matches('/'), image_id)
}

/// Identifier at the end of a retrieval URL
pub fn image_id_from_url(url: &str) -> Option<&str> {
    url.rsplit_once("/images/")
        .map(|(_, id)| id)
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

/// Runs validation, segmentation, recolor, postprocess and storage for one
/// request
///
/// Each call runs synchronously on the caller's thread; the orchestrator is
/// shared between workers.
pub struct PipelineOrchestrator {
    validator: MediaValidator,
    segmenter: SegmentationEngine,
    recolor: RecolorEngine,
    postprocess: PostprocessEngine,
    renderer: Box<dyn ArtifactRenderer>,
    store: Arc<OutputStore>,
}

impl PipelineOrchestrator {
    pub fn new(cache: Arc<ModelCache>, store: Arc<OutputStore>, config: &ServiceConfig) -> Self {
        let validator = MediaValidator::new(config.max_selfie_bytes);
        Self {
            validator,
            segmenter: SegmentationEngine::new(cache, validator),
            recolor: RecolorEngine::new(config.cdn_base.clone()),
            postprocess: PostprocessEngine::new(config.postprocess, config.refine_mask),
            renderer: Box::new(PlaceholderRenderer),
            store,
        }
    }

    /// Build every collaborator from `config`
    pub fn from_config(config: &ServiceConfig) -> Self {
        let cache = Arc::new(create_model_cache(config.model_path.clone()));
        let store = Arc::new(OutputStore::new(config.output_ttl));
        Self::new(cache, store, config)
    }

    pub fn with_renderer(mut self, renderer: Box<dyn ArtifactRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn store(&self) -> &Arc<OutputStore> {
        &self.store
    }

    pub fn model_cache(&self) -> &Arc<ModelCache> {
        self.segmenter.cache()
    }

    /// Process one try-on request
    ///
    /// Request and payload validation failures are returned unchanged before
    /// any segmentation work happens.
    pub fn process(&self, request: &TryOnRequest, base_url: &str) -> Result<TryOnResponse> {
        let _span = tracing::info_span!("try_on", request_id = %request.request_id).entered();
        let started = Instant::now();

        request.validate()?;
        let media = self.validator.validate(&request.selfie)?;

        let segment = self.segmenter.segment(&request.selfie);
        let recolor = self.recolor.apply(&segment, &request.color, request.intensity);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis())
            .unwrap_or(u64::MAX)
            .max(1);

        let post = self
            .postprocess
            .apply(&segment, &recolor, request.intensity, elapsed_ms);

        let artifact = self.renderer.render(&RenderInput {
            segment: &segment,
            recolor: &recolor,
            mask: post.mask.as_ref().or(segment.mask.as_ref()),
        })?;
        let image_id = self.store.save(artifact.data, &artifact.content_type);

        let mut details = post.metadata;
        details.insert("mime_type".to_string(), media.mime_type);

        tracing::info!(
            "Processed try-on: color={}, intensity={}, backend={}, {}ms",
            recolor.color,
            request.intensity,
            segment.backend,
            elapsed_ms
        );

        Ok(TryOnResponse {
            image_url: image_url(base_url, &image_id),
            processing_ms: elapsed_ms,
            request_id: request.request_id.clone(),
            color: recolor.color,
            details: Some(details),
        })
    }

    /// Fetch a stored artifact by identifier
    pub fn retrieve(&self, image_id: &str) -> Result<StoredOutput> {
        self.store.get(image_id)
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("validator", &self.validator)
            .field("segmenter", &self.segmenter)
            .field("postprocess", &self.postprocess)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
