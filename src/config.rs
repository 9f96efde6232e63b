use crate::media::DEFAULT_MAX_SELFIE_BYTES;
use crate::output::DEFAULT_OUTPUT_TTL;
use crate::postprocess::PostprocessConfig;
use crate::recolor::DEFAULT_CDN_BASE;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/color-me-outputs";

/// Effective parameters of the try-on core
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Upper bound on decoded selfie size
    pub max_selfie_bytes: usize,
    /// Lifetime of stored artifacts
    pub output_ttl: Duration,
    /// Where front ends persist retrieved artifacts
    pub output_dir: PathBuf,
    /// ONNX segmentation model; `None` runs on the stub backend
    pub model_path: Option<PathBuf>,
    /// Prefix of recolor references
    pub cdn_base: String,
    pub postprocess: PostprocessConfig,
    /// Run mask refinement on native masks
    pub refine_mask: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_selfie_bytes: DEFAULT_MAX_SELFIE_BYTES,
            output_ttl: DEFAULT_OUTPUT_TTL,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            model_path: None,
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            postprocess: PostprocessConfig::default(),
            refine_mask: false,
        }
    }
}

impl ServiceConfig {
    /// Set the TTL from signed seconds, clamping negatives to zero
    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.output_ttl = Duration::from_secs(ttl_seconds.max(0) as u64);
        self
    }
}
