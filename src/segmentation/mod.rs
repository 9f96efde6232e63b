mod engine;
mod model_cache;
#[cfg(feature = "onnx")]
mod onnx;
mod preprocess;
pub mod types;

pub use engine::{fingerprint, SegmentationEngine, FINGERPRINT_LEN};
pub use model_cache::{BackendLoader, ModelCache, SegmenterModel, STUB_MODEL_NAME, STUB_MODEL_VERSION};
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use preprocess::{Preprocessor, MASK_THRESHOLD};
pub use types::{BackendTag, Matte, SegmentResult, SegmentationBackend};

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Load the native segmentation backend (ONNX) from `model_path`
#[cfg(feature = "onnx")]
pub fn load_native_backend(model_path: Option<&Path>) -> Result<Arc<dyn SegmentationBackend>> {
    let path = model_path.ok_or_else(|| anyhow::anyhow!("no segmentation model configured"))?;
    let model = OnnxSegmenter::new(path)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
pub fn load_native_backend(_model_path: Option<&Path>) -> Result<Arc<dyn SegmentationBackend>> {
    anyhow::bail!("built without the `onnx` feature")
}

/// Model cache that lazily loads the native backend from `model_path`
pub fn create_model_cache(model_path: Option<PathBuf>) -> ModelCache {
    ModelCache::new(Box::new(move || load_native_backend(model_path.as_deref())))
}
