use super::preprocess::Preprocessor;
use super::types::{Matte, SegmentationBackend};
use anyhow::{ensure, Context, Result};
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;

/// Default model input edge length
const INPUT_SIZE: u32 = 256;

/// Hair segmentation model running on ONNX Runtime
///
/// Expects a single `[1, 3, H, W]` float input normalized to [0, 1] and
/// reads the matte from the first output (`[1, 1, H, W]` or `[1, H, W]`).
pub struct OnnxSegmenter {
    session: Mutex<Option<Session>>,
    preprocessor: Preprocessor,
    name: String,
    version: String,
}

impl OnnxSegmenter {
    /// Load a segmentation model from an ONNX file
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading segmentation model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();

        tracing::info!("Segmentation model {} loaded successfully", stem);

        Ok(Self {
            session: Mutex::new(Some(session)),
            preprocessor: Preprocessor::new(INPUT_SIZE, INPUT_SIZE),
            version: format!("onnx-{}", stem),
            name: stem,
        })
    }
}

impl SegmentationBackend for OnnxSegmenter {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn is_available(&self) -> bool {
        self.session.lock().is_some()
    }

    fn segment(&self, frame: &RgbImage) -> Result<Option<Matte>> {
        let _span = tracing::debug_span!("onnx_segment").entered();

        let input_tensor = Tensor::from_array(self.preprocessor.preprocess(frame))?;

        let mut guard = self.session.lock();
        let session = guard.as_mut().context("segmentation session was released")?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .context("Failed to run inference")?;

        if outputs.len() == 0 {
            return Ok(None);
        }

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        ensure!(shape.len() >= 2, "unexpected matte shape {:?}", shape);

        let height = shape[shape.len() - 2] as u32;
        let width = shape[shape.len() - 1] as u32;

        Ok(Some(Matte {
            width,
            height,
            values: data.to_vec(),
        }))
    }

    fn release(&self) -> Result<()> {
        tracing::info!("Releasing ONNX session for {}", self.name);
        self.session.lock().take();
        Ok(())
    }
}
