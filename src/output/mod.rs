mod render;
mod store;

pub use render::{placeholder_png_bytes, PlaceholderRenderer};
pub use store::{Clock, OutputStore, StoredOutput, SystemClock, DEFAULT_OUTPUT_TTL};

use crate::recolor::RecolorResult;
use crate::segmentation::SegmentResult;
use anyhow::Result;
use image::GrayImage;

/// Everything a renderer may draw on
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub segment: &'a SegmentResult,
    pub recolor: &'a RecolorResult,
    /// Refined mask when postprocessing produced one, else the raw mask
    pub mask: Option<&'a GrayImage>,
}

/// Encoded image ready for the output store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Produces the artifact bytes served back to clients
///
/// This is where recolored pixels get rendered; [`PlaceholderRenderer`]
/// stands in until a real compositor exists.
pub trait ArtifactRenderer: Send + Sync {
    fn render(&self, input: &RenderInput<'_>) -> Result<RenderedArtifact>;
}
