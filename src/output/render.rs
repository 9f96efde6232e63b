use super::{ArtifactRenderer, RenderInput, RenderedArtifact};
use crate::media::MIME_PNG;
use anyhow::{Context, Result};
use image::{GrayImage, ImageFormat};
use std::io::Cursor;

/// Encoded 1x1 black grayscale PNG
pub fn placeholder_png_bytes() -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    GrayImage::new(1, 1)
        .write_to(&mut buf, ImageFormat::Png)
        .context("Failed to encode placeholder PNG")?;
    Ok(buf.into_inner())
}

/// Returns the same placeholder image for every request
///
/// Segmentation and recolor results only shape the response metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl ArtifactRenderer for PlaceholderRenderer {
    fn render(&self, _input: &RenderInput<'_>) -> Result<RenderedArtifact> {
        Ok(RenderedArtifact {
            data: placeholder_png_bytes()?,
            content_type: MIME_PNG.to_string(),
        })
    }
}
