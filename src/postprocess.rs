//! Mask refinement and client-facing metadata assembly.
//!
//! Refinement runs erosion and/or dilation, then a Gaussian feather, then an
//! anti-bleed re-threshold that restores a crisp edge after blending. All
//! steps operate on 0-255 single-channel masks via [`imageproc`].
//!
//! The feather radius is picked from the requested intensity in discrete
//! bands: higher intensity blends edges more aggressively.

use crate::recolor::RecolorResult;
use crate::segmentation::SegmentResult;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use std::collections::BTreeMap;

/// Mask refinement parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostprocessConfig {
    /// Gaussian feather radius in pixels; sigma is half the radius.
    pub feather_radius: u32,
    /// Side of the square structuring element used by erosion/dilation.
    /// Rounded up to the next odd size (4 acts as 5x5); below 2 disables
    /// both operations.
    pub morph_kernel_size: u32,
    /// Remove isolated noise pixels.
    pub enable_erosion: bool,
    /// Fill small holes.
    pub enable_dilation: bool,
    /// Values above this become 255 after feathering; 0 disables the step.
    pub anti_bleed_threshold: u8,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            feather_radius: 5,
            morph_kernel_size: 3,
            enable_erosion: false,
            enable_dilation: false,
            anti_bleed_threshold: 10,
        }
    }
}

impl PostprocessConfig {
    /// Structuring element half-width; 0 means no morphology.
    fn morph_radius(&self) -> u8 {
        u8::try_from(self.morph_kernel_size / 2).unwrap_or(u8::MAX)
    }

    fn morph_ops(&self) -> bool {
        self.morph_radius() > 0 && (self.enable_erosion || self.enable_dilation)
    }
}

/// Feather radius for an intensity in 0-100.
#[must_use]
pub fn feather_radius_for(intensity: u8) -> u32 {
    match intensity {
        70.. => 7,
        40..=69 => 5,
        _ => 3,
    }
}

/// Refine a binary segmentation mask.
///
/// Empty masks are returned unchanged. A kernel size below 2 disables the
/// morphological steps, a zero radius disables feathering.
#[must_use = "returns the refined mask"]
pub fn refine_mask(mask: &GrayImage, config: &PostprocessConfig) -> GrayImage {
    if mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }

    let mut processed = mask.clone();

    // Square element of side 2k+1 under the L-infinity norm.
    let k = config.morph_radius();
    if k > 0 {
        if config.enable_erosion {
            processed = imageproc::morphology::erode(&processed, Norm::LInf, k);
        }
        if config.enable_dilation {
            processed = imageproc::morphology::dilate(&processed, Norm::LInf, k);
        }
    }

    if config.feather_radius > 0 {
        let sigma = config.feather_radius as f32 / 2.0;
        processed = imageproc::filter::gaussian_blur_f32(&processed, sigma);
    }

    if config.anti_bleed_threshold > 0 {
        processed = anti_bleed(&processed, config.anti_bleed_threshold);
    }

    processed
}

/// Threshold a feathered mask back to 0/255.
#[must_use]
pub fn anti_bleed(mask: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = mask.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    out
}

/// Result of the postprocess stage
#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessOutput {
    /// Client-facing metadata; never contains image bytes.
    pub metadata: BTreeMap<String, String>,
    /// Refined mask, when refinement ran on a native mask.
    pub mask: Option<GrayImage>,
    /// Parameters actually used for this request.
    pub config: PostprocessConfig,
}

#[derive(Debug, Clone, Default)]
pub struct PostprocessEngine {
    config: PostprocessConfig,
    refine: bool,
}

impl PostprocessEngine {
    /// `refine` enables mask refinement; `config` supplies every parameter
    /// except the feather radius, which follows the intensity band.
    pub fn new(config: PostprocessConfig, refine: bool) -> Self {
        Self { config, refine }
    }

    pub fn apply(
        &self,
        segment: &SegmentResult,
        recolor: &RecolorResult,
        intensity: u8,
        elapsed_ms: u64,
    ) -> PostprocessOutput {
        let _span = tracing::debug_span!("postprocess").entered();

        let config = PostprocessConfig {
            feather_radius: feather_radius_for(intensity),
            ..self.config
        };

        let mask = match (&segment.mask, self.refine) {
            (Some(mask), true) => Some(refine_mask(mask, &config)),
            _ => None,
        };
        let refined = mask.is_some();

        let morph_ops = refined && config.morph_ops();
        let anti_bleed = refined && config.anti_bleed_threshold > 0;

        let mut metadata = recolor.metadata.clone();
        metadata.extend([
            ("intensity".to_string(), intensity.to_string()),
            ("processing_ms".to_string(), elapsed_ms.to_string()),
            ("mask_hash".to_string(), segment.mask_id.clone()),
            ("backend".to_string(), segment.backend.to_string()),
            ("feather_radius".to_string(), config.feather_radius.to_string()),
            (
                "postprocess".to_string(),
                format!(
                    "feather_radius={},morph_ops={},anti_bleed={}",
                    config.feather_radius, morph_ops, anti_bleed
                ),
            ),
            ("mask_refined".to_string(), refined.to_string()),
        ]);

        PostprocessOutput {
            metadata,
            mask,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recolor::RecolorEngine;
    use crate::segmentation::BackendTag;

    /// 100x100 mask with a white square covering [lo, hi) on both axes.
    fn square_mask(lo: u32, hi: u32) -> GrayImage {
        GrayImage::from_fn(100, 100, |x, y| {
            let inside = (lo..hi).contains(&x) && (lo..hi).contains(&y);
            image::Luma([if inside { 255 } else { 0 }])
        })
    }

    fn no_ops() -> PostprocessConfig {
        PostprocessConfig {
            feather_radius: 0,
            morph_kernel_size: 3,
            enable_erosion: false,
            enable_dilation: false,
            anti_bleed_threshold: 0,
        }
    }

    fn stub_segment() -> SegmentResult {
        SegmentResult::stub("mask-id".to_string(), "stub-v0.1.0")
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PostprocessConfig::default();
        assert_eq!(config.feather_radius, 5);
        assert_eq!(config.morph_kernel_size, 3);
        assert!(!config.enable_erosion);
        assert!(!config.enable_dilation);
        assert_eq!(config.anti_bleed_threshold, 10);
    }

    #[test]
    fn feather_bands() {
        assert_eq!(feather_radius_for(100), 7);
        assert_eq!(feather_radius_for(80), 7);
        assert_eq!(feather_radius_for(70), 7);
        assert_eq!(feather_radius_for(69), 5);
        assert_eq!(feather_radius_for(50), 5);
        assert_eq!(feather_radius_for(40), 5);
        assert_eq!(feather_radius_for(39), 3);
        assert_eq!(feather_radius_for(20), 3);
        assert_eq!(feather_radius_for(0), 3);
    }

    #[test]
    fn empty_mask_is_unchanged() {
        let mask = GrayImage::new(0, 0);
        assert_eq!(refine_mask(&mask, &PostprocessConfig::default()), mask);
    }

    #[test]
    fn feathering_blurs_edges() {
        let config = PostprocessConfig {
            feather_radius: 5,
            ..no_ops()
        };
        let result = refine_mask(&square_mask(25, 75), &config);

        let edge = result.get_pixel(50, 24).0[0];
        assert!(edge > 0, "edge pixel should pick up blur");
        assert!(edge < 255, "edge pixel should not be fully white");
        assert!(result.get_pixel(50, 50).0[0] > 200);
    }

    #[test]
    fn erosion_removes_isolated_noise() {
        let mut mask = square_mask(25, 75);
        mask.put_pixel(10, 10, image::Luma([255]));

        let config = PostprocessConfig {
            enable_erosion: true,
            ..no_ops()
        };
        let result = refine_mask(&mask, &config);

        assert_eq!(result.get_pixel(10, 10).0[0], 0);
        assert_eq!(result.get_pixel(50, 50).0[0], 255);
        assert_eq!(result.get_pixel(25, 25).0[0], 0);
    }

    #[test]
    fn dilation_fills_small_holes() {
        let mut mask = square_mask(25, 75);
        mask.put_pixel(50, 50, image::Luma([0]));

        let config = PostprocessConfig {
            enable_dilation: true,
            ..no_ops()
        };
        let result = refine_mask(&mask, &config);

        assert_eq!(result.get_pixel(50, 50).0[0], 255);
    }

    #[test]
    fn anti_bleed_restores_binary_edges() {
        let blurred = refine_mask(
            &square_mask(25, 75),
            &PostprocessConfig {
                feather_radius: 5,
                ..no_ops()
            },
        );
        let result = refine_mask(
            &blurred,
            &PostprocessConfig {
                anti_bleed_threshold: 100,
                ..no_ops()
            },
        );

        assert_eq!(result.get_pixel(50, 50).0[0], 255);
        assert_eq!(result.get_pixel(50, 20).0[0], 0);
        assert!(result.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn chained_operations_stay_binary() {
        let mut mask = square_mask(30, 70);
        mask.put_pixel(50, 50, image::Luma([0]));

        let config = PostprocessConfig {
            feather_radius: 3,
            morph_kernel_size: 3,
            enable_erosion: true,
            enable_dilation: false,
            anti_bleed_threshold: 50,
        };
        let result = refine_mask(&mask, &config);

        assert_eq!(result.dimensions(), (100, 100));
        assert!(result.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(result.get_pixel(40, 40).0[0], 255);
    }

    #[test]
    fn metadata_reports_band_and_trace_fields() {
        let segment = stub_segment();
        let recolor = RecolorEngine::default().apply(&segment, "Sunlit Amber", 80);
        let output = PostprocessEngine::default().apply(&segment, &recolor, 80, 12);

        let metadata = &output.metadata;
        assert_eq!(metadata["feather_radius"], "7");
        assert!(metadata["postprocess"].contains("feather_radius=7"));
        assert_eq!(metadata["intensity"], "80");
        assert_eq!(metadata["processing_ms"], "12");
        assert_eq!(metadata["mask_hash"], "mask-id");
        assert_eq!(metadata["backend"], "stub");
        assert_eq!(metadata["segment_mask_id"], "mask-id");
        assert_eq!(metadata["segment_model_version"], "stub-v0.1.0");
        assert_eq!(metadata["mask_refined"], "false");
    }

    #[test]
    fn low_intensity_uses_min_feathering() {
        let segment = stub_segment();
        let recolor = RecolorEngine::default().apply(&segment, "Sunlit Amber", 20);
        let output = PostprocessEngine::default().apply(&segment, &recolor, 20, 1);
        assert!(output.metadata["postprocess"].contains("feather_radius=3"));
        assert_eq!(output.config.feather_radius, 3);
    }

    #[test]
    fn refinement_skips_stub_results() {
        let engine = PostprocessEngine::new(PostprocessConfig::default(), true);
        let segment = stub_segment();
        let recolor = RecolorEngine::default().apply(&segment, "Copper", 50);
        let output = engine.apply(&segment, &recolor, 50, 1);

        assert!(output.mask.is_none());
        assert!(output.metadata["postprocess"].ends_with("morph_ops=false,anti_bleed=false"));
    }

    #[test]
    fn refinement_runs_on_native_masks() {
        let config = PostprocessConfig {
            enable_erosion: true,
            ..PostprocessConfig::default()
        };
        let engine = PostprocessEngine::new(config, true);
        let segment = SegmentResult::native("mask-id".to_string(), "onnx-hair", square_mask(25, 75));
        let recolor = RecolorEngine::default().apply(&segment, "Copper", 50);
        let output = engine.apply(&segment, &recolor, 50, 1);

        assert_eq!(segment.backend, BackendTag::Native);
        let mask = output.mask.unwrap();
        assert_eq!(mask.dimensions(), (100, 100));
        assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(output.metadata["backend"], "native");
        assert_eq!(output.metadata["mask_refined"], "true");
        assert_eq!(
            output.metadata["postprocess"],
            "feather_radius=5,morph_ops=true,anti_bleed=true"
        );
    }

    #[test]
    fn tiny_kernel_reports_no_morphology() {
        let config = PostprocessConfig {
            morph_kernel_size: 1,
            enable_erosion: true,
            ..PostprocessConfig::default()
        };
        let engine = PostprocessEngine::new(config, true);
        let segment = SegmentResult::native("mask-id".to_string(), "onnx-hair", square_mask(25, 75));
        let recolor = RecolorEngine::default().apply(&segment, "Copper", 50);
        let output = engine.apply(&segment, &recolor, 50, 1);

        assert_eq!(
            output.metadata["postprocess"],
            "feather_radius=5,morph_ops=false,anti_bleed=true"
        );
    }
}
