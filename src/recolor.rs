use crate::segmentation::SegmentResult;
use std::collections::BTreeMap;

pub const DEFAULT_CDN_BASE: &str = "https://cdn.example.com/processed";

/// Outcome of the recolor stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecolorResult {
    pub image_url: String,
    pub color: String,
    pub intensity: u8,
    pub metadata: BTreeMap<String, String>,
}

/// Derives a deterministic artifact reference from the segmentation result,
/// the requested color and intensity
#[derive(Debug, Clone)]
pub struct RecolorEngine {
    cdn_base: String,
}

impl Default for RecolorEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CDN_BASE)
    }
}

impl RecolorEngine {
    pub fn new(cdn_base: impl Into<String>) -> Self {
        let cdn_base = cdn_base.into();
        Self {
            cdn_base: cdn_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn apply(&self, segment: &SegmentResult, color: &str, intensity: u8) -> RecolorResult {
        let image_url = format!(
            "{}/{}-{}-{}.png",
            self.cdn_base,
            color_slug(color),
            intensity,
            segment.mask_id
        );

        let metadata = BTreeMap::from([
            ("segment_mask_id".to_string(), segment.mask_id.clone()),
            ("segment_model_version".to_string(), segment.model_version.clone()),
        ]);

        RecolorResult {
            image_url,
            color: color.to_string(),
            intensity,
            metadata,
        }
    }
}

/// Lowercase color name with every space replaced by `-`
pub fn color_slug(color: &str) -> String {
    color.replace(' ', "-").to_lowercase()
}
