//! Hair-color try-on core.
//!
//! A selfie payload flows through
//! [`MediaValidator`](media::MediaValidator) →
//! [`SegmentationEngine`](segmentation::SegmentationEngine) →
//! [`RecolorEngine`](recolor::RecolorEngine) →
//! [`PostprocessEngine`](postprocess::PostprocessEngine) →
//! [`OutputStore`](output::OutputStore), sequenced by
//! [`PipelineOrchestrator`](pipeline::PipelineOrchestrator).

pub mod config;
pub mod error;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod postprocess;
pub mod recolor;
pub mod segmentation;

pub use config::ServiceConfig;
pub use error::{ErrorBody, StatusClass, TryOnError};
pub use pipeline::{PipelineOrchestrator, TryOnRequest, TryOnResponse};
