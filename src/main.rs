use anyhow::{Context, Result};
use clap::Parser;
use color_me::media::{MIME_JPEG, MIME_PNG};
use color_me::pipeline::image_id_from_url;
use color_me::postprocess::PostprocessConfig;
use color_me::{PipelineOrchestrator, ServiceConfig, TryOnError, TryOnRequest};
use base64::{engine::general_purpose, Engine};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Selfie file: a data URL, bare base64 text, or a raw PNG/JPEG image
    #[arg(long)]
    selfie: PathBuf,

    /// Hair color name from the palette
    #[arg(long)]
    color: String,

    /// Recolor intensity
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    intensity: u8,

    /// Trace identifier echoed in the response
    #[arg(long)]
    request_id: Option<String>,

    /// Base address used to build retrieval URLs
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8000")]
    base_url: String,

    /// Maximum decoded selfie size in bytes
    #[arg(long, env = "MAX_SELFIE_BYTES", default_value_t = color_me::media::DEFAULT_MAX_SELFIE_BYTES)]
    max_selfie_bytes: usize,

    /// Lifetime of generated artifacts in seconds
    #[arg(long, env = "OUTPUT_TTL_SECONDS", default_value_t = 300, allow_negative_numbers = true)]
    output_ttl_seconds: i64,

    /// Directory the retrieved artifact is written to
    #[arg(long, env = "OUTPUT_DIR", default_value = color_me::config::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Path to the segmentation model (ONNX file)
    /// If not provided, runs on the stub backend without masks
    #[arg(long, env = "SEGMENTER_MODEL")]
    model: Option<PathBuf>,

    /// Prefix of recolor references
    #[arg(long, env = "RECOLOR_CDN_BASE", default_value = color_me::recolor::DEFAULT_CDN_BASE)]
    cdn_base: String,

    /// Refine native masks (morphology, feathering, anti-bleed)
    #[arg(long, env = "REFINE_MASK")]
    refine_mask: bool,

    /// Erode masks before feathering
    #[arg(long)]
    erode: bool,

    /// Dilate masks before feathering
    #[arg(long)]
    dilate: bool,

    /// Structuring element size for erosion/dilation
    #[arg(long, default_value_t = 3)]
    morph_kernel_size: u32,

    /// Re-threshold cut-off after feathering (0 disables)
    #[arg(long, default_value_t = 10)]
    anti_bleed_threshold: u8,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_selfie_bytes: self.max_selfie_bytes,
            output_dir: self.output_dir.clone(),
            model_path: self.model.clone(),
            cdn_base: self.cdn_base.clone(),
            postprocess: PostprocessConfig {
                morph_kernel_size: self.morph_kernel_size,
                enable_erosion: self.erode,
                enable_dilation: self.dilate,
                anti_bleed_threshold: self.anti_bleed_threshold,
                ..PostprocessConfig::default()
            },
            refine_mask: self.refine_mask,
            ..ServiceConfig::default()
        }
        .with_ttl_seconds(self.output_ttl_seconds)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = args.service_config();
    tracing::info!("color-me starting");
    tracing::info!("Max selfie size: {} bytes", config.max_selfie_bytes);
    tracing::info!("Output TTL: {}s", config.output_ttl.as_secs());
    match &config.model_path {
        Some(path) => tracing::info!("Segmentation model: {}", path.display()),
        None => tracing::info!("No segmentation model, running on the stub backend"),
    }

    let request = TryOnRequest {
        selfie: read_selfie(&args.selfie)?,
        color: args.color.clone(),
        intensity: args.intensity,
        request_id: args
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    };

    let pipeline = PipelineOrchestrator::from_config(&config);
    match run(&pipeline, &request, &args.base_url, &config.output_dir) {
        Ok(()) => Ok(()),
        Err(err) => {
            if let TryOnError::Internal(cause) = &err {
                tracing::error!("Unhandled error ({}): {:#}", request.request_id, cause);
            } else {
                tracing::warn!("Request {} failed: {}", request.request_id, err);
            }
            let body = err.to_body(&request.request_id);
            eprintln!("{}", serde_json::to_string_pretty(&body)?);
            std::process::exit(if err.status().is_client_error() { 2 } else { 1 });
        }
    }
}

fn run(
    pipeline: &PipelineOrchestrator,
    request: &TryOnRequest,
    base_url: &str,
    output_dir: &Path,
) -> Result<(), TryOnError> {
    let response = pipeline.process(request, base_url)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize response")?
    );

    let image_id = image_id_from_url(&response.image_url)
        .with_context(|| format!("Malformed image URL {}", response.image_url))?;
    let artifact = pipeline.retrieve(image_id)?;

    let path = write_artifact(output_dir, image_id, &artifact.content_type, &artifact.data)?;
    tracing::info!("Artifact written to {}", path.display());
    Ok(())
}

/// Load a selfie file as a pipeline payload
///
/// Text files are passed through as-is; binary images become a data URL.
fn read_selfie(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read selfie from {}", path.display()))?;

    if let Ok(text) = std::str::from_utf8(&bytes) {
        return Ok(text.trim().to_string());
    }

    let mime = match image::guess_format(&bytes) {
        Ok(image::ImageFormat::Png) => MIME_PNG,
        Ok(image::ImageFormat::Jpeg) => MIME_JPEG,
        _ => "application/octet-stream",
    };
    Ok(format!(
        "data:{};base64,{}",
        mime,
        general_purpose::STANDARD.encode(&bytes)
    ))
}

fn write_artifact(
    output_dir: &Path,
    image_id: &str,
    content_type: &str,
    data: &[u8],
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let extension = if content_type == MIME_JPEG { "jpg" } else { "png" };
    let path = output_dir.join(format!("{}.{}", image_id, extension));
    std::fs::write(&path, data)
        .with_context(|| format!("Failed to write artifact to {}", path.display()))?;
    Ok(path)
}
