//! Image pipeline.
//!
//! Copies everything under `src/img/` into `assets/img/`, keeping
//! subdirectories. Files whose destination already exists are skipped in
//! both modes; `clean` is what invalidates stale copies.
//!
//! In production, JPEG and PNG files are re-encoded through an
//! [`ImageCodec`] before writing: JPEGs at the configured quality, PNGs
//! at maximum compression. Anything the codec cannot handle (unknown
//! format, corrupt file, result bigger than the input) is copied
//! unchanged with a log line; a bad image never fails the build branch.
//!
//! The codec sits behind a trait so tests can observe exactly which files
//! were re-encoded, and with what quality, without doing pixel work.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use crate::config::{Config, Mode};
use crate::fileset::FileSet;
use crate::notifier::Notifier;
use crate::pipeline::{Pipeline, PipelineError, PipelineReport};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Re-encoding seam for the production optimize step.
pub trait ImageCodec: Send + Sync {
    /// Re-encode `contents` at `quality`. The relative path decides the
    /// target format; formats the codec does not optimize are returned
    /// unchanged.
    fn optimize(&self, rel: &str, contents: &[u8], quality: u8) -> Result<Vec<u8>, CodecError>;
}

/// Codec backed by the `image` crate.
pub struct RustCodec;

impl ImageCodec for RustCodec {
    fn optimize(&self, rel: &str, contents: &[u8], quality: u8) -> Result<Vec<u8>, CodecError> {
        match target_format(rel) {
            Some(ImageFormat::Jpeg) => encode_jpeg(contents, quality),
            Some(ImageFormat::Png) => encode_png(contents),
            _ => Ok(contents.to_vec()),
        }
    }
}

fn target_format(rel: &str) -> Option<ImageFormat> {
    ImageFormat::from_extension(Path::new(rel).extension()?)
}

fn decode(contents: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(contents).map_err(|e| CodecError::Decode(e.to_string()))
}

fn encode_jpeg(contents: &[u8], quality: u8) -> Result<Vec<u8>, CodecError> {
    let img = decode(contents)?;
    // JPEG has no alpha; flatten before encoding
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(out)
}

fn encode_png(contents: &[u8]) -> Result<Vec<u8>, CodecError> {
    let img = decode(contents)?;
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        Cursor::new(&mut out),
        CompressionType::Best,
        FilterType::Adaptive,
    );
    img.write_with_encoder(encoder)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(out)
}

/// Copy (and in production, optimize) all images for `mode`.
pub fn run(
    config: &Config,
    mode: Mode,
    notifier: &Notifier,
) -> Result<PipelineReport, PipelineError> {
    run_with_codec(config, mode, notifier, Arc::new(RustCodec))
}

pub fn run_with_codec(
    config: &Config,
    mode: Mode,
    notifier: &Notifier,
    codec: Arc<dyn ImageCodec>,
) -> Result<PipelineReport, PipelineError> {
    let files = FileSet::new(config.images_dir(), &config.images.sources, &[])?;
    let quality = config.images.quality;

    let pipeline = Pipeline::new("images").skip_existing().step_if(
        mode.is_production(),
        "optimize",
        move |mut asset| {
            let rel = asset.rel_display();
            match codec.optimize(&rel, &asset.contents, quality) {
                Ok(optimized) if optimized.len() < asset.contents.len() => {
                    tracing::debug!(
                        file = %rel,
                        before = asset.contents.len(),
                        after = optimized.len(),
                        "image optimized"
                    );
                    asset.contents = optimized;
                }
                Ok(_) => {
                    tracing::debug!(file = %rel, "optimized result not smaller, keeping original");
                }
                Err(err) => {
                    tracing::warn!(file = %rel, %err, "image optimization failed, copying as-is");
                }
            }
            Ok(asset)
        },
    );
    pipeline.run(&files, &config.images_dest(), notifier)
}
