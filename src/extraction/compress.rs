//! Per-image JPEG compression
//!
//! Lowers JPEG quality step by step, then shrinks the image, until the encoded
//! size fits the target. Never fails: on any decode or encode error the source
//! image is returned untouched.

use super::SourceImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::borrow::Cow;

const EPSILON: f32 = 1e-4;

/// Tuning of the compression loop
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOptions {
    pub target_bytes: usize,
    pub start_quality: f32,
    pub min_quality: f32,
    pub quality_step: f32,
    pub scale_step: f32,
    pub min_scale: f32,
    pub max_iterations: usize,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            target_bytes: 100 * 1024,
            start_quality: 0.9,
            min_quality: 0.25,
            quality_step: 0.1,
            scale_step: 0.85,
            min_scale: 0.4,
            max_iterations: 15,
        }
    }
}

impl CompressionOptions {
    pub fn with_target_kb(mut self, kb: usize) -> Self {
        self.target_bytes = kb * 1024;
        self
    }
}

fn encode_jpeg(image: &DynamicImage, quality: f32) -> image::ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
    Ok(buffer)
}

/// Compress an image towards `options.target_bytes`
///
/// Returns the smallest encoding observed, or the source itself when it is
/// already within target, cannot be decoded, or no encoding beats it.
pub fn compress_image(source: &SourceImage, options: &CompressionOptions) -> SourceImage {
    if source.len() <= options.target_bytes {
        log::debug!("{} already within target, sending as is", source);
        return source.clone();
    }

    let decoded = match image::load_from_memory(&source.bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            log::warn!("Could not decode {}: {}, sending original", source.name, e);
            return source.clone();
        }
    };
    let (width, height) = decoded.dimensions();

    let mut quality = options.start_quality;
    let mut scale = 1.0_f32;
    let mut best: Option<Vec<u8>> = None;

    for iteration in 1..=options.max_iterations {
        let frame = if scale < 1.0 {
            let w = ((width as f32 * scale).round() as u32).max(1);
            let h = ((height as f32 * scale).round() as u32).max(1);
            Cow::Owned(decoded.resize_exact(w, h, FilterType::Triangle))
        } else {
            Cow::Borrowed(&decoded)
        };

        let encoded = match encode_jpeg(&frame, quality) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::warn!("Could not encode {}: {}, sending original", source.name, e);
                return source.clone();
            }
        };
        let size = encoded.len();
        log::trace!(
            "{}: iteration {} quality {:.2} scale {:.2} -> {} bytes",
            source.name,
            iteration,
            quality,
            scale,
            size
        );

        if best.as_ref().is_none_or(|b| size < b.len()) {
            best = Some(encoded);
        }
        if size <= options.target_bytes {
            break;
        }

        if quality > options.min_quality + EPSILON {
            quality = (quality - options.quality_step).max(options.min_quality);
        } else if scale > options.min_scale + EPSILON {
            scale = (scale * options.scale_step).max(options.min_scale);
        } else {
            break;
        }
    }

    match best {
        Some(bytes) if bytes.len() < source.len() => {
            log::debug!(
                "Compressed {} from {} to {} bytes",
                source.name,
                source.len(),
                bytes.len()
            );
            SourceImage::new(source.name.clone(), "image/jpeg", bytes)
        }
        _ => source.clone(),
    }
}
