//! Image normalization: validate, downsize, re-encode and base64 a photo.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use std::io::Cursor;
use tracing::debug;

use crate::config::ImageLimits;
use crate::error::{AnalysisError, Result};
use crate::types::{NormalizedImage, SourceImage};

/// Normalize a source image for embedding in a provider request.
///
/// The image is always re-encoded in its declared media type, even when it
/// already fits within `limits.max_dimension`.
///
/// # Errors
///
/// - `UnsupportedMediaType` if the declared type is not accepted
/// - `FileTooLarge` if the input exceeds `limits.max_file_bytes`
/// - `Decode` if the bytes are not a decodable image
/// - `Encode` if re-encoding fails or produces no bytes
pub fn normalize(source: &SourceImage, limits: &ImageLimits) -> Result<NormalizedImage> {
    limits.validate()?;
    validate_upload(source, limits)?;

    let img = decode_upright(&source.bytes)?;

    let (orig_width, orig_height) = img.dimensions();
    let resized = fit_within(img, limits.max_dimension);
    let (width, height) = resized.dimensions();

    let encoded = encode(&resized, &source.media_type, limits.quality)?;
    if encoded.is_empty() {
        return Err(AnalysisError::Encode(format!(
            "{} encoder produced no output",
            source.media_type
        )));
    }

    debug!(
        media_type = %source.media_type,
        orig_width,
        orig_height,
        width,
        height,
        bytes = encoded.len(),
        "Normalized image"
    );

    Ok(NormalizedImage {
        base64: STANDARD.encode(&encoded),
        media_type: source.media_type.clone(),
        label: source.label.clone(),
        width,
        height,
    })
}

/// Check the declared format and file size before decoding.
pub fn validate_upload(source: &SourceImage, limits: &ImageLimits) -> Result<()> {
    if source.media_type.is_empty() || !limits.accepts(&source.media_type) {
        return Err(AnalysisError::UnsupportedMediaType(source.media_type.clone()));
    }
    if source.bytes.len() > limits.max_file_bytes {
        return Err(AnalysisError::FileTooLarge {
            size: source.bytes.len(),
            max: limits.max_file_bytes,
        });
    }
    Ok(())
}

/// Decode and apply the EXIF orientation, which re-encoding would drop.
fn decode_upright(bytes: &[u8]) -> Result<DynamicImage> {
    let decode_err = |e: image::ImageError| AnalysisError::Decode(e.to_string());

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AnalysisError::Decode(e.to_string()))?
        .into_decoder()
        .map_err(decode_err)?;
    let orientation = decoder.orientation().map_err(decode_err)?;

    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Target dimensions so the larger side equals `max_dimension`.
///
/// Returns the input unchanged when both sides already fit.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale = max_dimension as f64 / width.max(height) as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);
    (scaled(width), scaled(height))
}

fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = scaled_dimensions(width, height, max_dimension);
    if (new_width, new_height) == (width, height) {
        return img;
    }
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

fn encode(img: &DynamicImage, media_type: &str, quality: f32) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());

    let written = match media_type {
        "image/jpeg" => {
            let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            let encoder = JpegEncoder::new_with_quality(&mut output, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        "image/png" => img.write_with_encoder(PngEncoder::new(&mut output)),
        // The WebP encoder is lossless only; quality does not apply.
        "image/webp" => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut output)),
        other => return Err(AnalysisError::UnsupportedMediaType(other.to_string())),
    };

    written.map_err(|e| AnalysisError::Encode(e.to_string()))?;
    Ok(output.into_inner())
}
