//! Raster decode / resize / encode
//!
//! Pure byte-to-byte operations on top of the `image` crate. Everything here
//! is CPU-bound; async callers must run it on the blocking pool.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat};

use super::OutputFormat;
use crate::error::TransformError;

/// JPEG encoder quality (0-100)
const JPEG_QUALITY: u8 = 90;

/// Scale an image to exactly `width`×`height` and encode it as `format`
///
/// Aspect ratio is not preserved.
pub fn resize(
    data: &[u8],
    format: OutputFormat,
    width: u32,
    height: u32,
) -> Result<Bytes, TransformError> {
    let img = decode(data)?;
    let resized = img.resize_exact(width, height, FilterType::Triangle);

    tracing::debug!(
        from_width = img.width(),
        from_height = img.height(),
        width,
        height,
        "Resized image"
    );

    encode(&resized, format)
}

/// Re-encode an image as `format` without changing its dimensions
pub fn reformat(data: &[u8], format: OutputFormat) -> Result<Bytes, TransformError> {
    let img = decode(data)?;
    encode(&img, format)
}

fn decode(data: &[u8]) -> Result<DynamicImage, TransformError> {
    image::load_from_memory(data).map_err(|e| TransformError::Decode(e.to_string()))
}

fn encode(img: &DynamicImage, format: OutputFormat) -> Result<Bytes, TransformError> {
    let mut buf = Cursor::new(Vec::new());

    match format {
        OutputFormat::Png => img.write_to(&mut buf, ImageOutputFormat::Png),
        // JPEG has no alpha channel
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut buf, ImageOutputFormat::Jpeg(JPEG_QUALITY)),
    }
    .map_err(|e| TransformError::Encode(e.to_string()))?;

    Ok(Bytes::from(buf.into_inner()))
}
