//! Image processing implementation
//!
//! Handles the actual conversion: decode → fit into maxWidth box → encode

use image::io::Reader as ImageReader;
use image::DynamicImage;
use std::io::Cursor;

use super::avif::{decode_avif, is_avif};
use super::encoder::{EncoderFactory, EncoderQuality};
use super::error::ImageError;
use super::format::TargetFormat;
use super::params::{output_filename, ConversionRequest};
use super::resize::{fit_within, resize_rgba};

/// Result of a successful conversion
#[derive(Debug)]
pub struct ConversionResult {
    /// Encoded output file
    pub data: Vec<u8>,
    pub format: TargetFormat,
    /// Content-Type header value
    pub content_type: &'static str,
    /// Suggested download name
    pub filename: String,
    /// Source dimensions (width, height)
    pub source_size: (u32, u32),
    /// Dimensions before container packing; for icons, the resized source
    pub output_size: (u32, u32),
}

/// Decode any accepted upload into pixels
pub fn decode(data: &[u8]) -> Result<DynamicImage, ImageError> {
    if is_avif(data) {
        return decode_avif(data);
    }

    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(format!("Failed to read image: {}", e)))?;

    if reader.format().is_none() {
        return Err(ImageError::decode_failed("unrecognised image data"));
    }

    reader
        .decode()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

/// Convert an uploaded image according to `request`.
///
/// `source_name` is the client's file name and only feeds the download
/// name. `icon_sizes` is consulted for ICO output.
pub fn convert(
    data: &[u8],
    source_name: &str,
    request: &ConversionRequest,
    icon_sizes: &[u32],
) -> Result<ConversionResult, ImageError> {
    let img = decode(data)?;
    let source_size = (img.width(), img.height());

    let (target_w, target_h) = match request.max_width {
        Some(max_edge) => fit_within(source_size.0, source_size.1, max_edge),
        None => source_size,
    };

    let pixels = resize_rgba(
        img.into_rgba8().into_raw(),
        source_size.0,
        source_size.1,
        target_w,
        target_h,
    )?;

    let encoder = EncoderFactory::create(request.format, icon_sizes);
    let encoded = encoder.encode(
        &pixels,
        target_w,
        target_h,
        EncoderQuality::with_quality(request.quality),
    )?;

    Ok(ConversionResult {
        data: encoded.data,
        format: encoded.format,
        content_type: encoded.content_type,
        filename: output_filename(source_name, request.format),
        source_size,
        output_size: (target_w, target_h),
    })
}
