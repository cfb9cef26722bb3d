//! Bounding-box geometry and Lanczos resampling

use std::num::NonZeroU32;

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};

use super::error::ImageError;

/// Scale `(width, height)` down so that neither edge exceeds `max_edge`.
///
/// Aspect ratio is kept, images are never enlarged and no edge drops below
/// one pixel.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let max_edge = max_edge.max(1);
    if width <= max_edge && height <= max_edge {
        return (width, height);
    }

    let scale = f64::from(max_edge) / f64::from(width.max(height));
    let scaled = |edge: u32| ((f64::from(edge) * scale).round() as u32).clamp(1, max_edge);
    (scaled(width), scaled(height))
}

/// Scale `(width, height)` so the longer edge is exactly `edge`.
///
/// Used for icon frames, which may be larger than the source.
pub fn fit_to(width: u32, height: u32, edge: u32) -> (u32, u32) {
    let scale = f64::from(edge) / f64::from(width.max(height).max(1));
    let scaled = |e: u32| ((f64::from(e) * scale).round() as u32).clamp(1, edge.max(1));
    (scaled(width), scaled(height))
}

/// Resample an RGBA8 buffer to `target_w` x `target_h`
pub fn resize_rgba(
    data: Vec<u8>,
    src_w: u32,
    src_h: u32,
    target_w: u32,
    target_h: u32,
) -> Result<Vec<u8>, ImageError> {
    if (src_w, src_h) == (target_w, target_h) {
        return Ok(data);
    }

    let src_width =
        NonZeroU32::new(src_w).ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height =
        NonZeroU32::new(src_h).ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(src_width, src_height, data, PixelType::U8x4)
        .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    Ok(dst_image.into_vec())
}
