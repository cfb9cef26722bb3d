//! Multi-resolution ICO generation
//!
//! Each requested size becomes one PNG-compressed entry. Non-square sources
//! are scaled so their longer edge fills the square and are centred on a
//! transparent canvas.

use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::{ColorType, RgbaImage};

use super::error::ImageError;
use super::resize::{fit_to, resize_rgba};
use crate::constants::MAX_ICON_SIZE;

/// Render one square icon frame of `size` pixels
pub fn render_frame(data: &[u8], width: u32, height: u32, size: u32) -> Result<RgbaImage, ImageError> {
    let (frame_w, frame_h) = fit_to(width, height, size);
    let scaled = resize_rgba(data.to_vec(), width, height, frame_w, frame_h)?;
    let scaled = RgbaImage::from_raw(frame_w, frame_h, scaled)
        .ok_or_else(|| ImageError::icon_failed("scaled frame has the wrong size"))?;

    let mut canvas = RgbaImage::new(size, size);
    let x = i64::from((size - frame_w) / 2);
    let y = i64::from((size - frame_h) / 2);
    image::imageops::overlay(&mut canvas, &scaled, x, y);

    Ok(canvas)
}

/// Build a complete `.ico` file holding one entry per size, in the given order
pub fn build_icon(data: &[u8], width: u32, height: u32, sizes: &[u32]) -> Result<Vec<u8>, ImageError> {
    if sizes.is_empty() {
        return Err(ImageError::icon_failed("no icon sizes configured"));
    }

    let canvases = sizes
        .iter()
        .map(|&size| {
            if size == 0 || size > MAX_ICON_SIZE {
                return Err(ImageError::icon_failed(format!(
                    "icon size {} outside 1-{}",
                    size, MAX_ICON_SIZE
                )));
            }
            render_frame(data, width, height, size)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let frames = canvases
        .iter()
        .map(|canvas| {
            IcoFrame::as_png(canvas.as_raw(), canvas.width(), canvas.height(), ColorType::Rgba8)
                .map_err(|e| ImageError::icon_failed(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut output = Vec::new();
    IcoEncoder::new(&mut output)
        .encode_images(&frames)
        .map_err(|e| ImageError::icon_failed(e.to_string()))?;

    Ok(output)
}
