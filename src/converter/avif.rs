//! AVIF decoding
//!
//! The `image` crate only ships an AVIF encoder, so uploaded AVIF files are
//! unpacked with `avif-parse` and their AV1 payloads decoded with `rav1d`.
//! The colour item becomes RGB (BT.601); an optional alpha item is decoded
//! the same way and its luma plane used as the alpha channel.
//!
//! Frames larger than `MAX_DECODE_PIXELS` are refused from the sequence
//! header, before any pixel buffer is allocated.

use std::ptr::NonNull;

use image::{DynamicImage, RgbaImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib as dav1d;

use super::error::ImageError;
use crate::constants::MAX_DECODE_PIXELS;

/// Whether `data` starts with an ISO-BMFF `ftyp` box carrying an AVIF brand
pub fn is_avif(data: &[u8]) -> bool {
    data.len() >= 12 && &data[4..8] == b"ftyp" && matches!(&data[8..12], b"avif" | b"avis")
}

/// Decode a still AVIF image to RGBA8
pub fn decode_avif(data: &[u8]) -> Result<DynamicImage, ImageError> {
    let avif = avif_parse::read_avif(&mut std::io::Cursor::new(data))
        .map_err(|e| ImageError::decode_failed(format!("invalid AVIF container: {:?}", e)))?;

    let meta = avif
        .primary_item_metadata()
        .map_err(|e| ImageError::decode_failed(format!("invalid AV1 sequence header: {:?}", e)))?;
    check_frame_size(meta.max_frame_width.get(), meta.max_frame_height.get())?;

    let color = decode_av1(&avif.primary_item)?;
    let alpha = match avif.alpha_item.as_deref() {
        Some(item) => Some(decode_av1(item)?),
        None => None,
    };

    let (width, height) = (color.width, color.height);
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for (i, px) in color.rgb.chunks_exact(3).enumerate() {
        let a = match &alpha {
            Some(plane) if plane.width == width && plane.height == height => plane.luma[i],
            _ => 255,
        };
        rgba.extend_from_slice(&[px[0], px[1], px[2], a]);
    }

    RgbaImage::from_raw(width, height, rgba)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| ImageError::decode_failed("decoded AVIF buffer has the wrong size"))
}

/// Refuse frames whose pixel count exceeds `MAX_DECODE_PIXELS`
pub fn check_frame_size(width: u32, height: u32) -> Result<(), ImageError> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_DECODE_PIXELS {
        return Err(ImageError::decode_failed(format!(
            "AVIF frame {}x{} exceeds the {} pixel limit",
            width, height, MAX_DECODE_PIXELS
        )));
    }
    Ok(())
}

/// One decoded AV1 frame, scaled to 8 bits per channel
struct DecodedFrame {
    width: u32,
    height: u32,
    /// Interleaved RGB
    rgb: Vec<u8>,
    /// Y plane only, one byte per pixel
    luma: Vec<u8>,
}

fn decode_av1(av1: &[u8]) -> Result<DecodedFrame, ImageError> {
    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr())
        .ok_or_else(|| ImageError::decode_failed("rav1d settings allocation failed"))?;
    unsafe { dav1d::dav1d_default_settings(settings_ptr) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;
    settings.frame_size_limit = MAX_DECODE_PIXELS as u32;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(ImageError::decode_failed(format!("rav1d open failed ({})", rc.0)));
    }

    let result = (|| {
        let mut data = Dav1dData::default();
        let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1.len()) };
        if buf.is_null() {
            return Err(ImageError::decode_failed("rav1d data_create failed"));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

        let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(ImageError::decode_failed(format!(
                "rav1d send_data failed ({})",
                rc.0
            )));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            // Releases whatever send_data left unconsumed
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(ImageError::decode_failed(format!(
                "rav1d get_picture failed ({})",
                rc.0
            )));
        }

        let frame = picture_to_frame(&pic);
        unsafe { dav1d::dav1d_picture_unref(NonNull::new(&mut pic)) };
        frame
    })();

    unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
    result
}

fn picture_to_frame(pic: &Dav1dPicture) -> Result<DecodedFrame, ImageError> {
    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    check_frame_size(width, height)?;
    let layout = pic.p.layout;

    let y_ptr = pic.data[0]
        .ok_or_else(|| ImageError::decode_failed("AV1 frame has no luma plane"))?
        .as_ptr() as *const u8;

    let (u_ptr, v_ptr, ss_x, ss_y, monochrome) = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        (y_ptr, y_ptr, false, false, true)
    } else {
        let (ss_x, ss_y) = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            _ => {
                return Err(ImageError::decode_failed(format!(
                    "unsupported AVIF pixel layout: {}",
                    layout
                )))
            }
        };
        let u_ptr = pic.data[1]
            .ok_or_else(|| ImageError::decode_failed("AV1 frame has no U plane"))?
            .as_ptr() as *const u8;
        let v_ptr = pic.data[2]
            .ok_or_else(|| ImageError::decode_failed("AV1 frame has no V plane"))?
            .as_ptr() as *const u8;
        (u_ptr, v_ptr, ss_x, ss_y, false)
    };

    let planes = YuvPlanes {
        y_ptr,
        u_ptr,
        v_ptr,
        y_stride: pic.stride[0],
        uv_stride: if monochrome { 0 } else { pic.stride[1] },
        width,
        height,
        bpc: pic.p.bpc as u32,
        ss_x,
        ss_y,
        monochrome,
    };

    let (rgb, luma) = planes.convert();
    Ok(DecodedFrame {
        width,
        height,
        rgb,
        luma,
    })
}

/// Borrowed YUV planes of a decoded picture
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// BT.601 YCbCr to interleaved RGB8, plus the Y plane scaled to 8 bits
    fn convert(&self) -> (Vec<u8>, Vec<u8>) {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let pixels = self.width as usize * self.height as usize;
        let mut rgb = vec![0u8; pixels * 3];
        let mut luma = vec![0u8; pixels];

        for row in 0..self.height {
            for col in 0..self.width {
                let y_val = read_sample(self.y_ptr, self.y_stride, col, row, self.bpc);
                let grey = (y_val * scale).clamp(0.0, 255.0);

                let (r, g, b) = if self.monochrome {
                    (grey, grey, grey)
                } else {
                    let c_col = if self.ss_x { col / 2 } else { col };
                    let c_row = if self.ss_y { row / 2 } else { row };
                    let cb = read_sample(self.u_ptr, self.uv_stride, c_col, c_row, self.bpc) - center;
                    let cr = read_sample(self.v_ptr, self.uv_stride, c_col, c_row, self.bpc) - center;

                    (
                        ((y_val + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                };

                let idx = row as usize * self.width as usize + col as usize;
                rgb[idx * 3] = r as u8;
                rgb[idx * 3 + 1] = g as u8;
                rgb[idx * 3 + 2] = b as u8;
                luma[idx] = grey as u8;
            }
        }

        (rgb, luma)
    }
}

/// 8-bit samples are bytes; 10 and 12-bit samples are stored as u16
#[inline]
fn read_sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let offset = y as isize * stride + x as isize * 2;
        (unsafe { std::ptr::read_unaligned(ptr.offset(offset) as *const u16) }) as f32
    }
}
