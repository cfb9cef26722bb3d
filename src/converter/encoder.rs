//! Image encoder abstraction
//!
//! One encoder per target format behind a common trait, so the processor
//! only deals with RGBA buffers and never with codec specifics.

use std::io::Cursor;

use super::error::ImageError;
use super::format::{PngCompressionLevel, TargetFormat};
use super::icon::build_icon;
use crate::constants::{AVIF_SPEED, PNG_OXIPNG_THRESHOLD};

/// Quality settings for image encoding
#[derive(Debug, Clone, Copy)]
pub struct EncoderQuality {
    /// Quality value (1-100, where 100 is best quality)
    pub quality: u8,
}

impl Default for EncoderQuality {
    fn default() -> Self {
        Self { quality: 80 }
    }
}

impl EncoderQuality {
    /// Create quality settings with specified quality level
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Compression level used by the PNG encoder
    pub fn png_level(&self) -> PngCompressionLevel {
        PngCompressionLevel::from_quality(self.quality)
    }
}

/// Result of encoding an image
#[derive(Debug)]
pub struct EncodedImage {
    /// The encoded image data
    pub data: Vec<u8>,
    /// The output format
    pub format: TargetFormat,
    /// Content-Type header value
    pub content_type: &'static str,
}

impl EncodedImage {
    pub fn new(data: Vec<u8>, format: TargetFormat) -> Self {
        Self {
            data,
            format,
            content_type: format.content_type(),
        }
    }
}

/// Trait for image encoders
///
/// Implementations turn a raw RGBA buffer (4 bytes per pixel, row-major)
/// into a complete file in their format.
pub trait ImageEncoder: Send + Sync {
    /// The output format this encoder produces
    fn format(&self) -> TargetFormat;

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError>;
}

/// Lossy WebP through libwebp
pub struct WebPEncoder;

impl ImageEncoder for WebPEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::WebP
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        let encoder = webp::Encoder::from_rgba(data, width, height);
        let memory = encoder
            .encode_simple(false, f32::from(quality.quality))
            .map_err(|e| ImageError::encode_failed(TargetFormat::WebP, format!("{:?}", e)))?;

        Ok(EncodedImage::new(memory.to_vec(), TargetFormat::WebP))
    }
}

/// AVIF through ravif (rav1e)
pub struct AvifEncoder {
    /// Speed preset (1-10, where 1 is slowest/best compression)
    pub speed: u8,
}

impl Default for AvifEncoder {
    fn default() -> Self {
        Self { speed: AVIF_SPEED }
    }
}

impl ImageEncoder for AvifEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::Avif
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        let pixels: Vec<rgb::RGBA8> = data
            .chunks_exact(4)
            .map(|p| rgb::RGBA8::new(p[0], p[1], p[2], p[3]))
            .collect();
        let img = imgref::Img::new(pixels.as_slice(), width as usize, height as usize);

        let encoded = ravif::Encoder::new()
            .with_quality(f32::from(quality.quality))
            .with_alpha_quality(f32::from(quality.quality))
            .with_speed(self.speed)
            .encode_rgba(img)
            .map_err(|e| ImageError::encode_failed(TargetFormat::Avif, e.to_string()))?;

        Ok(EncodedImage::new(encoded.avif_file, TargetFormat::Avif))
    }
}

/// Baseline JPEG through the image crate
pub struct JpegEncoder;

impl ImageEncoder for JpegEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::Jpeg
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
        use image::ImageEncoder as _;

        // JPEG has no alpha channel
        let rgb_data = rgba_to_rgb(data);

        let mut output = Cursor::new(Vec::new());
        let encoder = ImageJpegEncoder::new_with_quality(&mut output, quality.quality);

        encoder
            .write_image(&rgb_data, width, height, image::ColorType::Rgb8)
            .map_err(|e| ImageError::encode_failed(TargetFormat::Jpeg, e.to_string()))?;

        Ok(EncodedImage::new(output.into_inner(), TargetFormat::Jpeg))
    }
}

/// Lossless PNG; quality only picks the compression effort
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::Png
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        use image::codecs::png::{CompressionType, FilterType, PngEncoder as ImagePngEncoder};
        use image::ImageEncoder as _;

        let level = quality.png_level().value();
        let (compression, filter) = match level {
            0 => (CompressionType::Fast, FilterType::NoFilter),
            1..=2 => (CompressionType::Fast, FilterType::Adaptive),
            3..=6 => (CompressionType::Default, FilterType::Adaptive),
            _ => (CompressionType::Best, FilterType::Adaptive),
        };

        let mut output = Cursor::new(Vec::new());
        let encoder = ImagePngEncoder::new_with_quality(&mut output, compression, filter);

        encoder
            .write_image(data, width, height, image::ColorType::Rgba8)
            .map_err(|e| ImageError::encode_failed(TargetFormat::Png, e.to_string()))?;

        let mut png = output.into_inner();

        if level >= PNG_OXIPNG_THRESHOLD {
            let options = oxipng::Options::from_preset(level - PNG_OXIPNG_THRESHOLD + 1);
            png = oxipng::optimize_from_memory(&png, &options)
                .map_err(|e| ImageError::encode_failed(TargetFormat::Png, e.to_string()))?;
        }

        Ok(EncodedImage::new(png, TargetFormat::Png))
    }
}

/// Multi-resolution ICO container
pub struct IcoEncoder {
    /// Square edge of every embedded image
    pub sizes: Vec<u32>,
}

impl ImageEncoder for IcoEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::Ico
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        _quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        let icon = build_icon(data, width, height, &self.sizes)?;
        Ok(EncodedImage::new(icon, TargetFormat::Ico))
    }
}

/// Factory for creating encoders based on output format
pub struct EncoderFactory;

impl EncoderFactory {
    pub fn create(format: TargetFormat, icon_sizes: &[u32]) -> Box<dyn ImageEncoder> {
        match format {
            TargetFormat::WebP => Box::new(WebPEncoder),
            TargetFormat::Avif => Box::new(AvifEncoder::default()),
            TargetFormat::Jpeg => Box::new(JpegEncoder),
            TargetFormat::Png => Box::new(PngEncoder),
            TargetFormat::Ico => Box::new(IcoEncoder {
                sizes: icon_sizes.to_vec(),
            }),
        }
    }
}

/// Convert RGBA to RGB by discarding alpha channel
fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for chunk in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }
    rgb
}
