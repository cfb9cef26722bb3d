//! Image conversion
//!
//! Decodes JPEG, PNG, WebP and AVIF uploads, optionally scales them into a
//! square bounding box and re-encodes them as WebP, AVIF, JPEG, PNG or a
//! multi-size ICO.

mod avif;
pub mod encoder;
pub mod error;
pub mod format;
pub mod icon;
pub mod params;
pub mod processor;
pub mod resize;

pub use encoder::{EncodedImage, EncoderFactory, EncoderQuality, ImageEncoder};
pub use error::ImageError;
pub use format::{PngCompressionLevel, TargetFormat, UnknownFormat};
pub use params::{ConversionRequest, RawConversionFields};
pub use processor::{convert, decode, ConversionResult};
pub use resize::fit_within;
