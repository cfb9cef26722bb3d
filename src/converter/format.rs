//! Target formats and their HTTP metadata
//!
//! The form field `format` selects one of five targets. Each target knows
//! its MIME type, the extension used for the download name and, for PNG,
//! how the 1-100 quality scale maps onto a zlib compression level.

use std::fmt;
use std::str::FromStr;

/// Output container requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    WebP,
    Avif,
    Jpeg,
    Png,
    Ico,
}

/// Error returned when the `format` field names no supported target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown target format: {}", self.0)
    }
}

impl std::error::Error for UnknownFormat {}

impl TargetFormat {
    /// Every accepted target, in the order listed to users
    pub const ALL: [TargetFormat; 5] = [
        TargetFormat::WebP,
        TargetFormat::Avif,
        TargetFormat::Jpeg,
        TargetFormat::Png,
        TargetFormat::Ico,
    ];

    /// Name as sent in the form field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Ico => "ico",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Ico => "image/x-icon",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Ico => "ico",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = UnknownFormat;

    /// Case-insensitive. Only the five canonical names are accepted:
    /// `jpeg` is not an alias of `jpg` here, and surrounding whitespace is
    /// not stripped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webp" => Ok(TargetFormat::WebP),
            "avif" => Ok(TargetFormat::Avif),
            "jpg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            "ico" => Ok(TargetFormat::Ico),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// zlib-style compression level (0 = store, 9 = smallest output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PngCompressionLevel(u8);

impl PngCompressionLevel {
    pub const MAX: u8 = 9;

    /// Map quality onto a compression level.
    ///
    /// Decreasing and linear: quality 5 gives 9, quality 100 gives 0, and
    /// everything is clamped into 0..=9. Higher quality means less effort.
    pub fn from_quality(quality: u8) -> Self {
        let level = (9.0 - ((f64::from(quality) - 5.0) / 95.0) * 9.0).round();
        Self(level.clamp(0.0, f64::from(Self::MAX)) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}
