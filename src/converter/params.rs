//! Conversion parameter resolution
//!
//! Form values arrive as strings. `quality` and `maxWidth` never fail a
//! request: unusable quality values fall back to the configured default and
//! unusable widths are dropped. Only `format` is a hard error.

use std::path::Path;

use super::format::{TargetFormat, UnknownFormat};
use crate::config::ConverterConfig;

/// Raw form fields as received, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawConversionFields {
    pub format: Option<String>,
    pub quality: Option<String>,
    pub max_width: Option<String>,
}

/// Validated conversion parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRequest {
    pub format: TargetFormat,
    /// Always within 1..=100
    pub quality: u8,
    /// Bounding-box edge; `None` keeps the source size
    pub max_width: Option<u32>,
}

impl ConversionRequest {
    pub fn new(format: TargetFormat) -> Self {
        Self {
            format,
            quality: crate::constants::DEFAULT_QUALITY,
            max_width: None,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width.max(1));
        self
    }

    /// Validate raw fields.
    ///
    /// A missing or empty `format` selects WebP; anything else that is not a
    /// known target is rejected, whitespace-only values included.
    pub fn from_fields(
        fields: &RawConversionFields,
        config: &ConverterConfig,
    ) -> Result<Self, UnknownFormat> {
        let format = match fields.format.as_deref() {
            None | Some("") => TargetFormat::WebP,
            Some(name) => name.parse()?,
        };

        Ok(Self {
            format,
            quality: resolve_quality(fields.quality.as_deref(), config.default_quality),
            max_width: resolve_max_width(fields.max_width.as_deref(), config.max_width_limit),
        })
    }
}

/// Parse the leading integer of a string the way browsers' `parseInt` does:
/// optional whitespace, optional sign, then digits. Trailing garbage is
/// ignored (`"75abc"` is 75, `"2.9"` is 2). Values too large for `i64`
/// saturate, which keeps them out of every accepted range.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end]
        .bytes()
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });

    Some(if negative { -magnitude } else { magnitude })
}

/// Quality in 1..=100, or `default` when missing or unusable
pub fn resolve_quality(raw: Option<&str>, default: u8) -> u8 {
    raw.and_then(parse_leading_int)
        .filter(|q| (1..=100).contains(q))
        .map(|q| q as u8)
        .unwrap_or(default)
}

/// Max width in 1..=limit, or `None` when missing or unusable
pub fn resolve_max_width(raw: Option<&str>, limit: u32) -> Option<u32> {
    raw.and_then(parse_leading_int)
        .filter(|w| *w >= 1 && *w <= i64::from(limit))
        .map(|w| w as u32)
}

/// Download name: the upload's base name with the target's extension.
///
/// Only the last extension is replaced (`photo.final.png` becomes
/// `photo.final.webp`). Directory components sent by some clients are
/// dropped.
pub fn output_filename(original: &str, format: TargetFormat) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    format!("{}.{}", stem, format.extension())
}

/// Lowercase text after the last dot of an uploaded file name.
///
/// Unlike `Path::extension`, a leading-dot name such as `.webp` still
/// yields `webp`.
pub fn file_extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && !ext.contains(['/', '\\']))
        .map(|ext| ext.to_ascii_lowercase())
}
