//! Conversion error types
//!
//! Everything that goes wrong once a request has passed validation is a
//! codec or processing failure, reported to the caller as a 500 with the
//! underlying message.

use std::fmt;

use super::format::TargetFormat;

/// Errors raised while decoding, resizing or encoding an image
#[derive(Debug, Clone)]
pub enum ImageError {
    /// Source bytes could not be decoded
    DecodeFailed { message: String },
    /// Resize operation failed
    ResizeFailed { message: String },
    /// Encoding to the target format failed
    EncodeFailed {
        format: TargetFormat,
        message: String,
    },
    /// Building the multi-size icon failed
    IconFailed { message: String },
    /// The blocking conversion task panicked or was cancelled
    TaskFailed { message: String },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            ImageError::IconFailed { message } => {
                write!(f, "Failed to build icon: {}", message)
            }
            ImageError::TaskFailed { message } => {
                write!(f, "Conversion task failed: {}", message)
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    /// Every processing failure is a server-side error
    pub fn to_http_status(&self) -> u16 {
        500
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: TargetFormat, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format,
            message: message.into(),
        }
    }

    pub fn icon_failed(message: impl Into<String>) -> Self {
        ImageError::IconFailed {
            message: message.into(),
        }
    }
}
