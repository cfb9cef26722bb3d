//! Multipart upload parsing
//!
//! Extracts the single `image` file part and the conversion text fields
//! from a `multipart/form-data` body. The file's extension is checked as
//! soon as its part header is seen and its size is checked while the part
//! streams in, so neither a wrong file type nor an oversized file ever
//! reaches the codecs.

use bytes::{Bytes, BytesMut};
use multer::Multipart;
use thiserror::Error;

use crate::constants::{ACCEPTED_EXTENSIONS, IMAGE_FIELD};
use crate::converter::params::file_extension;
use crate::converter::RawConversionFields;

/// Text fields are tiny; anything past this is not a form value
const MAX_TEXT_FIELD_SIZE: usize = 1024;

/// Errors raised while accepting an upload.
///
/// Messages are user-facing and shown verbatim by the client page.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Aucune image fournie.")]
    MissingFile,

    #[error("Format non supporté. Utilisez JPG, PNG, WebP ou AVIF.")]
    UnsupportedExtension { file_name: String },

    #[error("Fichier trop volumineux (max {max_mb} Mo).")]
    FileTooLarge { max_mb: usize },

    #[error("Format invalide. Choisissez webp, avif, jpg, png ou ico.")]
    InvalidFormat { format: String },

    #[error("Champ inattendu: {name}")]
    UnexpectedField { name: String },

    #[error("Requête multipart invalide: {0}")]
    Malformed(String),

    #[error("Erreur serveur: {0}")]
    Io(String),
}

impl UploadError {
    pub fn to_http_status(&self) -> u16 {
        match self {
            UploadError::Io(_) => 500,
            _ => 400,
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::MissingFile => "missing_file",
            UploadError::UnsupportedExtension { .. } => "unsupported_extension",
            UploadError::FileTooLarge { .. } => "file_too_large",
            UploadError::InvalidFormat { .. } => "invalid_format",
            UploadError::UnexpectedField { .. } => "unexpected_field",
            UploadError::Malformed(_) => "malformed",
            UploadError::Io(_) => "io",
        }
    }
}

impl From<multer::Error> for UploadError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::StreamReadFailed(e) => UploadError::Io(e.to_string()),
            other => UploadError::Malformed(other.to_string()),
        }
    }
}

/// The uploaded image, held in memory for the duration of one request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name as sent by the client
    pub file_name: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Lowercase extension of the client's file name
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.file_name)
    }
}

/// Everything a conversion request carries
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: RawConversionFields,
}

/// Upload acceptance limits
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Maximum file size in bytes
    pub max_file_size: usize,
}

impl UploadLimits {
    fn too_large(&self) -> UploadError {
        UploadError::FileTooLarge {
            max_mb: self.max_file_size / (1024 * 1024),
        }
    }
}

/// Whether a file name carries one of the accepted source extensions
pub fn is_accepted_extension(file_name: &str) -> bool {
    file_extension(file_name)
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Whether a Content-Type header announces a multipart form
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
}

/// Parse a complete multipart body.
///
/// Bodies that are not multipart at all carry no file and yield an empty
/// form; the caller reports the missing image.
pub async fn parse_upload(
    content_type: Option<&str>,
    body: Bytes,
    limits: UploadLimits,
) -> Result<UploadForm, UploadError> {
    let content_type = match content_type {
        Some(ct) if is_multipart(ct) => ct,
        _ => return Ok(UploadForm::default()),
    };

    let boundary =
        multer::parse_boundary(content_type).map_err(|e| UploadError::Malformed(e.to_string()))?;
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = Multipart::new(stream, boundary);

    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        // A part without a file name is a plain text value
        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = read_text_field(&mut field).await?;
            match name.as_str() {
                "format" => form.fields.format = Some(value),
                "quality" => form.fields.quality = Some(value),
                "maxWidth" => form.fields.max_width = Some(value),
                _ => tracing::debug!(field = %name, "Ignoring unknown form field"),
            }
            continue;
        };

        if name != IMAGE_FIELD || form.file.is_some() {
            return Err(UploadError::UnexpectedField { name });
        }

        if !is_accepted_extension(&file_name) {
            tracing::debug!(file_name = %file_name, "Rejected upload extension");
            return Err(UploadError::UnsupportedExtension { file_name });
        }

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            // Check size limit incrementally to fail fast
            if data.len() + chunk.len() > limits.max_file_size {
                tracing::warn!(
                    file_name = %file_name,
                    max_file_size = limits.max_file_size,
                    "File size limit exceeded, aborting upload"
                );
                return Err(limits.too_large());
            }
            data.extend_from_slice(&chunk);
        }

        form.file = Some(UploadedFile {
            file_name,
            data: data.freeze(),
        });
    }

    Ok(form)
}

/// Reason given for a body that went over the request size cap.
///
/// `prefix` is what was read before stopping. The first file part's header
/// normally sits in it, so the checks that come before the size check in
/// `parse_upload` (field name, then extension) still win here. Anything
/// that cannot be decided from the prefix is reported as too large.
pub async fn classify_oversized(
    content_type: Option<&str>,
    prefix: Bytes,
    limits: UploadLimits,
) -> UploadError {
    let boundary = match content_type {
        Some(ct) if is_multipart(ct) => match multer::parse_boundary(ct) {
            Ok(boundary) => boundary,
            Err(_) => return limits.too_large(),
        },
        _ => return limits.too_large(),
    };
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(prefix) });
    let mut multipart = Multipart::new(stream, boundary);

    // Unread parts are skipped by next_field; a truncated prefix ends the loop
    while let Ok(Some(field)) = multipart.next_field().await {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let name = field.name().unwrap_or("").to_string();

        if name != IMAGE_FIELD {
            return UploadError::UnexpectedField { name };
        }
        if !is_accepted_extension(&file_name) {
            return UploadError::UnsupportedExtension { file_name };
        }
        break;
    }

    limits.too_large()
}

async fn read_text_field(field: &mut multer::Field<'_>) -> Result<String, UploadError> {
    let mut value = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if value.len() + chunk.len() > MAX_TEXT_FIELD_SIZE {
            let name = field.name().unwrap_or("").to_string();
            return Err(UploadError::Malformed(format!("champ {} trop long", name)));
        }
        value.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&value).into_owned())
}
