//! `POST /api/convert`
//!
//! Validation order: upload layer (extension, size, multipart shape), then
//! presence of the file, then the target format. Quality and max width
//! never fail a request. Codec work runs on the blocking pool.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use crate::config::ConverterConfig;
use crate::converter::{self, ConversionRequest, ConversionResult, ImageError};
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::upload::{classify_oversized, parse_upload, UploadError, UploadLimits, UploadedFile};

use super::endpoints::EndpointResponse;

/// Conversion endpoint state
#[derive(Clone)]
pub struct ConvertHandler {
    config: Arc<ConverterConfig>,
    metrics: Arc<Metrics>,
}

impl ConvertHandler {
    pub fn new(config: ConverterConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            config: Arc::new(config),
            metrics,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Handle one conversion request whose body has been read in full
    pub async fn handle(
        &self,
        request_id: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> EndpointResponse {
        match self.convert(request_id, content_type, body).await {
            Ok(result) => conversion_response(result),
            Err(err) => {
                self.record_failure(request_id, &err);
                EndpointResponse::error(&err)
            }
        }
    }

    /// Answer a body that went over the request size cap.
    ///
    /// `prefix` is the start of the body; a wrong extension in it is
    /// reported before the size.
    pub async fn reject_oversized(
        &self,
        request_id: &str,
        content_type: Option<&str>,
        prefix: Bytes,
    ) -> EndpointResponse {
        let err = AppError::from(classify_oversized(content_type, prefix, self.limits()).await);
        self.record_failure(request_id, &err);
        EndpointResponse::error(&err)
    }

    fn limits(&self) -> UploadLimits {
        UploadLimits {
            max_file_size: self.config.max_file_size,
        }
    }

    async fn convert(
        &self,
        request_id: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<ConversionResult, AppError> {
        let form = parse_upload(content_type, body, self.limits()).await?;

        let file = form.file.ok_or(UploadError::MissingFile)?;

        let request = ConversionRequest::from_fields(&form.fields, &self.config).map_err(|e| {
            UploadError::InvalidFormat {
                format: e.0,
            }
        })?;

        tracing::debug!(
            request_id = %request_id,
            file_name = %file.file_name,
            size = file.size(),
            format = %request.format,
            quality = request.quality,
            max_width = ?request.max_width,
            "Starting conversion"
        );

        let started = Instant::now();
        let result = run_conversion(file.clone(), request, self.config.icon_sizes.clone())
            .await
            .map_err(|err| {
                self.metrics.increment_conversion_failure(request.format.as_str());
                err
            })?;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.metrics.increment_conversion(request.format.as_str());
        self.metrics.record_conversion_duration(duration_ms);

        tracing::info!(
            request_id = %request_id,
            file_name = %file.file_name,
            format = %result.format,
            source_width = result.source_size.0,
            source_height = result.source_size.1,
            output_width = result.output_size.0,
            output_height = result.output_size.1,
            input_bytes = file.size(),
            output_bytes = result.data.len(),
            duration_ms = duration_ms,
            "Image converted"
        );

        Ok(result)
    }

    fn record_failure(&self, request_id: &str, err: &AppError) {
        match err {
            AppError::Upload(upload) => {
                self.metrics.increment_upload_rejection(upload.kind());
                if err.to_http_status() >= 500 {
                    tracing::error!(request_id = %request_id, error = %err, "Upload failed");
                } else {
                    tracing::info!(
                        request_id = %request_id,
                        reason = upload.kind(),
                        error = %err,
                        "Upload rejected"
                    );
                }
            }
            _ => tracing::error!(request_id = %request_id, error = %err, "Conversion failed"),
        }
    }
}

/// Run the codec pipeline on the blocking pool
async fn run_conversion(
    file: UploadedFile,
    request: ConversionRequest,
    icon_sizes: Vec<u32>,
) -> Result<ConversionResult, ImageError> {
    tokio::task::spawn_blocking(move || {
        converter::convert(&file.data, &file.file_name, &request, &icon_sizes)
    })
    .await
    .map_err(|e| ImageError::TaskFailed {
        message: e.to_string(),
    })?
}

fn conversion_response(result: ConversionResult) -> EndpointResponse {
    let disposition = content_disposition(&result.filename);
    EndpointResponse::binary(result.content_type, result.data)
        .with_header("Content-Disposition", disposition)
}

/// `attachment; filename="..."` for a download name.
///
/// Quotes, backslashes, control and non-ASCII characters are replaced in the
/// quoted form; names with non-ASCII characters also get an RFC 5987
/// `filename*` parameter carrying the exact UTF-8 name.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    if filename.is_ascii() {
        format!("attachment; filename=\"{}\"", ascii)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            urlencoding::encode(filename)
        )
    }
}
