//! Static file serving for the client page

use std::io::ErrorKind;
use std::path::Path;

use crate::error::AppError;
use crate::security::resolve_static_path;

use super::endpoints::EndpointResponse;

/// Serve `url_path` from `root`.
///
/// `/` maps to `index.html`. Directories and missing files are 404s.
pub async fn serve_static(root: &Path, url_path: &str) -> Result<EndpointResponse, AppError> {
    let path = resolve_static_path(root, url_path)?;

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
            return Err(AppError::NotFound)
        }
        Err(e) => {
            // Reading a directory fails with an OS-specific kind
            if tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false)
            {
                return Err(AppError::NotFound);
            }
            return Err(AppError::Internal(e.to_string()));
        }
    };

    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    tracing::debug!(path = %path.display(), size = data.len(), "Serving static file");

    Ok(EndpointResponse::binary(content_type, data).with_header("Cache-Control", "no-cache"))
}
