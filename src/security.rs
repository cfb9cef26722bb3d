//! Request safety checks
//!
//! Keeps uploads bounded before multipart parsing starts and keeps static
//! file lookups inside the configured directory.

use std::path::{Component, Path, PathBuf};

/// Security validation error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// Request body larger than the upload limit allows
    PayloadTooLarge { size: usize, limit: usize },
    /// Path escapes the static directory (400)
    PathTraversal { path: String },
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::PayloadTooLarge { size, limit } => {
                write!(f, "Request payload size {} exceeds limit {}", size, limit)
            }
            SecurityError::PathTraversal { path } => {
                write!(f, "Path traversal attempt detected: {}", path)
            }
        }
    }
}

impl std::error::Error for SecurityError {}

/// Largest request body accepted for a given file-size limit.
///
/// Multipart framing and the text fields ride on top of the file itself.
pub fn body_limit(max_file_size: usize, overhead: usize) -> usize {
    max_file_size.saturating_add(overhead)
}

/// Validate request body size
///
/// Called with the declared Content-Length up front and again with the
/// running total while the body streams in.
pub fn validate_body_size(content_length: Option<usize>, limit: usize) -> Result<(), SecurityError> {
    if let Some(size) = content_length {
        if size > limit {
            return Err(SecurityError::PayloadTooLarge { size, limit });
        }
    }
    Ok(())
}

/// Check a request path for traversal attempts
///
/// The path is percent-decoded first, so `%2e%2e%2f` is caught the same way
/// as `../`. Null bytes are rejected too.
pub fn check_path_traversal(path: &str) -> Result<(), SecurityError> {
    let traversal = || SecurityError::PathTraversal {
        path: path.to_string(),
    };

    let decoded = urlencoding::decode(path).map_err(|_| traversal())?;

    if decoded.contains('\0') {
        return Err(traversal());
    }

    let has_parent = decoded
        .split(['/', '\\'])
        .any(|segment| segment == "..");
    if has_parent {
        return Err(traversal());
    }

    Ok(())
}

/// Map a URL path onto a file below `root`.
///
/// `/` and paths ending in `/` resolve to `index.html`. Only normal path
/// components survive, so the result never leaves `root`.
pub fn resolve_static_path(root: &Path, url_path: &str) -> Result<PathBuf, SecurityError> {
    check_path_traversal(url_path)?;

    let decoded = urlencoding::decode(url_path).map_err(|_| SecurityError::PathTraversal {
        path: url_path.to_string(),
    })?;

    let mut resolved = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => {
                return Err(SecurityError::PathTraversal {
                    path: url_path.to_string(),
                })
            }
        }
    }

    if decoded.is_empty() || decoded.ends_with('/') {
        resolved.push("index.html");
    }

    Ok(resolved)
}
