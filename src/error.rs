// Error types module

use thiserror::Error;

use crate::converter::ImageError;
use crate::security::SecurityError;
use crate::upload::UploadError;

/// Everything a request handler can fail with
///
/// Every variant maps onto an HTTP status and a `{"error": "..."}` body.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected upload or form value (400, or 500 for I/O)
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Decode, resize or encode failure (500)
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Path traversal or oversized request (400)
    #[error("{}", security_message(.0))]
    Security(#[from] SecurityError),

    #[error("Ressource introuvable.")]
    NotFound,

    #[error("Méthode non autorisée.")]
    MethodNotAllowed,

    #[error("Erreur serveur: {0}")]
    Internal(String),
}

impl AppError {
    pub fn to_http_status(&self) -> u16 {
        match self {
            AppError::Upload(e) => e.to_http_status(),
            AppError::Image(e) => e.to_http_status(),
            AppError::Security(_) => 400,
            AppError::NotFound => 404,
            AppError::MethodNotAllowed => 405,
            AppError::Internal(_) => 500,
        }
    }

    /// JSON body sent to the client
    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.to_string() }).to_string()
    }
}

/// Client-facing text; the detailed `Display` of `SecurityError` stays in logs
fn security_message(err: &SecurityError) -> &'static str {
    match err {
        SecurityError::PayloadTooLarge { .. } => "Requête trop volumineuse.",
        SecurityError::PathTraversal { .. } => "Chemin invalide.",
    }
}
