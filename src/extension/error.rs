//! Extension subsystem error types.

use thiserror::Error;

/// Result type for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Errors that can occur while installing, discovering, or removing
/// extension packages.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// Extension or path not found.
    #[error("Extension not found: {0}")]
    NotFound(String),

    /// Invalid extension manifest.
    #[error("Invalid extension manifest: {0}")]
    InvalidManifest(String),

    /// Archive could not be read or extracted.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network error (for URL installs).
    #[error("Network error: {0}")]
    Network(String),
}
