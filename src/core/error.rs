use thiserror::Error;

use crate::download::error::{DownloadError, ExtractionError};
use crate::telegram::relay::RelayError;
use crate::telegram::uploader::UploadError;

/// Centralized error type for the application
///
/// Every job-level failure converts into this enum, so handlers can render a
/// single user-facing message and log the full chain.
///
/// # Example
///
/// ```no_run
/// use mediarelay::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Format probe / metadata failure from the backend
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Backend or disk failure while fetching media
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Transport failure while relaying the result
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Status message / keyboard delivery failures
    #[error("Telegram error: {0}")]
    Relay(#[from] RelayError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Validation errors (bad URL scheme, malformed callback payload)
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Short description shown to the user in place of the status message.
    ///
    /// Backend stderr can be long and noisy; only the first line is kept.
    pub fn user_message(&self) -> String {
        let (prefix, detail) = match self {
            AppError::Extraction(e) => ("Could not read this link", e.to_string()),
            AppError::Download(e) => ("Download failed", e.to_string()),
            AppError::Upload(e) => ("Upload failed", e.to_string()),
            AppError::Relay(e) => ("Telegram error", e.to_string()),
            AppError::Io(e) => ("Storage error", e.to_string()),
            AppError::Url(e) => ("Invalid link", e.to_string()),
            AppError::Validation(msg) => ("Invalid request", msg.clone()),
        };
        let first_line = detail.lines().next().unwrap_or_default();
        let short: String = first_line.chars().take(300).collect();
        format!("❌ {}: {}", prefix, short)
    }
}
