use std::io;
use std::path::Path;

use url::Url;

use crate::core::error::AppError;

/// Parses user input into a media URL.
///
/// Only `http` and `https` links are accepted; anything else is a validation
/// error rather than a backend failure.
///
/// # Example
///
/// ```
/// use mediarelay::core::utils::parse_media_url;
///
/// assert!(parse_media_url("https://example.com/v").is_ok());
/// assert!(parse_media_url("ftp://example.com/v").is_err());
/// ```
pub fn parse_media_url(input: &str) -> Result<Url, AppError> {
    let url = Url::parse(input.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::Validation(format!("unsupported URL scheme: {}", other))),
    }
}

/// Returns true when the text looks like a bare link the bot should react to.
pub fn looks_like_url(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with("http://") || text.starts_with("https://")
}

/// Keeps at most `limit` characters of `text`.
///
/// Counts Unicode scalar values, so multi-byte text is never split inside a
/// character.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Removes a file, treating an already-absent file as success.
///
/// Returns `Ok(true)` when a file was actually deleted.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Formats a byte count into a human-readable size (B, KB, MB, GB)
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
