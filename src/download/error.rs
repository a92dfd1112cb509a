use thiserror::Error;

/// Failure of the metadata probe (format listing, playlist enumeration).
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The backend gave up on the host within its socket timeout / retry budget
    #[error("the source did not respond within {0}s")]
    Timeout(u64),
    /// No extractor matched the URL
    #[error("unsupported URL: {0}")]
    Unsupported(String),
    /// DNS, connection refused, HTTP 4xx/5xx from the source
    #[error("source unreachable: {0}")]
    Unreachable(String),
    /// Any other non-zero exit of the backend
    #[error("{0}")]
    Backend(String),
    /// The backend printed something we could not parse
    #[error("unexpected backend output: {0}")]
    Parse(#[from] serde_json::Error),
    /// The backend binary could not be started
    #[error("failed to start yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),
}

impl ExtractionError {
    /// Classifies backend stderr into the taxonomy above.
    pub fn from_stderr(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        let detail = last_error_line(stderr);
        if lower.contains("timed out") || lower.contains("timeout") {
            ExtractionError::Timeout(crate::core::config::ytdlp::SOCKET_TIMEOUT_SECS)
        } else if lower.contains("unsupported url") || lower.contains("no suitable extractor") {
            ExtractionError::Unsupported(detail)
        } else if lower.contains("unable to download webpage")
            || lower.contains("name or service not known")
            || lower.contains("failed to resolve")
            || lower.contains("connection refused")
            || lower.contains("http error")
        {
            ExtractionError::Unreachable(detail)
        } else {
            ExtractionError::Backend(detail)
        }
    }
}

/// Failure while fetching media bytes to the scratch directory.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Metadata stage failed inside a download call
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// yt-dlp exited non-zero (includes exhausted fragment retries)
    #[error("{0}")]
    Backend(String),
    /// yt-dlp reported success but no media file can be found
    #[error("output file not found in {0}")]
    FileNotFound(String),
    /// Scratch directory / disk failures
    #[error("disk error: {0}")]
    Io(#[from] std::io::Error),
    /// The blocking worker panicked or was cancelled
    #[error("download worker failed: {0}")]
    Worker(String),
}

impl DownloadError {
    /// Returns subcategory for logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::Extraction(_) => "extraction",
            DownloadError::Backend(_) => "ytdlp",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Io(_) => "io",
            DownloadError::Worker(_) => "worker",
        }
    }

    pub fn from_stderr(stderr: &str) -> Self {
        DownloadError::Backend(last_error_line(stderr))
    }
}

/// Thumbnail failures. Never surfaced to the user: the call site collapses
/// them to "no thumbnail".
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("decode/resize failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Picks the most useful line of yt-dlp stderr: the last `ERROR:` line, else
/// the last non-empty line.
pub(crate) fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| "yt-dlp failed without output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_timeout() {
        let err = ExtractionError::from_stderr("ERROR: [generic] Unable to download webpage: The read operation timed out");
        assert!(matches!(err, ExtractionError::Timeout(10)));
    }

    #[test]
    fn test_classify_unsupported() {
        let err = ExtractionError::from_stderr("ERROR: Unsupported URL: https://example.com/v");
        match err {
            ExtractionError::Unsupported(msg) => assert!(msg.contains("example.com")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_unreachable() {
        let err = ExtractionError::from_stderr("WARNING: x\nERROR: Unable to download webpage: HTTP Error 404: Not Found");
        assert!(matches!(err, ExtractionError::Unreachable(_)));
    }

    #[test]
    fn test_classify_other() {
        let err = ExtractionError::from_stderr("ERROR: Private video");
        assert_eq!(err.to_string(), "ERROR: Private video");
    }

    #[test]
    fn test_last_error_line_prefers_error() {
        let stderr = "[youtube] abc: Downloading\nERROR: fragment 3 not found\n[download] giving up\n";
        assert_eq!(last_error_line(stderr), "ERROR: fragment 3 not found");
        assert_eq!(last_error_line(""), "yt-dlp failed without output");
        assert_eq!(last_error_line("only line\n"), "only line");
    }

    #[test]
    fn test_download_error_subcategory() {
        assert_eq!(DownloadError::Backend("".into()).subcategory(), "ytdlp");
        assert_eq!(DownloadError::FileNotFound("".into()).subcategory(), "file_not_found");
        assert_eq!(DownloadError::Worker("".into()).subcategory(), "worker");
    }
}
