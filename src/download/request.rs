//! Job request model.
//!
//! A request is created per user interaction and dropped when the job ends.

use std::fmt;

use url::Url;

use crate::core::error::AppError;
use crate::core::utils::parse_media_url;

/// Sentinel used in callback payloads for "let the backend decide".
pub const BEST_SENTINEL: &str = "best";

/// Which encoding a video job should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatChoice {
    /// Backend default selector
    Best,
    /// Opaque format identifier from the catalog
    Id(String),
}

impl FormatChoice {
    /// Parses the wire form; `"best"` and the empty string mean `Best`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | BEST_SENTINEL => FormatChoice::Best,
            id => FormatChoice::Id(id.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FormatChoice::Best => BEST_SENTINEL,
            FormatChoice::Id(id) => id,
        }
    }
}

impl fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video job: fetch one encoding, normalized to mp4, with subtitles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJob {
    pub format: FormatChoice,
}

/// Audio job: audio track only, normalized to mp3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioJob;

/// Tagged union of the job variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Video(VideoJob),
    Audio(AudioJob),
}

impl JobKind {
    pub fn best_video() -> Self {
        JobKind::Video(VideoJob {
            format: FormatChoice::Best,
        })
    }

    pub fn video(format: FormatChoice) -> Self {
        JobKind::Video(VideoJob { format })
    }

    pub fn audio() -> Self {
        JobKind::Audio(AudioJob)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, JobKind::Audio(_))
    }
}

/// One user-initiated download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: Url,
    pub kind: JobKind,
}

impl DownloadRequest {
    /// Validates the URL (http/https only) and builds a request.
    pub fn new(url: &str, kind: JobKind) -> Result<Self, AppError> {
        Ok(Self {
            url: parse_media_url(url)?,
            kind,
        })
    }

    pub fn from_url(url: Url, kind: JobKind) -> Self {
        Self { url, kind }
    }
}
