//! Extraction backend abstraction.
//!
//! Provides the `Extractor` trait that the rest of the pipeline talks to. The
//! production implementation drives the yt-dlp binary (`ytdlp::YtDlp`); tests
//! plug in a fake that writes files into the job directory.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use url::Url;

use crate::download::error::{DownloadError, ExtractionError};
use crate::download::request::JobKind;

/// Raw progress tick emitted by the backend worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceProgress {
    /// Bytes downloaded so far (cumulative across streams of one job)
    pub downloaded_bytes: u64,
    /// Total bytes expected, exact or estimated
    pub total_bytes: Option<u64>,
}

/// One encoding as reported by the backend, before normalization.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProbedFormat {
    pub format_id: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
}

/// Result of a metadata probe (no bytes downloaded).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub formats: Vec<ProbedFormat>,
}

/// One entry of a playlist, as enumerated without downloading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub url: Url,
    pub title: Option<String>,
    /// Position in playlist (1-indexed)
    pub position: usize,
}

/// Parameters of one backend download call.
#[derive(Debug, Clone)]
pub struct FetchSpec {
    pub url: Url,
    pub kind: JobKind,
    /// Per-job scratch directory; every output file lands here
    pub output_dir: PathBuf,
}

/// Subtitle track written next to the media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleFile {
    pub lang: String,
    pub path: PathBuf,
}

/// What the backend actually wrote, with the metadata needed for the caption.
#[derive(Debug, Clone)]
pub struct FetchOutput {
    pub file_path: PathBuf,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub subtitles: Vec<SubtitleFile>,
}

/// Extraction backend: resolves URLs to encodings and performs the fetch.
///
/// `download` may block on a child process internally; implementations must
/// offload that work (e.g. `spawn_blocking`) and report progress through the
/// channel instead of touching shared state from the worker thread.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable name of this backend (e.g. "yt-dlp")
    fn name(&self) -> &str;

    /// Metadata probe: title and the list of available encodings.
    async fn probe(&self, url: &Url) -> Result<MediaInfo, ExtractionError>;

    /// Enumerate playlist entries without downloading them.
    async fn playlist(&self, url: &Url) -> Result<Vec<PlaylistEntry>, ExtractionError>;

    /// Fetch the media into `spec.output_dir`, sending progress through the channel.
    async fn download(
        &self,
        spec: &FetchSpec,
        progress_tx: mpsc::UnboundedSender<SourceProgress>,
    ) -> Result<FetchOutput, DownloadError>;
}
