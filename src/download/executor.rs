//! Download executor.
//!
//! Runs one request through the extractor into a fresh job directory,
//! translating backend progress into `ProgressSnapshot`s and attaching a
//! bounded thumbnail when the source has one.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::config;
use crate::core::utils::{remove_file_if_exists, truncate_chars};
use crate::download::error::DownloadError;
use crate::download::progress::{Phase, ProgressSink, ProgressSnapshot};
use crate::download::request::{DownloadRequest, JobKind};
use crate::download::scratch::{JobDir, ScratchDir};
use crate::download::source::{Extractor, FetchSpec, SourceProgress, SubtitleFile};
use crate::download::thumbnail::ThumbnailProcessor;

const THUMBNAIL_FILE: &str = "thumb.jpg";

/// What kind of attachment the result becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl From<&JobKind> for MediaKind {
    fn from(kind: &JobKind) -> Self {
        match kind {
            JobKind::Video(_) => MediaKind::Video,
            JobKind::Audio(_) => MediaKind::Audio,
        }
    }
}

/// Finished download, owned by the job until the uploader consumes it.
///
/// Every path in here lives under `job_dir`.
#[derive(Debug)]
pub struct DownloadResult {
    pub file_path: PathBuf,
    pub title: String,
    pub caption: String,
    pub thumbnail: Option<PathBuf>,
    pub subtitles: Vec<SubtitleFile>,
    pub kind: MediaKind,
    pub job_dir: JobDir,
}

impl DownloadResult {
    /// Every local file referenced by this result, media first.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.file_path.clone()];
        files.extend(self.thumbnail.iter().cloned());
        files.extend(self.subtitles.iter().map(|s| s.path.clone()));
        files
    }
}

/// `🎥 <title>` followed by the description cut to 1024 characters.
///
/// The whole caption never exceeds `config::upload::CAPTION_LIMIT`; a long
/// title eats into the description budget.
pub fn build_caption(title: &str, description: &str) -> String {
    let header = format!("🎥 {}", title);
    let header = truncate_chars(&header, config::upload::CAPTION_LIMIT);
    let budget = config::upload::CAPTION_LIMIT
        .saturating_sub(header.chars().count() + 2)
        .min(config::upload::CAPTION_DESCRIPTION_LIMIT);
    let description = truncate_chars(description.trim(), budget);
    if description.is_empty() {
        header.to_string()
    } else {
        format!("{}\n\n{}", header, description)
    }
}

/// Fetches media through an `Extractor` into per-job scratch directories.
#[derive(Clone)]
pub struct DownloadExecutor {
    extractor: Arc<dyn Extractor>,
    thumbnails: ThumbnailProcessor,
    scratch: ScratchDir,
}

impl DownloadExecutor {
    pub fn new(extractor: Arc<dyn Extractor>, thumbnails: ThumbnailProcessor, scratch: ScratchDir) -> Self {
        Self {
            extractor,
            thumbnails,
            scratch,
        }
    }

    pub fn extractor(&self) -> &Arc<dyn Extractor> {
        &self.extractor
    }

    /// Downloads `request` and reports progress into `sink`.
    ///
    /// On failure the job directory is already removed when this returns.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadResult, DownloadError> {
        let job_dir = self.scratch.create_job_dir()?;
        log::info!(
            "Job {}: downloading {} ({:?}) via {}",
            job_dir.id(),
            request.url,
            request.kind,
            self.extractor.name()
        );

        let spec = FetchSpec {
            url: request.url.clone(),
            kind: request.kind.clone(),
            output_dir: job_dir.path().to_path_buf(),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<SourceProgress>();
        let forward = async {
            while let Some(p) = rx.recv().await {
                sink.report(ProgressSnapshot::new(p.downloaded_bytes, p.total_bytes, Phase::Downloading));
            }
        };
        let (fetched, ()) = tokio::join!(self.extractor.download(&spec, tx), forward);

        let output = match fetched {
            Ok(output) => output,
            Err(e) => {
                log::error!("Job {}: download failed [{}]: {}", job_dir.id(), e.subcategory(), e);
                if let Err(cleanup) = job_dir.remove() {
                    log::warn!("Failed to remove job directory after error: {}", cleanup);
                }
                return Err(e);
            }
        };

        let thumbnail = match &output.thumbnail_url {
            Some(url) => self.thumbnails.process(url, &job_dir.path().join(THUMBNAIL_FILE)).await,
            None => None,
        };
        if thumbnail.is_none() {
            // A failed conversion may leave a partial file behind
            let partial = job_dir.path().join(THUMBNAIL_FILE);
            if let Err(e) = remove_file_if_exists(&partial) {
                log::warn!("Failed to remove partial thumbnail {}: {}", partial.display(), e);
            }
        }

        log::info!(
            "Job {}: downloaded {} (thumbnail: {}, subtitles: {})",
            job_dir.id(),
            output.file_path.display(),
            thumbnail.is_some(),
            output.subtitles.len()
        );

        Ok(DownloadResult {
            caption: build_caption(&output.title, &output.description),
            file_path: output.file_path,
            title: output.title,
            thumbnail,
            subtitles: output.subtitles,
            kind: MediaKind::from(&request.kind),
            job_dir,
        })
    }
}
