//! Fake extraction backend
//!
//! Serves a configurable format list, writes real files into the job
//! directory on download and records every call for assertions.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use mediarelay::download::error::{DownloadError, ExtractionError};
use mediarelay::download::request::JobKind;
use mediarelay::download::source::{
    Extractor, FetchOutput, FetchSpec, MediaInfo, PlaylistEntry, ProbedFormat, SourceProgress, SubtitleFile,
};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorCall {
    Probe(String),
    Playlist(String),
    Download { url: String, kind: JobKind },
}

#[derive(Debug)]
pub struct FakeExtractor {
    pub formats: Vec<ProbedFormat>,
    pub playlist_urls: Vec<String>,
    /// Probe fails with a timeout
    pub probe_times_out: bool,
    /// Downloads of these URLs fail after writing a partial file
    pub failing_downloads: HashSet<String>,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub subtitle_langs: Vec<String>,
    pub media_size: usize,
    calls: Mutex<Vec<ExtractorCall>>,
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self {
            formats: Vec::new(),
            playlist_urls: Vec::new(),
            probe_times_out: false,
            failing_downloads: HashSet::new(),
            title: "Test Clip".to_string(),
            description: "A short description".to_string(),
            thumbnail_url: None,
            subtitle_langs: Vec::new(),
            media_size: 4096,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeExtractor {
    /// Extractor reporting `ids` as selectable formats, plus one audio-only stream.
    pub fn with_formats(ids: &[&str]) -> Self {
        let mut formats: Vec<ProbedFormat> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| ProbedFormat {
                format_id: id.to_string(),
                resolution: Some(format!("{}x{}", 640 * (i + 1), 360 * (i + 1))),
                ext: Some("mp4".to_string()),
            })
            .collect();
        formats.push(ProbedFormat {
            format_id: "140".to_string(),
            resolution: Some("audio only".to_string()),
            ext: Some("m4a".to_string()),
        });
        Self {
            formats,
            ..Self::default()
        }
    }

    /// Every probe fails with a timeout.
    pub fn timing_out(mut self) -> Self {
        self.probe_times_out = true;
        self
    }

    /// Downloads of `url` fail after leaving a partial file.
    pub fn failing_on(mut self, url: impl Into<String>) -> Self {
        self.failing_downloads.insert(url.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_subtitles(mut self, langs: &[&str]) -> Self {
        self.subtitle_langs = langs.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn with_playlist(mut self, urls: &[String]) -> Self {
        self.playlist_urls = urls.to_vec();
        self
    }

    pub fn calls(&self) -> Vec<ExtractorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<(String, JobKind)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ExtractorCall::Download { url, kind } => Some((url, kind)),
                _ => None,
            })
            .collect()
    }

    pub fn probe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ExtractorCall::Probe(_)))
            .count()
    }

    fn record(&self, call: ExtractorCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn probe(&self, url: &Url) -> Result<MediaInfo, ExtractionError> {
        self.record(ExtractorCall::Probe(url.to_string()));
        if self.probe_times_out {
            return Err(ExtractionError::Timeout(10));
        }
        Ok(MediaInfo {
            title: Some(self.title.clone()),
            formats: self.formats.clone(),
        })
    }

    async fn playlist(&self, url: &Url) -> Result<Vec<PlaylistEntry>, ExtractionError> {
        self.record(ExtractorCall::Playlist(url.to_string()));
        Ok(self
            .playlist_urls
            .iter()
            .enumerate()
            .map(|(i, u)| PlaylistEntry {
                url: Url::parse(u).unwrap(),
                title: Some(format!("Entry {}", i + 1)),
                position: i + 1,
            })
            .collect())
    }

    async fn download(
        &self,
        spec: &FetchSpec,
        progress_tx: mpsc::UnboundedSender<SourceProgress>,
    ) -> Result<FetchOutput, DownloadError> {
        self.record(ExtractorCall::Download {
            url: spec.url.to_string(),
            kind: spec.kind.clone(),
        });

        let ext = if spec.kind.is_audio() { "mp3" } else { "mp4" };
        let stem = format!("{} [fake]", self.title);

        if self.failing_downloads.contains(spec.url.as_str()) {
            std::fs::write(spec.output_dir.join(format!("{}.{}.part", stem, ext)), b"partial")?;
            let _ = progress_tx.send(SourceProgress {
                downloaded_bytes: 7,
                total_bytes: Some(self.media_size as u64),
            });
            return Err(DownloadError::Backend("ERROR: fragment 3 not found".to_string()));
        }

        let size = self.media_size as u64;
        for downloaded in [size / 4, size / 2, size] {
            let _ = progress_tx.send(SourceProgress {
                downloaded_bytes: downloaded,
                total_bytes: Some(size),
            });
        }

        let file_path = spec.output_dir.join(format!("{}.{}", stem, ext));
        std::fs::write(&file_path, vec![0u8; self.media_size])?;

        let mut subtitles = Vec::new();
        if !spec.kind.is_audio() {
            for lang in &self.subtitle_langs {
                let path = spec.output_dir.join(format!("{}.{}.vtt", stem, lang));
                std::fs::write(&path, b"WEBVTT\n")?;
                subtitles.push(SubtitleFile {
                    lang: lang.clone(),
                    path,
                });
            }
        }

        Ok(FetchOutput {
            file_path,
            title: self.title.clone(),
            description: self.description.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            subtitles,
        })
    }
}
