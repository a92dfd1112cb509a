//! yt-dlp backend.
//!
//! Metadata calls (`-J`) run through `run_with_timeout`. The download itself
//! runs in `spawn_blocking` with line-buffered stdout/stderr readers, because
//! the progress template and the final info JSON arrive as text lines.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::core::config;
use crate::core::process::{run_with_timeout, ProcessError};
use crate::download::error::{DownloadError, ExtractionError};
use crate::download::request::{FormatChoice, JobKind};
use crate::download::source::{
    Extractor, FetchOutput, FetchSpec, MediaInfo, PlaylistEntry, SourceProgress, SubtitleFile,
};

/// Prefix of our progress template lines
const PROGRESS_MARKER: &str = "MRPROGRESS";
/// Prefix of the post-move info JSON line
const INFO_MARKER: &str = "MRINFO";
/// Stderr lines kept for error classification
const STDERR_TAIL: usize = 200;

const SUBTITLE_EXTENSIONS: &[&str] = &["vtt", "srt", "ass", "ttml", "srv3"];
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "tmp", "temp"];

/// Extractor backed by the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: String,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new(config::YTDL_BIN.as_str())
    }
}

impl YtDlp {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// `yt-dlp --version`, used by the `check-backend` CLI command.
    pub async fn version(&self) -> Result<String, ExtractionError> {
        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.arg("--version");
        let output = run_with_timeout(&mut cmd, config::ytdlp::probe_timeout())
            .await
            .map_err(map_process_error)?;
        if !output.status.success() {
            return Err(ExtractionError::from_stderr(&String::from_utf8_lossy(&output.stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn dump_json(&self, args: Vec<String>) -> Result<Vec<u8>, ExtractionError> {
        log::debug!("yt-dlp command: {} {}", self.bin, args.join(" "));
        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.args(&args).stdin(Stdio::null());
        let output = run_with_timeout(&mut cmd, config::ytdlp::probe_timeout())
            .await
            .map_err(map_process_error)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("yt-dlp metadata call failed: {}", stderr.trim());
            return Err(ExtractionError::from_stderr(&stderr));
        }
        Ok(output.stdout)
    }
}

fn map_process_error(e: ProcessError) -> ExtractionError {
    match e {
        ProcessError::Spawn(io) => ExtractionError::Spawn(io),
        ProcessError::Timeout(secs) => ExtractionError::Timeout(secs),
    }
}

/// Network knobs shared by every invocation.
fn network_args() -> Vec<String> {
    vec![
        "--socket-timeout".into(),
        config::ytdlp::SOCKET_TIMEOUT_SECS.to_string(),
        "--retries".into(),
        config::ytdlp::RETRIES.to_string(),
        "--fragment-retries".into(),
        config::ytdlp::FRAGMENT_RETRIES.to_string(),
        "--no-warnings".into(),
    ]
}

pub(crate) fn probe_args(url: &Url) -> Vec<String> {
    let mut args = vec!["-J".to_string(), "--no-playlist".to_string()];
    args.extend(network_args());
    args.push(url.to_string());
    args
}

pub(crate) fn playlist_args(url: &Url) -> Vec<String> {
    let mut args = vec![
        "-J".to_string(),
        "--flat-playlist".to_string(),
        "--playlist-end".to_string(),
        config::playlist::MAX_ITEMS.to_string(),
    ];
    args.extend(network_args());
    args.push(url.to_string());
    args
}

pub(crate) fn download_args(spec: &FetchSpec) -> Vec<String> {
    let template = spec.output_dir.join("%(title).150B [%(id)s].%(ext)s");
    let mut args = vec![
        "--no-playlist".to_string(),
        "--newline".to_string(),
        "--progress".to_string(),
        "--progress-template".to_string(),
        format!(
            "download:{} %(info.format_id)s %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s",
            PROGRESS_MARKER
        ),
        "--print".to_string(),
        format!("after_move:{} %()j", INFO_MARKER),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
    ];
    args.extend(network_args());

    match &spec.kind {
        JobKind::Video(video) => {
            let selector = match &video.format {
                FormatChoice::Best => config::ytdlp::DEFAULT_VIDEO_FORMAT.to_string(),
                FormatChoice::Id(id) => id.clone(),
            };
            args.extend([
                "-f".to_string(),
                selector,
                "--merge-output-format".to_string(),
                config::ytdlp::VIDEO_CONTAINER.to_string(),
                "--recode-video".to_string(),
                config::ytdlp::VIDEO_CONTAINER.to_string(),
                "--write-subs".to_string(),
                "--sub-langs".to_string(),
                config::ytdlp::SUBTITLE_LANGS.join(","),
            ]);
        }
        JobKind::Audio(_) => {
            args.extend([
                "-f".to_string(),
                "bestaudio/best".to_string(),
                "-x".to_string(),
                "--audio-format".to_string(),
                config::ytdlp::AUDIO_CODEC.to_string(),
            ]);
        }
    }

    args.push(spec.url.to_string());
    args
}

/// One parsed progress template line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProgressLine {
    pub stream: String,
    pub downloaded: u64,
    pub total: Option<u64>,
}

fn parse_number(raw: &str) -> Option<u64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64)
}

/// Parses `MRPROGRESS <format_id> <downloaded> <total> <estimate>`.
/// yt-dlp prints `NA` for unknown fields.
pub(crate) fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut parts = rest.split_whitespace();
    let stream = parts.next()?.to_string();
    let downloaded = parse_number(parts.next()?)?;
    let total = parts.next().and_then(parse_number);
    let estimate = parts.next().and_then(parse_number);
    Some(ProgressLine {
        stream,
        downloaded,
        total: total.or(estimate).filter(|t| *t > 0),
    })
}

/// Folds per-stream progress into one cumulative count.
///
/// `bv+ba` downloads two streams back to back, each counting from zero;
/// finished streams are added to a running base so the reported byte count
/// never goes backwards.
#[derive(Debug, Default)]
pub(crate) struct StreamAccumulator {
    stream: Option<String>,
    completed: u64,
    current: u64,
}

impl StreamAccumulator {
    pub fn feed(&mut self, line: &ProgressLine) -> SourceProgress {
        if self.stream.as_deref() != Some(line.stream.as_str()) {
            if self.stream.is_some() {
                self.completed += self.current;
            }
            self.stream = Some(line.stream.clone());
            self.current = 0;
        }
        self.current = self.current.max(line.downloaded);
        SourceProgress {
            downloaded_bytes: self.completed + self.current,
            total_bytes: line.total.map(|t| self.completed + t),
        }
    }
}

/// Subset of the post-move info dict we read.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FinalInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub requested_subtitles: Option<std::collections::HashMap<String, Option<Value>>>,
}

impl FinalInfo {
    fn subtitle_files(&self) -> Vec<SubtitleFile> {
        let mut subs: Vec<SubtitleFile> = self
            .requested_subtitles
            .iter()
            .flatten()
            .filter_map(|(lang, entry)| {
                let path = entry.as_ref()?.get("filepath")?.as_str()?;
                Some(SubtitleFile {
                    lang: lang.clone(),
                    path: PathBuf::from(path),
                })
            })
            .filter(|s| s.path.is_file())
            .collect();
        subs.sort_by(|a, b| a.lang.cmp(&b.lang));
        subs
    }
}

/// Raw outcome of the blocking worker.
struct WorkerOutput {
    info: Option<FinalInfo>,
}

fn run_download_blocking(
    bin: &str,
    args: &[String],
    progress_tx: mpsc::UnboundedSender<SourceProgress>,
) -> Result<WorkerOutput, DownloadError> {
    log::debug!("yt-dlp command: {} {}", bin, args.join(" "));
    let mut child = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| DownloadError::Extraction(ExtractionError::Spawn(e)))?;

    let accumulator = Arc::new(Mutex::new(StreamAccumulator::default()));
    let stderr_tail = Arc::new(Mutex::new(VecDeque::<String>::new()));

    let stderr_thread = child.stderr.take().map(|stream| {
        let accumulator = Arc::clone(&accumulator);
        let tail = Arc::clone(&stderr_tail);
        let tx = progress_tx.clone();
        std::thread::spawn(move || {
            for line in BufReader::new(stream).lines().map_while(Result::ok) {
                if let Some(parsed) = parse_progress_line(&line) {
                    forward_progress(&accumulator, &tx, &parsed);
                    continue;
                }
                log::debug!("yt-dlp stderr: {}", line);
                if let Ok(mut lines) = tail.lock() {
                    lines.push_back(line);
                    if lines.len() > STDERR_TAIL {
                        lines.pop_front();
                    }
                }
            }
        })
    });

    let mut info = None;
    if let Some(stream) = child.stdout.take() {
        for line in BufReader::new(stream).lines().map_while(Result::ok) {
            if let Some(parsed) = parse_progress_line(&line) {
                forward_progress(&accumulator, &progress_tx, &parsed);
            } else if let Some(json) = line.strip_prefix(INFO_MARKER) {
                match serde_json::from_str::<FinalInfo>(json.trim()) {
                    Ok(parsed) => info = Some(parsed),
                    Err(e) => log::warn!("Could not parse yt-dlp info line: {}", e),
                }
            } else {
                log::debug!("yt-dlp stdout: {}", line);
            }
        }
    }

    let status = child.wait()?;
    if let Some(handle) = stderr_thread {
        let _ = handle.join();
    }

    if !status.success() {
        let stderr = stderr_tail
            .lock()
            .map(|lines| lines.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();
        log::error!("yt-dlp exited with {}: {}", status, stderr);
        return Err(DownloadError::from_stderr(&stderr));
    }

    Ok(WorkerOutput { info })
}

fn forward_progress(
    accumulator: &Mutex<StreamAccumulator>,
    tx: &mpsc::UnboundedSender<SourceProgress>,
    line: &ProgressLine,
) {
    if let Ok(mut acc) = accumulator.lock() {
        let _ = tx.send(acc.feed(line));
    }
}

fn has_extension(path: &Path, set: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| set.iter().any(|s| e.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

/// Fallback when yt-dlp did not print the info line: the largest finished
/// non-subtitle file in the job directory.
pub(crate) fn find_media_file(dir: &Path) -> Result<PathBuf, DownloadError> {
    let mut best: Option<(u64, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || has_extension(&path, SUBTITLE_EXTENSIONS) || has_extension(&path, PARTIAL_EXTENSIONS) {
            continue;
        }
        if has_extension(&path, &["jpg", "jpeg", "png", "webp"]) {
            continue;
        }
        let size = std::fs::metadata(&path)?.len();
        if best.as_ref().map(|(s, _)| size > *s).unwrap_or(true) {
            best = Some((size, path));
        }
    }
    best.map(|(_, p)| p)
        .ok_or_else(|| DownloadError::FileNotFound(dir.display().to_string()))
}

/// Fallback subtitle discovery: `<name>.<lang>.<ext>` files in the job directory.
pub(crate) fn find_subtitle_files(dir: &Path) -> Vec<SubtitleFile> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut subs: Vec<SubtitleFile> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_extension(p, SUBTITLE_EXTENSIONS))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let lang = stem.rsplit_once('.').map(|(_, l)| l).unwrap_or("und").to_string();
            Some(SubtitleFile { lang, path })
        })
        .collect();
    subs.sort_by(|a, b| a.lang.cmp(&b.lang));
    subs
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "media".to_string())
}

/// Combines what the backend reported with what is actually on disk.
pub(crate) fn collect_output(spec: &FetchSpec, info: Option<FinalInfo>) -> Result<FetchOutput, DownloadError> {
    let info = info.unwrap_or_default();
    let file_path = match info.filepath.as_deref().map(PathBuf::from) {
        Some(path) if path.is_file() => path,
        reported => {
            if let Some(path) = reported {
                log::warn!("Reported output {} missing, scanning job directory", path.display());
            }
            find_media_file(&spec.output_dir)?
        }
    };

    let subtitles = if spec.kind.is_audio() {
        Vec::new()
    } else {
        let reported = info.subtitle_files();
        if reported.is_empty() {
            find_subtitle_files(&spec.output_dir)
        } else {
            reported
        }
    };

    Ok(FetchOutput {
        title: info
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_path(&file_path)),
        description: info.description.clone().unwrap_or_default(),
        thumbnail_url: info.thumbnail.clone().filter(|t| !t.is_empty()),
        file_path,
        subtitles,
    })
}

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<FlatEntry>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

pub(crate) fn parse_playlist(json: &[u8]) -> Result<Vec<PlaylistEntry>, ExtractionError> {
    let playlist: FlatPlaylist = serde_json::from_slice(json)?;
    let entries = playlist
        .entries
        .into_iter()
        .filter_map(|entry| {
            let raw = entry.webpage_url.or(entry.url)?;
            match Url::parse(&raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => Some((url, entry.title)),
                _ => {
                    log::warn!("Skipping playlist entry with unusable URL: {}", raw);
                    None
                }
            }
        })
        .take(config::playlist::MAX_ITEMS)
        .enumerate()
        .map(|(i, (url, title))| PlaylistEntry {
            url,
            title,
            position: i + 1,
        })
        .collect();
    Ok(entries)
}

#[async_trait]
impl Extractor for YtDlp {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn probe(&self, url: &Url) -> Result<MediaInfo, ExtractionError> {
        let stdout = self.dump_json(probe_args(url)).await?;
        Ok(serde_json::from_slice(&stdout)?)
    }

    async fn playlist(&self, url: &Url) -> Result<Vec<PlaylistEntry>, ExtractionError> {
        let stdout = self.dump_json(playlist_args(url)).await?;
        let entries = parse_playlist(&stdout)?;
        log::info!("Playlist {} has {} usable entries", url, entries.len());
        Ok(entries)
    }

    async fn download(
        &self,
        spec: &FetchSpec,
        progress_tx: mpsc::UnboundedSender<SourceProgress>,
    ) -> Result<FetchOutput, DownloadError> {
        let bin = self.bin.clone();
        let args = download_args(spec);
        log::info!("Starting yt-dlp download of {} into {}", spec.url, spec.output_dir.display());

        let worker = tokio::task::spawn_blocking(move || run_download_blocking(&bin, &args, progress_tx))
            .await
            .map_err(|e| DownloadError::Worker(e.to_string()))??;

        collect_output(spec, worker.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(kind: JobKind, dir: &Path) -> FetchSpec {
        FetchSpec {
            url: Url::parse("https://example.com/watch?v=1").unwrap(),
            kind,
            output_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_probe_args_carry_network_limits() {
        let url = Url::parse("https://example.com/v").unwrap();
        let args = probe_args(&url);
        assert_eq!(&args[..2], &["-J", "--no-playlist"]);
        assert!(args.windows(2).any(|w| w == ["--socket-timeout", "10"]));
        assert!(args.windows(2).any(|w| w == ["--retries", "3"]));
        assert!(args.windows(2).any(|w| w == ["--fragment-retries", "5"]));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
    }

    #[test]
    fn test_video_args_use_selected_format_and_subs() {
        let dir = PathBuf::from("/tmp/job-x");
        let args = download_args(&spec(JobKind::video(FormatChoice::Id("137".into())), &dir));
        assert!(args.windows(2).any(|w| w == ["-f", "137"]));
        assert!(args.windows(2).any(|w| w == ["--recode-video", "mp4"]));
        assert!(args.windows(2).any(|w| w == ["--sub-langs", "en,es,fr"]));
        assert!(args.iter().any(|a| a.starts_with("/tmp/job-x/")));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn test_best_video_uses_default_selector() {
        let args = download_args(&spec(JobKind::best_video(), Path::new("/tmp/j")));
        assert!(args.windows(2).any(|w| w == ["-f", "bv+ba/best"]));
    }

    #[test]
    fn test_audio_args_extract_mp3() {
        let args = download_args(&spec(JobKind::audio(), Path::new("/tmp/j")));
        assert!(args.contains(&"-x".to_string()));
        assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
        assert!(!args.contains(&"--write-subs".to_string()));
    }

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(
            parse_progress_line("MRPROGRESS 137 1024 4096 NA"),
            Some(ProgressLine {
                stream: "137".into(),
                downloaded: 1024,
                total: Some(4096)
            })
        );
        let est = parse_progress_line("MRPROGRESS 18 10 NA 2000.5").unwrap();
        assert_eq!(est.total, Some(2000));
        assert_eq!(parse_progress_line("MRPROGRESS 18 10 NA NA").unwrap().total, None);
        assert_eq!(parse_progress_line("[download] 10% of 1MiB"), None);
        assert_eq!(parse_progress_line("MRPROGRESS 18 NA NA NA"), None);
    }

    #[test]
    fn test_accumulator_never_regresses_across_streams() {
        let mut acc = StreamAccumulator::default();
        let line = |s: &str, d: u64, t: u64| ProgressLine {
            stream: s.into(),
            downloaded: d,
            total: Some(t),
        };
        let a = acc.feed(&line("137", 500, 1000));
        let b = acc.feed(&line("137", 1000, 1000));
        let c = acc.feed(&line("140", 10, 200));
        let d = acc.feed(&line("140", 200, 200));
        assert_eq!(
            vec![a.downloaded_bytes, b.downloaded_bytes, c.downloaded_bytes, d.downloaded_bytes],
            vec![500, 1000, 1010, 1200]
        );
        assert_eq!(d.total_bytes, Some(1200));
    }

    #[test]
    fn test_parse_playlist_caps_and_skips() {
        let mut entries: Vec<String> = (0..60)
            .map(|i| format!(r#"{{"url": "https://example.com/v{}", "title": "t{}"}}"#, i, i))
            .collect();
        entries.insert(0, r#"{"url": "abc123"}"#.to_string());
        let json = format!(r#"{{"entries": [{}]}}"#, entries.join(","));
        let parsed = parse_playlist(json.as_bytes()).unwrap();
        assert_eq!(parsed.len(), 50);
        assert_eq!(parsed[0].position, 1);
        assert_eq!(parsed[0].url.as_str(), "https://example.com/v0");
        assert_eq!(parsed[0].title.as_deref(), Some("t0"));
    }

    #[test]
    fn test_collect_output_prefers_reported_path() {
        let tmp = tempfile::tempdir().unwrap();
        let media = tmp.path().join("Clip [1].mp4");
        let sub = tmp.path().join("Clip [1].en.vtt");
        std::fs::write(&media, b"video").unwrap();
        std::fs::write(&sub, b"WEBVTT").unwrap();
        let json = format!(
            r#"{{"title": "Clip", "description": "d", "thumbnail": "https://i/t.jpg", "filepath": {:?},
                "requested_subtitles": {{"en": {{"ext": "vtt", "filepath": {:?}}}, "es": null}}}}"#,
            media.to_str().unwrap(),
            sub.to_str().unwrap()
        );
        let info: FinalInfo = serde_json::from_str(&json).unwrap();
        let out = collect_output(&spec(JobKind::best_video(), tmp.path()), Some(info)).unwrap();
        assert_eq!(out.file_path, media);
        assert_eq!(out.title, "Clip");
        assert_eq!(out.thumbnail_url.as_deref(), Some("https://i/t.jpg"));
        assert_eq!(out.subtitles, vec![SubtitleFile { lang: "en".into(), path: sub }]);
    }

    #[test]
    fn test_collect_output_scans_directory_without_info() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Song [9].mp3"), b"0123456789").unwrap();
        std::fs::write(tmp.path().join("Song [9].webm.part"), b"0123456789012345").unwrap();
        let out = collect_output(&spec(JobKind::audio(), tmp.path()), None).unwrap();
        assert_eq!(out.file_path, tmp.path().join("Song [9].mp3"));
        assert_eq!(out.title, "Song [9]");
        assert!(out.subtitles.is_empty());
    }

    #[test]
    fn test_collect_output_empty_dir_is_file_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = collect_output(&spec(JobKind::audio(), tmp.path()), None).unwrap_err();
        assert!(matches!(err, DownloadError::FileNotFound(_)));
    }

    #[test]
    fn test_find_subtitle_files_reads_lang_from_name() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("A.fr.vtt"), b"x").unwrap();
        std::fs::write(tmp.path().join("A.en.srt"), b"x").unwrap();
        std::fs::write(tmp.path().join("A.mp4"), b"x").unwrap();
        let langs: Vec<String> = find_subtitle_files(tmp.path()).into_iter().map(|s| s.lang).collect();
        assert_eq!(langs, vec!["en", "fr"]);
    }
}
