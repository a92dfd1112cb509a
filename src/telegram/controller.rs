//! Interaction controller.
//!
//! Turns one inbound event (link, command, button press) into one job and
//! drives it through resolve, download, upload and cleanup, keeping the
//! status message in sync.

use std::sync::Arc;
use std::time::Duration;

use teloxide::types::{ChatId, MessageId};
use url::Url;

use crate::core::config;
use crate::core::error::AppError;
use crate::core::utils::parse_media_url;
use crate::download::executor::DownloadExecutor;
use crate::download::formats;
use crate::download::request::{DownloadRequest, FormatChoice, JobKind};
use crate::telegram::cache::CallbackUrlCache;
use crate::telegram::job::{Job, JobState, TransitionError};
use crate::telegram::keyboard::{build_format_keyboard, fits_inline, parse_callback, UrlRef};
use crate::telegram::relay::Relay;
use crate::telegram::status::StatusMessage;
use crate::telegram::uploader::{self, RelayUploader};

pub const FETCHING_QUALITIES_TEXT: &str = "🔍 Fetching available qualities...";
pub const CHOOSE_QUALITY_TEXT: &str = "🎞 Choose a quality:";
pub const STARTING_DOWNLOAD_TEXT: &str = "⏳ Starting download...";
pub const PREPARING_AUDIO_TEXT: &str = "🎧 Preparing audio...";
pub const READING_PLAYLIST_TEXT: &str = "📋 Reading playlist...";

pub const HELP_TEXT: &str = "Send me a link and I'll download the media and send it back.\n\n\
/video <url> - pick a video quality\n\
/audio <url> - audio only (mp3)\n\
/playlist <url> - every item of a playlist\n\
/help - this message";

/// Runtime knobs; tests shorten the delays.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Minimum interval between status message edits
    pub progress_interval: Duration,
    /// How long an error stays visible before the status message goes away
    pub error_linger: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            progress_interval: config::progress::update_interval(),
            error_linger: config::progress::error_linger(),
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Media delivered, status message removed
    Delivered,
    /// Quality keyboard shown; a button press resumes the job
    AwaitingChoice,
    /// Every entry processed; failed ones were reported individually
    PlaylistDone { delivered: usize, failed: usize },
    /// User-facing error text
    Failed(String),
}

/// Result of handling one inbound event.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub visited: Vec<JobState>,
    pub outcome: JobOutcome,
}

impl JobReport {
    fn new(job: &Job, outcome: JobOutcome) -> Self {
        Self {
            visited: job.visited().to_vec(),
            outcome,
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// How a single-link video job left the resolve step.
enum Pending {
    Delivered,
    AwaitingChoice,
}

#[derive(Clone)]
pub struct JobController {
    relay: Arc<dyn Relay>,
    executor: DownloadExecutor,
    uploader: RelayUploader,
    callbacks: CallbackUrlCache,
    settings: ControllerSettings,
}

impl JobController {
    pub fn new(
        relay: Arc<dyn Relay>,
        executor: DownloadExecutor,
        uploader: RelayUploader,
        callbacks: CallbackUrlCache,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            relay,
            executor,
            uploader,
            callbacks,
            settings,
        }
    }

    pub fn relay(&self) -> &Arc<dyn Relay> {
        &self.relay
    }

    /// Plain link or `/video <url>`: offer a quality choice when there is one.
    pub async fn handle_url(&self, chat: ChatId, reply_to: Option<MessageId>, text: &str) -> JobReport {
        let mut job = Job::new();
        let url = match parse_media_url(text) {
            Ok(url) => url,
            Err(e) => return self.reject(&job, chat, reply_to, e).await,
        };
        log::info!("Chat {}: video request for {}", chat, url);

        let status = match StatusMessage::send(Arc::clone(&self.relay), chat, reply_to, FETCHING_QUALITIES_TEXT).await {
            Ok(status) => status,
            Err(e) => return self.abort(&mut job, e.into()),
        };

        match self.offer_or_download(&mut job, &status, url).await {
            Ok(Pending::AwaitingChoice) => JobReport::new(&job, JobOutcome::AwaitingChoice),
            Ok(Pending::Delivered) => self.complete(&mut job, status).await,
            Err(e) => self.fail(&mut job, status, e).await,
        }
    }

    pub async fn handle_video_command(&self, chat: ChatId, reply_to: Option<MessageId>, arg: &str) -> JobReport {
        if arg.trim().is_empty() {
            return self.usage(chat, reply_to, "/video <url>").await;
        }
        self.handle_url(chat, reply_to, arg).await
    }

    /// `/audio <url>`: straight to download, no quality choice.
    pub async fn handle_audio(&self, chat: ChatId, reply_to: Option<MessageId>, arg: &str) -> JobReport {
        if arg.trim().is_empty() {
            return self.usage(chat, reply_to, "/audio <url>").await;
        }
        let mut job = Job::new();
        let request = match DownloadRequest::new(arg, JobKind::audio()) {
            Ok(request) => request,
            Err(e) => return self.reject(&job, chat, reply_to, e).await,
        };
        log::info!("Chat {}: audio request for {}", chat, request.url);

        let status = match StatusMessage::send(Arc::clone(&self.relay), chat, reply_to, PREPARING_AUDIO_TEXT).await {
            Ok(status) => status,
            Err(e) => return self.abort(&mut job, e.into()),
        };
        match self.download_and_upload(&mut job, &status, request).await {
            Ok(()) => self.complete(&mut job, status).await,
            Err(e) => self.fail(&mut job, status, e).await,
        }
    }

    /// Quality button press: `url|format` or `#token|format`.
    ///
    /// The keyboard message becomes the status message of the resumed job.
    pub async fn handle_callback(&self, chat: ChatId, message: MessageId, data: &str) -> JobReport {
        let mut job = Job::resumed();
        let status = StatusMessage::attach(Arc::clone(&self.relay), chat, message);

        let (url, format) = match self.decode_callback(data).await {
            Ok(decoded) => decoded,
            Err(e) => return self.fail(&mut job, status, e).await,
        };
        log::info!("Chat {}: quality {} chosen for {}", chat, format, url);

        status.set_text(STARTING_DOWNLOAD_TEXT).await;
        let request = DownloadRequest::from_url(url, JobKind::video(format));
        match self.download_and_upload(&mut job, &status, request).await {
            Ok(()) => self.complete(&mut job, status).await,
            Err(e) => self.fail(&mut job, status, e).await,
        }
    }

    /// `/playlist <url>`: every entry in order, best quality, one at a time.
    pub async fn handle_playlist(&self, chat: ChatId, reply_to: Option<MessageId>, arg: &str) -> JobReport {
        if arg.trim().is_empty() {
            return self.usage(chat, reply_to, "/playlist <url>").await;
        }
        let mut job = Job::for_playlist();
        let url = match parse_media_url(arg) {
            Ok(url) => url,
            Err(e) => return self.reject(&job, chat, reply_to, e).await,
        };
        log::info!("Chat {}: playlist request for {}", chat, url);

        let status = match StatusMessage::send(Arc::clone(&self.relay), chat, reply_to, READING_PLAYLIST_TEXT).await {
            Ok(status) => status,
            Err(e) => return self.abort(&mut job, e.into()),
        };

        let entries = match self.executor.extractor().playlist(&url).await {
            Ok(entries) if entries.is_empty() => {
                let e = AppError::Validation("the playlist has no downloadable entries".to_string());
                return self.fail(&mut job, status, e).await;
            }
            Ok(entries) => entries,
            Err(e) => return self.fail(&mut job, status, e.into()).await,
        };

        let total = entries.len();
        let mut delivered = 0;
        let mut failed = 0;
        for entry in entries {
            let label = entry.title.clone().unwrap_or_else(|| entry.url.to_string());
            status
                .set_text(&format!("📋 [{}/{}] {}", entry.position, total, label))
                .await;

            let request = DownloadRequest::from_url(entry.url, JobKind::best_video());
            match self.download_and_upload(&mut job, &status, request).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    log::warn!("Playlist entry {}/{} failed: {}", entry.position, total, e);
                    job.finish();
                    let text = format!("⚠️ [{}/{}] {}\n{}", entry.position, total, label, e.user_message());
                    if let Err(e) = self.relay.send_text(chat, reply_to, &text).await {
                        log::warn!("Failed to report playlist entry failure: {}", e);
                    }
                }
            }
        }

        job.finish();
        status.remove().await;
        let summary = format!("✅ Playlist finished: {} of {} delivered", delivered, total);
        if let Err(e) = self.relay.send_text(chat, reply_to, &summary).await {
            log::warn!("Failed to send playlist summary: {}", e);
        }
        JobReport::new(&job, JobOutcome::PlaylistDone { delivered, failed })
    }

    /// `/start`, `/help`.
    pub async fn handle_help(&self, chat: ChatId) {
        if let Err(e) = self.relay.send_text(chat, None, HELP_TEXT).await {
            log::warn!("Failed to send help to chat {}: {}", chat, e);
        }
    }

    async fn offer_or_download(&self, job: &mut Job, status: &StatusMessage, url: Url) -> Result<Pending, AppError> {
        let catalog = formats::resolve(self.executor.extractor().as_ref(), &url).await?;
        if !catalog.needs_choice() {
            log::info!("{} selectable format(s) for {}, downloading best", catalog.len(), url);
            let request = DownloadRequest::from_url(url, JobKind::best_video());
            self.download_and_upload(job, status, request).await?;
            return Ok(Pending::Delivered);
        }

        job.advance(JobState::AwaitingFormatChoice)?;
        let url_ref = if fits_inline(url.as_str(), &catalog) {
            url.to_string()
        } else {
            self.callbacks.register(url).await
        };
        status
            .show_keyboard(CHOOSE_QUALITY_TEXT, build_format_keyboard(&url_ref, &catalog))
            .await?;
        Ok(Pending::AwaitingChoice)
    }

    async fn decode_callback(&self, data: &str) -> Result<(Url, FormatChoice), AppError> {
        let callback =
            parse_callback(data).ok_or_else(|| AppError::Validation(format!("malformed choice: {}", data)))?;
        let url = match callback.url {
            UrlRef::Inline(raw) => parse_media_url(&raw)?,
            UrlRef::Token(token) => self
                .callbacks
                .resolve(&token)
                .await
                .ok_or_else(|| AppError::Validation("this choice has expired, send the link again".to_string()))?,
        };
        Ok((url, callback.format))
    }

    async fn download_and_upload(
        &self,
        job: &mut Job,
        status: &StatusMessage,
        request: DownloadRequest,
    ) -> Result<(), AppError> {
        job.advance(JobState::Downloading)?;
        let feed = status.progress_feed(self.settings.progress_interval);

        let result = match self.executor.download(&request, feed.sink()).await {
            Ok(result) => result,
            Err(e) => {
                feed.finish().await;
                return Err(e.into());
            }
        };

        if let Err(e) = job.advance(JobState::Uploading) {
            uploader::cleanup(result);
            feed.finish().await;
            return Err(e.into());
        }

        let uploaded = self.uploader.upload(result, status.chat(), feed.sink()).await;
        feed.finish().await;
        uploaded?;
        Ok(())
    }

    async fn complete(&self, job: &mut Job, status: StatusMessage) -> JobReport {
        job.finish();
        status.remove().await;
        JobReport::new(job, JobOutcome::Delivered)
    }

    async fn fail(&self, job: &mut Job, status: StatusMessage, error: AppError) -> JobReport {
        log::error!("Job failed in {:?}: {}", job.state(), error);
        job.finish();
        let text = error.user_message();
        status.fail(&text, self.settings.error_linger).await;
        JobReport::new(job, JobOutcome::Failed(text))
    }

    /// Failure before any status message exists.
    fn abort(&self, job: &mut Job, error: AppError) -> JobReport {
        log::error!("Job aborted: {}", error);
        job.finish();
        JobReport::new(job, JobOutcome::Failed(error.user_message()))
    }

    /// Input rejected before a job started; replies with the reason.
    async fn reject(&self, job: &Job, chat: ChatId, reply_to: Option<MessageId>, error: AppError) -> JobReport {
        log::info!("Chat {}: rejected input: {}", chat, error);
        let text = error.user_message();
        if let Err(e) = self.relay.send_text(chat, reply_to, &text).await {
            log::warn!("Failed to send rejection to chat {}: {}", chat, e);
        }
        JobReport::new(job, JobOutcome::Failed(text))
    }

    async fn usage(&self, chat: ChatId, reply_to: Option<MessageId>, form: &str) -> JobReport {
        let text = format!("Usage: {}", form);
        if let Err(e) = self.relay.send_text(chat, reply_to, &text).await {
            log::warn!("Failed to send usage to chat {}: {}", chat, e);
        }
        JobReport::new(&Job::new(), JobOutcome::Failed(text))
    }
}
