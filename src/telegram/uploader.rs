//! Relay uploader: delivers a finished download and always cleans up after it.

use std::sync::Arc;
use std::time::Duration;

use teloxide::types::ChatId;
use thiserror::Error;

use crate::core::config;
use crate::core::utils::{format_bytes, remove_file_if_exists};
use crate::download::executor::{DownloadResult, MediaKind};
use crate::download::progress::{Phase, ProgressSink, ProgressSnapshot};
use crate::telegram::relay::{Attachment, AttachmentKind, Relay, RelayError, UploadProgress};

/// Failure while relaying a result to the chat.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file is {} which exceeds the {} limit", format_bytes(*size), format_bytes(*limit))]
    FileTooLarge { size: u64, limit: u64 },
    #[error(transparent)]
    Transport(#[from] RelayError),
    #[error("cannot read output file: {0}")]
    Io(#[from] std::io::Error),
}

/// Sends download results through a `Relay`.
#[derive(Clone)]
pub struct RelayUploader {
    relay: Arc<dyn Relay>,
    max_bytes: u64,
    poll_interval: Duration,
}

impl RelayUploader {
    pub fn new(relay: Arc<dyn Relay>, max_bytes: u64, poll_interval: Duration) -> Self {
        Self {
            relay,
            max_bytes,
            poll_interval,
        }
    }

    /// Uploader with the configured platform cap and poll interval.
    pub fn from_config(relay: Arc<dyn Relay>) -> Self {
        Self::new(
            relay,
            *config::upload::MAX_UPLOAD_BYTES,
            config::progress::upload_poll_interval(),
        )
    }

    /// Sends `result` to `chat`, then removes every file it references and
    /// its job directory, whether or not the send succeeded.
    pub async fn upload(
        &self,
        result: DownloadResult,
        chat: ChatId,
        sink: &dyn ProgressSink,
    ) -> Result<(), UploadError> {
        let outcome = self.send_all(&result, chat, sink).await;
        if let Err(e) = &outcome {
            log::error!("Upload of {} failed: {}", result.file_path.display(), e);
        }
        cleanup(result);
        outcome
    }

    async fn send_all(&self, result: &DownloadResult, chat: ChatId, sink: &dyn ProgressSink) -> Result<(), UploadError> {
        let size = tokio::fs::metadata(&result.file_path).await?.len();
        if size > self.max_bytes {
            return Err(UploadError::FileTooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        let kind = match result.kind {
            MediaKind::Video => AttachmentKind::Video {
                width: config::upload::PLACEHOLDER_WIDTH,
                height: config::upload::PLACEHOLDER_HEIGHT,
                duration: 0,
            },
            MediaKind::Audio => AttachmentKind::Audio {
                title: result.title.clone(),
            },
        };
        let media = Attachment {
            kind,
            path: result.file_path.clone(),
            caption: result.caption.clone(),
            thumbnail: result.thumbnail.clone(),
        };
        log::info!("Uploading {} ({}) to chat {}", media.path.display(), format_bytes(size), chat);
        self.send_with_progress(chat, &media, size, sink).await?;

        for sub in &result.subtitles {
            let doc = Attachment {
                kind: AttachmentKind::Document,
                path: sub.path.clone(),
                caption: format!("📝 {} [{}]", result.title, sub.lang),
                thumbnail: None,
            };
            // The media itself already arrived; a missing subtitle is not a failed job
            if let Err(e) = self.relay.send_attachment(chat, &doc, UploadProgress::new()).await {
                log::warn!("Failed to send {} subtitles: {}", sub.lang, e);
            }
        }
        Ok(())
    }

    /// Runs one send while a poller samples the byte counter into `sink`.
    async fn send_with_progress(
        &self,
        chat: ChatId,
        attachment: &Attachment,
        size: u64,
        sink: &dyn ProgressSink,
    ) -> Result<(), RelayError> {
        let progress = UploadProgress::new();
        let send = self.relay.send_attachment(chat, attachment, progress.clone());
        tokio::pin!(send);

        sink.report(ProgressSnapshot::new(0, Some(size), Phase::Uploading));
        let mut ticker = tokio::time::interval(self.poll_interval.max(Duration::from_millis(1)));
        ticker.tick().await;

        loop {
            tokio::select! {
                res = &mut send => {
                    if res.is_ok() {
                        sink.report(ProgressSnapshot::new(size, Some(size), Phase::Uploading));
                    }
                    return res;
                }
                _ = ticker.tick() => {
                    let sent = progress.bytes_sent().min(size);
                    sink.report(ProgressSnapshot::new(sent, Some(size), Phase::Uploading));
                }
            }
        }
    }
}

/// Removes every path referenced by `result`, then its job directory.
/// Absent files are skipped silently.
pub fn cleanup(result: DownloadResult) {
    for path in result.files() {
        match remove_file_if_exists(&path) {
            Ok(true) => log::debug!("Removed {}", path.display()),
            Ok(false) => {}
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    let id = result.job_dir.id().to_string();
    if let Err(e) = result.job_dir.remove() {
        log::warn!("Failed to remove job directory {}: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_too_large_message() {
        let err = UploadError::FileTooLarge {
            size: 3 * 1024 * 1024 * 1024,
            limit: 2 * 1024 * 1024 * 1024,
        };
        assert_eq!(err.to_string(), "file is 3.00 GB which exceeds the 2.00 GB limit");
    }

    #[test]
    fn test_relay_error_converts() {
        let err: UploadError = RelayError::Rejected("nope".into()).into();
        assert!(matches!(err, UploadError::Transport(_)));
    }
}
