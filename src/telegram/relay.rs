//! Outbound messaging transport.
//!
//! Everything the bot sends goes through the `Relay` trait so the job
//! controller can be driven against a recording fake in tests.
//! `TelegramRelay` is the production implementation over `teloxide::Bot`.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, InlineKeyboardMarkup, InputFile, MessageId, ReplyParameters};
use teloxide::RequestError;
use thiserror::Error;
use tokio::fs::File as TokioFile;
use tokio::io::{AsyncRead, ReadBuf};

use crate::core::config;
use crate::core::utils::truncate_chars;

/// Transport failure.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("telegram request failed: {0}")]
    Request(#[from] RequestError),
    /// The platform (or a fake) refused the call
    #[error("rejected: {0}")]
    Rejected(String),
}

/// How an attachment is presented in the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentKind {
    Video { width: u32, height: u32, duration: u32 },
    Audio { title: String },
    Document,
}

/// One file to send, with its presentation metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub path: PathBuf,
    pub caption: String,
    pub thumbnail: Option<PathBuf>,
}

/// Tracks the number of bytes sent during an upload operation.
///
/// Shared between the reader feeding the request body and the poller that
/// turns it into progress snapshots.
#[derive(Debug, Clone, Default)]
pub struct UploadProgress {
    bytes_sent: Arc<AtomicU64>,
}

impl UploadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }
}

/// An `AsyncRead` wrapper that counts the bytes read into an `UploadProgress`.
pub struct ProgressReader<R> {
    inner: R,
    progress: UploadProgress,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, progress: UploadProgress) -> Self {
        Self { inner, progress }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let after = buf.filled().len();
            if after > before {
                self.progress.add_bytes(after - before);
            }
        }
        poll
    }
}

/// Opens `path` as a streamed `InputFile` whose reads are counted.
pub async fn input_file_with_progress(path: &Path, progress: UploadProgress) -> Result<InputFile, RequestError> {
    let file = TokioFile::open(path)
        .await
        .map_err(|err| RequestError::Io(Arc::new(err)))?;
    let mut input_file = InputFile::read(ProgressReader::new(file, progress));
    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
        input_file = input_file.file_name(name.to_string());
    }
    Ok(input_file)
}

/// Messaging operations used by the job controller and uploader.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Sends a text message, optionally as a reply. Returns its id.
    async fn send_text(&self, chat: ChatId, reply_to: Option<MessageId>, text: &str) -> Result<MessageId, RelayError>;

    /// Replaces the text of a message, dropping any inline keyboard.
    async fn edit_text(&self, chat: ChatId, message: MessageId, text: &str) -> Result<(), RelayError>;

    /// Replaces the text of a message and attaches `keyboard`.
    async fn edit_keyboard(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<(), RelayError>;

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), RelayError>;

    /// Uploads one file. Body reads are counted into `progress`.
    async fn send_attachment(
        &self,
        chat: ChatId,
        attachment: &Attachment,
        progress: UploadProgress,
    ) -> Result<(), RelayError>;

    /// Stops the client-side spinner of a pressed button.
    async fn answer_callback(&self, callback: CallbackQueryId, text: Option<&str>) -> Result<(), RelayError>;
}

/// `Relay` over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramRelay {
    bot: Bot,
}

impl TelegramRelay {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Caption as sent; cut to Telegram's limit if a caller built a longer one.
pub(crate) fn outbound_caption(caption: &str) -> &str {
    let fitted = truncate_chars(caption, config::upload::CAPTION_LIMIT);
    if fitted.len() < caption.len() {
        log::warn!(
            "Caption of {} chars cut to {} for upload",
            caption.chars().count(),
            config::upload::CAPTION_LIMIT
        );
    }
    fitted
}

#[async_trait]
impl Relay for TelegramRelay {
    async fn send_text(&self, chat: ChatId, reply_to: Option<MessageId>, text: &str) -> Result<MessageId, RelayError> {
        let mut req = self.bot.send_message(chat, text);
        if let Some(id) = reply_to {
            req = req.reply_parameters(ReplyParameters::new(id).allow_sending_without_reply());
        }
        Ok(req.await?.id)
    }

    async fn edit_text(&self, chat: ChatId, message: MessageId, text: &str) -> Result<(), RelayError> {
        self.bot.edit_message_text(chat, message, text).await?;
        Ok(())
    }

    async fn edit_keyboard(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<(), RelayError> {
        self.bot
            .edit_message_text(chat, message, text)
            .reply_markup(keyboard)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), RelayError> {
        self.bot.delete_message(chat, message).await?;
        Ok(())
    }

    async fn send_attachment(
        &self,
        chat: ChatId,
        attachment: &Attachment,
        progress: UploadProgress,
    ) -> Result<(), RelayError> {
        let input = input_file_with_progress(&attachment.path, progress).await?;
        let caption = outbound_caption(&attachment.caption).to_string();
        log::info!("Sending {} as {:?}", attachment.path.display(), attachment.kind);

        match &attachment.kind {
            AttachmentKind::Video {
                width,
                height,
                duration,
            } => {
                let mut req = self
                    .bot
                    .send_video(chat, input)
                    .caption(caption)
                    .width(*width)
                    .height(*height)
                    .duration(*duration)
                    .supports_streaming(true);
                if let Some(thumb) = &attachment.thumbnail {
                    req = req.thumbnail(InputFile::file(thumb.clone()));
                }
                req.await?;
            }
            AttachmentKind::Audio { title } => {
                let mut req = self.bot.send_audio(chat, input).caption(caption).title(title.clone());
                if let Some(thumb) = &attachment.thumbnail {
                    req = req.thumbnail(InputFile::file(thumb.clone()));
                }
                req.await?;
            }
            AttachmentKind::Document => {
                self.bot.send_document(chat, input).caption(caption).await?;
            }
        }
        Ok(())
    }

    async fn answer_callback(&self, callback: CallbackQueryId, text: Option<&str>) -> Result<(), RelayError> {
        let mut req = self.bot.answer_callback_query(callback);
        if let Some(text) = text {
            req = req.text(text);
        }
        req.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_progress_reader_counts_bytes() {
        let progress = UploadProgress::new();
        let data: &[u8] = &[7u8; 10_000];
        let mut reader = ProgressReader::new(data, progress.clone());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 10_000);
        assert_eq!(progress.bytes_sent(), 10_000);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = input_file_with_progress(Path::new("/nonexistent/mediarelay.mp4"), UploadProgress::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RequestError::Io(_)));
    }

    #[test]
    fn test_outbound_caption_within_limit_is_untouched() {
        let caption = crate::download::build_caption("Clip", &"d".repeat(5000));
        assert_eq!(outbound_caption(&caption), caption);
    }

    #[test]
    fn test_outbound_caption_is_cut_to_limit() {
        let caption = "é".repeat(2000);
        assert_eq!(outbound_caption(&caption).chars().count(), 1024);
    }

    #[test]
    fn test_upload_progress_is_shared() {
        let a = UploadProgress::new();
        let b = a.clone();
        a.add_bytes(5);
        b.add_bytes(7);
        assert_eq!(a.bytes_sent(), 12);
    }
}
