//! The per-job status message.
//!
//! One message per job is edited in place as the job advances, fed by a
//! progress consumer task, and removed when the job ends.

use std::sync::Arc;
use std::time::Duration;

use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::download::progress::{ChannelSink, ProgressSnapshot, ProgressTracker};
use crate::telegram::relay::{Relay, RelayError};

/// Handle to the status message of one job.
#[derive(Clone)]
pub struct StatusMessage {
    relay: Arc<dyn Relay>,
    chat: ChatId,
    id: MessageId,
}

impl StatusMessage {
    /// Posts a new status message in reply to `reply_to`.
    pub async fn send(
        relay: Arc<dyn Relay>,
        chat: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<Self, RelayError> {
        let id = relay.send_text(chat, reply_to, text).await?;
        Ok(Self { relay, chat, id })
    }

    /// Adopts an existing message (e.g. the keyboard message of a callback).
    pub fn attach(relay: Arc<dyn Relay>, chat: ChatId, id: MessageId) -> Self {
        Self { relay, chat, id }
    }

    pub fn chat(&self) -> ChatId {
        self.chat
    }

    /// Replaces the text. Failures are logged; the status line is cosmetic.
    pub async fn set_text(&self, text: &str) {
        if let Err(e) = self.relay.edit_text(self.chat, self.id, text).await {
            log::debug!("Failed to update status message {}: {}", self.id, e);
        }
    }

    pub async fn show_keyboard(&self, text: &str, keyboard: InlineKeyboardMarkup) -> Result<(), RelayError> {
        self.relay.edit_keyboard(self.chat, self.id, text, keyboard).await
    }

    /// Starts a consumer task rendering progress snapshots into this message.
    pub fn progress_feed(&self, min_interval: Duration) -> ProgressFeed {
        let (sink, rx) = ChannelSink::channel();
        let handle = tokio::spawn(render_progress(self.clone(), rx, min_interval));
        ProgressFeed { sink, handle }
    }

    /// Deletes the message.
    pub async fn remove(self) {
        if let Err(e) = self.relay.delete_message(self.chat, self.id).await {
            log::warn!("Failed to delete status message {}: {}", self.id, e);
        }
    }

    /// Shows `text` and deletes the message after `linger`.
    ///
    /// With a non-zero linger the deletion runs in the background.
    pub async fn fail(self, text: &str, linger: Duration) {
        self.set_text(text).await;
        if linger.is_zero() {
            self.remove().await;
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(linger).await;
                self.remove().await;
            });
        }
    }
}

/// Progress channel bound to a status message.
pub struct ProgressFeed {
    sink: ChannelSink,
    handle: JoinHandle<()>,
}

impl ProgressFeed {
    pub fn sink(&self) -> &ChannelSink {
        &self.sink
    }

    /// Closes the channel and waits until the last pending edit is done.
    pub async fn finish(self) {
        drop(self.sink);
        if let Err(e) = self.handle.await {
            log::warn!("Progress task ended abnormally: {}", e);
        }
    }
}

async fn render_progress(status: StatusMessage, mut rx: mpsc::UnboundedReceiver<ProgressSnapshot>, min_interval: Duration) {
    let mut tracker = ProgressTracker::new(min_interval);
    let mut last_text = String::new();

    while let Some(first) = rx.recv().await {
        // Coalesce whatever piled up while the previous edit was in flight
        let mut shown = tracker.observe(first);
        while let Ok(next) = rx.try_recv() {
            if let Some(s) = tracker.observe(next) {
                shown = Some(s);
            }
        }
        let Some(snapshot) = shown else {
            continue;
        };
        let text = snapshot.render();
        if text != last_text {
            status.set_text(&text).await;
            last_text = text;
        }
    }
}
