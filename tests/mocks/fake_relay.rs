//! Recording relay
//!
//! Stands in for the Telegram transport. Attachments are read from disk like
//! a real upload would, so a missing file shows up as a failed send.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use teloxide::types::{CallbackQueryId, ChatId, InlineKeyboardButtonKind, InlineKeyboardMarkup, MessageId};

use mediarelay::telegram::relay::{Attachment, AttachmentKind, Relay, RelayError, UploadProgress};

#[derive(Debug, Clone, PartialEq)]
pub enum RelayCall {
    SendText {
        id: MessageId,
        reply_to: Option<MessageId>,
        text: String,
    },
    EditText {
        id: MessageId,
        text: String,
    },
    EditKeyboard {
        id: MessageId,
        text: String,
        keyboard: InlineKeyboardMarkup,
    },
    Delete {
        id: MessageId,
    },
    Attachment {
        attachment: Attachment,
        bytes: usize,
        /// Dimensions of the thumbnail file as it was at send time
        thumbnail_size: Option<(u32, u32)>,
    },
    AnswerCallback,
}

pub struct FakeRelay {
    calls: Mutex<Vec<RelayCall>>,
    next_id: AtomicI32,
    fail_attachments: AtomicBool,
}

impl Default for FakeRelay {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(100),
            fail_attachments: AtomicBool::new(false),
        }
    }
}

impl FakeRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attachment send is rejected after the file was read.
    pub fn failing_uploads() -> Self {
        let relay = Self::default();
        relay.fail_attachments.store(true, Ordering::SeqCst);
        relay
    }

    pub fn calls(&self) -> Vec<RelayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RelayCall::Attachment { attachment, .. } => Some(attachment),
                _ => None,
            })
            .collect()
    }

    pub fn thumbnail_sizes(&self) -> Vec<Option<(u32, u32)>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RelayCall::Attachment { thumbnail_size, .. } => Some(thumbnail_size),
                _ => None,
            })
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RelayCall::SendText { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edits_of(&self, message: MessageId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RelayCall::EditText { id, text } if id == message => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RelayCall::Delete { id } => Some(id),
                _ => None,
            })
            .collect()
    }

    /// The last keyboard shown, as rows of callback data.
    pub fn last_keyboard(&self) -> Option<(MessageId, Vec<Vec<String>>)> {
        self.calls().into_iter().rev().find_map(|c| match c {
            RelayCall::EditKeyboard { id, keyboard, .. } => Some((id, callback_data(&keyboard))),
            _ => None,
        })
    }

    fn record(&self, call: RelayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn callback_data(keyboard: &InlineKeyboardMarkup) -> Vec<Vec<String>> {
    keyboard
        .inline_keyboard
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|btn| match &btn.kind {
                    InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                    _ => None,
                })
                .collect()
        })
        .collect()
}

#[async_trait]
impl Relay for FakeRelay {
    async fn send_text(&self, _chat: ChatId, reply_to: Option<MessageId>, text: &str) -> Result<MessageId, RelayError> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.record(RelayCall::SendText {
            id,
            reply_to,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn edit_text(&self, _chat: ChatId, message: MessageId, text: &str) -> Result<(), RelayError> {
        self.record(RelayCall::EditText {
            id: message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn edit_keyboard(
        &self,
        _chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<(), RelayError> {
        self.record(RelayCall::EditKeyboard {
            id: message,
            text: text.to_string(),
            keyboard,
        });
        Ok(())
    }

    async fn delete_message(&self, _chat: ChatId, message: MessageId) -> Result<(), RelayError> {
        self.record(RelayCall::Delete { id: message });
        Ok(())
    }

    async fn send_attachment(
        &self,
        _chat: ChatId,
        attachment: &Attachment,
        progress: UploadProgress,
    ) -> Result<(), RelayError> {
        let bytes = tokio::fs::read(&attachment.path)
            .await
            .map_err(|e| RelayError::Rejected(format!("cannot read {}: {}", attachment.path.display(), e)))?;
        progress.add_bytes(bytes.len());
        let thumbnail_size = attachment.thumbnail.as_ref().map(|thumb| {
            assert!(thumb.is_file(), "thumbnail must exist while uploading");
            image::image_dimensions(thumb).unwrap()
        });
        self.record(RelayCall::Attachment {
            attachment: attachment.clone(),
            bytes: bytes.len(),
            thumbnail_size,
        });
        if self.fail_attachments.load(Ordering::SeqCst) && !matches!(attachment.kind, AttachmentKind::Document) {
            return Err(RelayError::Rejected("Request Entity Too Large".to_string()));
        }
        Ok(())
    }

    async fn answer_callback(&self, _callback: CallbackQueryId, _text: Option<&str>) -> Result<(), RelayError> {
        self.record(RelayCall::AnswerCallback);
        Ok(())
    }
}
