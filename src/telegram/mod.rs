//! Telegram bot integration and handlers

pub mod bot;
pub mod cache;
pub mod controller;
pub mod handlers;
pub mod job;
pub mod keyboard;
pub mod relay;
pub mod status;
pub mod uploader;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use cache::CallbackUrlCache;
pub use controller::{ControllerSettings, JobController, JobOutcome, JobReport};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use job::{Job, JobState};
pub use relay::{Attachment, AttachmentKind, Relay, RelayError, TelegramRelay, UploadProgress};
pub use uploader::{RelayUploader, UploadError};
