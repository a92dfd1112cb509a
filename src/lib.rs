//! mediarelay - Telegram bot that downloads media with yt-dlp and relays it
//! back to the chat
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, process and misc utilities
//! - `download`: format resolution, the yt-dlp backend, the download executor
//!   and thumbnails
//! - `telegram`: relay transport, uploader, interaction controller and the
//!   dispatcher schema

pub mod cli;
pub mod core;
pub mod download;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError};
pub use download::{DownloadExecutor, Extractor, ScratchDir, YtDlp};
pub use telegram::{schema, JobController, Relay, TelegramRelay};
