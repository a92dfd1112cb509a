use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot
/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Scratch root for in-flight job artifacts
/// Read from SCRATCH_DIR environment variable
/// Default: downloads (relative to the working directory)
/// Supports tilde (~) expansion for home directory
pub static SCRATCH_DIR: Lazy<String> = Lazy::new(|| {
    let raw = env::var("SCRATCH_DIR").unwrap_or_else(|_| "downloads".to_string());
    shellexpand::tilde(&raw).into_owned()
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: mediarelay.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "mediarelay.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server URL (e.g. a local telegram-bot-api instance)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok().filter(|s| !s.is_empty()));

/// Extraction backend (yt-dlp) options shared by every invocation
pub mod ytdlp {
    use super::Duration;

    /// Socket timeout passed to yt-dlp (`--socket-timeout`, seconds)
    pub const SOCKET_TIMEOUT_SECS: u64 = 10;

    /// Retry budget for whole requests (`--retries`)
    pub const RETRIES: u32 = 3;

    /// Retry budget for fragmented streams (`--fragment-retries`)
    pub const FRAGMENT_RETRIES: u32 = 5;

    /// Outer timeout for a metadata probe; yt-dlp can hang on dead hosts
    pub const PROBE_TIMEOUT_SECS: u64 = 60;

    /// Subtitle languages fetched alongside a video, when available
    pub const SUBTITLE_LANGS: &[&str] = &["en", "es", "fr"];

    /// Default format selector when the user did not pick one
    pub const DEFAULT_VIDEO_FORMAT: &str = "bv+ba/best";

    /// Container every video is normalized to
    pub const VIDEO_CONTAINER: &str = "mp4";

    /// Container every audio-only job is normalized to
    pub const AUDIO_CODEC: &str = "mp3";

    /// Probe timeout duration
    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }
}

/// Quality selection keyboard
pub mod keyboard {
    /// Buttons per row
    pub const COLUMNS: usize = 3;

    /// Maximum number of format buttons (the "best quality" button is extra)
    pub const MAX_FORMAT_BUTTONS: usize = 10;

    /// Telegram rejects callback data longer than this (bytes)
    pub const MAX_CALLBACK_DATA_BYTES: usize = 64;
}

/// Callback URL cache (long URLs that do not fit into callback data)
pub mod callback_cache {
    use super::Duration;

    /// How long a pending quality choice stays resolvable
    pub const TTL_SECS: u64 = 3600;

    pub fn ttl() -> Duration {
        Duration::from_secs(TTL_SECS)
    }
}

/// Upload configuration
pub mod upload {
    use once_cell::sync::Lazy;
    use std::env;

    /// Platform cap for outbound files, 2 GiB (local Bot API server limit)
    pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

    /// Maximum outbound file size
    /// Read from MAX_UPLOAD_BYTES environment variable
    pub static MAX_UPLOAD_BYTES: Lazy<u64> = Lazy::new(|| {
        env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
    });

    /// Description length kept in captions (characters)
    pub const CAPTION_DESCRIPTION_LIMIT: usize = 1024;

    /// Telegram rejects captions longer than this (characters)
    pub const CAPTION_LIMIT: usize = 1024;

    /// Declared video dimensions when the real ones are not probed
    pub const PLACEHOLDER_WIDTH: u32 = 1920;
    pub const PLACEHOLDER_HEIGHT: u32 = 1080;
}

/// Thumbnail configuration
pub mod thumbnail {
    use super::Duration;

    /// Neither side of a thumbnail may exceed this many pixels
    pub const MAX_DIMENSION: u32 = 320;

    /// Timeout for fetching the thumbnail image
    pub const FETCH_TIMEOUT_SECS: u64 = 15;

    pub fn fetch_timeout() -> Duration {
        Duration::from_secs(FETCH_TIMEOUT_SECS)
    }
}

/// Status message progress updates
pub mod progress {
    use super::Duration;

    /// Minimum interval between two edits of the same status message (milliseconds)
    /// Telegram throttles edits; faster updates only produce 429s
    pub const UPDATE_INTERVAL_MS: u64 = 1500;

    /// How often the upload byte counter is sampled (milliseconds)
    pub const UPLOAD_POLL_INTERVAL_MS: u64 = 500;

    /// How long an error text stays visible before the status message is removed (seconds)
    pub const ERROR_LINGER_SECS: u64 = 30;

    pub fn update_interval() -> Duration {
        Duration::from_millis(UPDATE_INTERVAL_MS)
    }

    pub fn upload_poll_interval() -> Duration {
        Duration::from_millis(UPLOAD_POLL_INTERVAL_MS)
    }

    pub fn error_linger() -> Duration {
        Duration::from_secs(ERROR_LINGER_SECS)
    }
}

/// Playlist configuration
pub mod playlist {
    /// Maximum number of entries relayed from one playlist
    pub const MAX_ITEMS: usize = 50;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    /// Large uploads through a local Bot API server take minutes
    pub const REQUEST_TIMEOUT_SECS: u64 = 900; // 15 minutes

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
