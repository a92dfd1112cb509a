//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Backend and scratch directory checks logged at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    // teloxide and reqwest are chatty at info level
    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(LevelFilter::Info, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Info, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the runtime configuration the bot was started with
///
/// Never logs the bot token itself, only whether one is present.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Startup configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("yt-dlp binary: {}", *config::YTDL_BIN);

    let scratch = Path::new(config::SCRATCH_DIR.as_str());
    match scratch.canonicalize() {
        Ok(abs) => log::info!("Scratch directory: {}", abs.display()),
        Err(_) => log::warn!("Scratch directory: {} (not created yet)", scratch.display()),
    }

    if config::BOT_TOKEN.is_empty() {
        log::error!("BOT_TOKEN / TELOXIDE_TOKEN: not set");
    } else {
        log::info!("BOT_TOKEN: set");
    }

    match config::BOT_API_URL.as_deref() {
        Some(url) => log::info!("Bot API server: {}", url),
        None => log::info!("Bot API server: api.telegram.org"),
    }

    log::info!(
        "Upload cap: {:.2} GiB",
        *config::upload::MAX_UPLOAD_BYTES as f64 / (1024.0 * 1024.0 * 1024.0)
    );
}
