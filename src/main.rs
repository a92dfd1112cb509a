use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;

use mediarelay::cli::{Cli, Commands};
use mediarelay::core::utils::parse_media_url;
use mediarelay::core::{config, init_logger, log_startup_configuration};
use mediarelay::download::{formats, DownloadExecutor, ScratchDir, ThumbnailProcessor, YtDlp};
use mediarelay::telegram::{
    create_bot, schema, setup_bot_commands, CallbackUrlCache, ControllerSettings, HandlerDeps, JobController,
    RelayUploader, TelegramRelay,
};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, scratch directory, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be populated
    let _ = dotenv();

    let cli = Cli::parse_args();
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command() {
        Commands::Run => run_bot().await,
        Commands::Formats { url } => print_formats(url).await,
        Commands::CheckBackend => check_backend().await,
    }
}

async fn run_bot() -> Result<()> {
    log_startup_configuration();

    let scratch = ScratchDir::from_config();
    scratch
        .ensure()
        .map_err(|e| anyhow::anyhow!("Cannot create scratch directory {}: {}", scratch.root().display(), e))?;

    let ytdlp = YtDlp::default();
    match ytdlp.version().await {
        Ok(version) => log::info!("Using {} {}", ytdlp.bin(), version),
        Err(e) => log::warn!("{} is not usable yet: {}", ytdlp.bin(), e),
    }

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let relay = Arc::new(TelegramRelay::new(bot.clone()));
    let executor = DownloadExecutor::new(Arc::new(ytdlp), ThumbnailProcessor::default(), scratch);
    let uploader = RelayUploader::from_config(relay.clone());
    let controller = JobController::new(
        relay,
        executor,
        uploader,
        CallbackUrlCache::default(),
        ControllerSettings::default(),
    );

    log::info!("Starting dispatcher");
    Dispatcher::builder(bot, schema(HandlerDeps::new(Arc::new(controller))))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

async fn print_formats(raw_url: &str) -> Result<()> {
    let url = parse_media_url(raw_url)?;
    let ytdlp = YtDlp::default();
    let catalog = formats::resolve(&ytdlp, &url).await?;

    if catalog.is_empty() {
        println!("No selectable formats; the best available one would be downloaded.");
        return Ok(());
    }
    for f in &catalog.formats {
        println!("{:<12} {}", f.id, f.label());
    }
    if !catalog.needs_choice() {
        println!("Only one selectable format; no choice would be offered.");
    }
    Ok(())
}

async fn check_backend() -> Result<()> {
    let ytdlp = YtDlp::default();
    let version = ytdlp.version().await?;
    println!("{} {}", ytdlp.bin(), version);
    Ok(())
}
