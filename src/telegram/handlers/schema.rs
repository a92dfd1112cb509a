//! Dispatcher schema and handler chain builders
//!
//! Every endpoint hands the job to its own task and returns immediately, so a
//! long download never holds up later updates from the same chat.

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{HandlerDeps, HandlerError};
use crate::core::utils::looks_like_url;
use crate::telegram::bot::Command;
use crate::telegram::controller::{JobOutcome, JobReport};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Commands are matched first, then bare links, then quality button presses.
/// Any other text is ignored.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler(deps.clone()))
        .branch(link_handler(deps.clone()))
        .branch(callback_handler(deps))
}

fn log_report(kind: &str, chat: ChatId, report: &JobReport) {
    match &report.outcome {
        JobOutcome::Failed(reason) => log::warn!("{} job in chat {} failed: {} ({:?})", kind, chat, reason, report.visited),
        outcome => log::info!("{} job in chat {} ended: {:?} ({:?})", kind, chat, outcome, report.visited),
    }
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command {:?} from chat {}", cmd, msg.chat.id);
                let chat = msg.chat.id;
                let reply_to = Some(msg.id);
                let controller = deps.controller;

                tokio::spawn(async move {
                    let report = match cmd {
                        Command::Start | Command::Help => {
                            controller.handle_help(chat).await;
                            return;
                        }
                        Command::Video(arg) => controller.handle_video_command(chat, reply_to, &arg).await,
                        Command::Audio(arg) => controller.handle_audio(chat, reply_to, &arg).await,
                        Command::Playlist(arg) => controller.handle_playlist(chat, reply_to, &arg).await,
                    };
                    log_report("command", chat, &report);
                });
                Ok(())
            }
        },
    ))
}

fn link_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(looks_like_url).unwrap_or(false))
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                let text = msg.text().unwrap_or_default().trim().to_string();
                let chat = msg.chat.id;
                let reply_to = Some(msg.id);
                let controller = deps.controller;

                tokio::spawn(async move {
                    let report = controller.handle_url(chat, reply_to, &text).await;
                    log_report("link", chat, &report);
                });
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let controller = deps.controller;
            if let Err(e) = controller.relay().answer_callback(q.id.clone(), None).await {
                log::debug!("Failed to answer callback query: {}", e);
            }

            let Some(data) = q.data.clone() else {
                return Ok(());
            };
            let Some((chat, message)) = q.message.as_ref().map(|m| (m.chat().id, m.id())) else {
                log::warn!("Callback without an accessible message, ignoring");
                return Ok(());
            };

            tokio::spawn(async move {
                let report = controller.handle_callback(chat, message, &data).await;
                log_report("callback", chat, &report);
            });
            Ok(())
        }
    })
}
