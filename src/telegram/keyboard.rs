//! Quality selection keyboard and its callback payload.
//!
//! Payload layout: `<url or #token>|<format id or "best">`. The payload is
//! split on the last `|`, so a URL containing `|` still parses.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::config::keyboard::{COLUMNS, MAX_CALLBACK_DATA_BYTES, MAX_FORMAT_BUTTONS};
use crate::download::formats::Catalog;
use crate::download::request::{FormatChoice, BEST_SENTINEL};
use crate::telegram::cache::TOKEN_PREFIX;

pub const SKIP_BUTTON_LABEL: &str = "⏩ Skip (Best Quality)";

/// How the URL is carried in a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlRef {
    /// The URL itself
    Inline(String),
    /// Token into the callback URL cache (without the prefix)
    Token(String),
}

/// Decoded callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCallback {
    pub url: UrlRef,
    pub format: FormatChoice,
}

pub fn encode_callback(url_ref: &str, format: &str) -> String {
    format!("{}|{}", url_ref, format)
}

/// Parses a payload; `None` for data that is not ours.
pub fn parse_callback(data: &str) -> Option<FormatCallback> {
    let (url, format) = data.rsplit_once('|')?;
    if url.is_empty() {
        return None;
    }
    let url = match url.strip_prefix(TOKEN_PREFIX) {
        Some(token) if !token.is_empty() => UrlRef::Token(token.to_string()),
        Some(_) => return None,
        None => UrlRef::Inline(url.to_string()),
    };
    Some(FormatCallback {
        url,
        format: FormatChoice::parse(format),
    })
}

/// True when every button of the keyboard can carry `url` inline.
pub fn fits_inline(url: &str, catalog: &Catalog) -> bool {
    catalog
        .formats
        .iter()
        .take(MAX_FORMAT_BUTTONS)
        .map(|f| f.id.as_str())
        .chain(std::iter::once(BEST_SENTINEL))
        .all(|id| encode_callback(url, id).len() <= MAX_CALLBACK_DATA_BYTES)
}

/// Button grid: up to 10 formats, 3 per row, then the skip button on its
/// own row.
///
/// Formats whose payload would still exceed the platform limit are left
/// out.
pub fn build_format_keyboard(url_ref: &str, catalog: &Catalog) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = catalog
        .formats
        .iter()
        .take(MAX_FORMAT_BUTTONS)
        .filter_map(|f| {
            let data = encode_callback(url_ref, &f.id);
            if data.len() > MAX_CALLBACK_DATA_BYTES {
                log::warn!("Format {} does not fit into callback data, skipping", f.id);
                return None;
            }
            Some(InlineKeyboardButton::callback(f.label(), data))
        })
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> = buttons.chunks(COLUMNS).map(|row| row.to_vec()).collect();
    rows.push(vec![InlineKeyboardButton::callback(
        SKIP_BUTTON_LABEL,
        encode_callback(url_ref, BEST_SENTINEL),
    )]);

    InlineKeyboardMarkup::new(rows)
}
