use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, ChatId, InlineKeyboardMarkup, MessageId, ParseMode};
use tracing::{debug, error, warn};

/// Picks a supported locale from Telegram's language hint. Anything
/// outside the shipped catalogs collapses to English.
pub fn resolve_lang(code: Option<&str>, default: &str) -> String {
    match code {
        Some(c) if c.to_ascii_lowercase().starts_with("ru") => "ru".to_string(),
        Some(_) => "en".to_string(),
        None => default.to_string(),
    }
}

/// Edits the originating message in place when possible, otherwise
/// sends a fresh one. Callback flows always come from a message we
/// posted, but the message may be too old or already gone.
pub async fn edit_or_send(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    text: &str,
    markup: Option<InlineKeyboardMarkup>,
) {
    if let Some(id) = message_id {
        let mut req = bot.edit_message_text(chat_id, id, text).parse_mode(ParseMode::Html);
        if let Some(kb) = markup.clone() {
            req = req.reply_markup(kb);
        }
        match req.await {
            Ok(_) => return,
            Err(e) => warn!("Edit of message {} failed: {}. Sending a new one.", id.0, e),
        }
    }

    let mut req = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
    if let Some(kb) = markup {
        req = req.reply_markup(kb);
    }
    if let Err(e) = req.await {
        error!("Failed to send message to chat {}: {}", chat_id, e);
    }
}

/// Silent acknowledgement that stops the client's loading spinner.
pub async fn answer_ack(bot: &Bot, callback_id: CallbackQueryId) {
    if let Err(e) = bot.answer_callback_query(callback_id).await {
        debug!("Failed to answer callback query: {}", e);
    }
}

/// Modal popup on the user's screen; used for rejections and errors.
pub async fn answer_alert(bot: &Bot, callback_id: CallbackQueryId, text: &str) {
    if let Err(e) = bot
        .answer_callback_query(callback_id)
        .text(text)
        .show_alert(true)
        .await
    {
        warn!("Failed to show callback alert: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_resolution_prefers_supported_locales() {
        assert_eq!(resolve_lang(Some("ru"), "en"), "ru");
        assert_eq!(resolve_lang(Some("ru-RU"), "en"), "ru");
        assert_eq!(resolve_lang(Some("de"), "ru"), "en");
        assert_eq!(resolve_lang(None, "ru"), "ru");
    }
}
