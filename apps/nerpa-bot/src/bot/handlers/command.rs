use crate::bot::handlers::payment;
use crate::bot::keyboards;
use crate::bot::utils::{edit_or_send, resolve_lang};
use crate::services::subscription_service::TrialGate;
use crate::AppState;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use tracing::{error, info, warn};

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    if msg.successful_payment().is_some() {
        return payment::successful_payment_handler(bot, msg, state).await;
    }

    info!("Received message: {:?}", msg.text());
    let user_id = msg
        .from
        .as_ref()
        .map(|u| u.id.0 as i64)
        .unwrap_or(msg.chat.id.0);
    let lang = resolve_lang(
        msg.from.as_ref().and_then(|u| u.language_code.as_deref()),
        &state.settings.default_language,
    );

    if let Some(text) = msg.text() {
        if text.starts_with("/start") {
            let username = msg.from.as_ref().and_then(|u| u.username.as_deref());
            if let Err(e) = state.ledger.upsert_user(user_id, username, Some(&lang)).await {
                error!("Failed to upsert user {}: {}", user_id, e);
            }
            send_main_menu(&bot, &state, msg.chat.id, None, user_id, &lang).await;
        }
    }

    Ok(())
}

/// Main menu, shared by /start and the back buttons. Shows the active
/// subscription line when one exists and the trial entry only while
/// the user is still eligible.
pub async fn send_main_menu(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    user_id: i64,
    lang: &str,
) {
    let show_trial = match state.subs.trial_gate(user_id).await {
        Ok(gate) => gate == TrialGate::Eligible,
        Err(e) => {
            warn!("Trial gate check failed for user {}: {}", user_id, e);
            false
        }
    };

    let mut text = state.texts.t(lang, "main_menu_title");
    match state.subs.active_subscription(user_id).await {
        Ok(Some(sub)) => {
            text.push_str("\n\n");
            text.push_str(&state.texts.tf(
                lang,
                "subscription_active_line",
                &[("end_date", sub.expires_at.format("%Y-%m-%d").to_string())],
            ));
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to load subscription for user {}: {}", user_id, e),
    }

    let kb = keyboards::main_menu(&state.texts, lang, show_trial);
    edit_or_send(bot, chat_id, message_id, &text, Some(kb)).await;
}
