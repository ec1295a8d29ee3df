use crate::bot::utils::resolve_lang;
use crate::services::stars_service::StarsConfirmation;
use crate::AppState;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, PreCheckoutQuery};
use tracing::{error, info, warn};

/// Telegram requires an answer within 10 seconds or the payment fails.
/// The invoice was priced by us moments earlier, so everything that
/// reaches this point is approved; real settlement happens on the
/// successful-payment message.
pub async fn pre_checkout_handler(
    bot: Bot,
    q: PreCheckoutQuery,
) -> Result<(), teloxide::RequestError> {
    info!(
        "Pre-checkout query {} from user {}: {} {}",
        q.id, q.from.id, q.total_amount, q.currency
    );
    bot.answer_pre_checkout_query(q.id, true).await?;
    Ok(())
}

/// Settles a Stars payment. Confirmation is idempotent in the service
/// layer, so re-delivered messages fall through silently.
pub async fn successful_payment_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let Some(payment) = msg.successful_payment() else {
        return Ok(());
    };
    let user_id = msg
        .from
        .as_ref()
        .map(|u| u.id.0 as i64)
        .unwrap_or(msg.chat.id.0);
    let lang = resolve_lang(
        msg.from.as_ref().and_then(|u| u.language_code.as_deref()),
        &state.settings.default_language,
    );

    match state
        .stars
        .confirm_payment(&payment.invoice_payload, payment.total_amount as i64, user_id)
        .await
    {
        Ok(StarsConfirmation::Extended { new_expiry, .. }) => {
            let text = state.texts.tf(
                &lang,
                "payment_success",
                &[("end_date", new_expiry.format("%Y-%m-%d").to_string())],
            );
            if let Err(e) = bot
                .send_message(msg.chat.id, text)
                .parse_mode(ParseMode::Html)
                .await
            {
                warn!("Failed to send payment confirmation to {}: {}", user_id, e);
            }
        }
        Ok(StarsConfirmation::Duplicate) | Ok(StarsConfirmation::Dropped) => {}
        Err(e) => {
            error!("Stars payment settlement failed for user {}: {}", user_id, e);
            let _ = bot
                .send_message(msg.chat.id, state.texts.t(&lang, "error_try_again"))
                .await;
        }
    }

    Ok(())
}
