use crate::bot::handlers::command::send_main_menu;
use crate::bot::keyboards;
use crate::bot::utils::{answer_ack, answer_alert, edit_or_send, resolve_lang};
use crate::services::pay_service::build_card_link;
use crate::services::subscription_service::{TrialGate, TrialOutcome};
use crate::AppState;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, LabeledPrice};
use tracing::{error, info, warn};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);
    let callback_id = q.id.clone();
    let user = q.from;
    let user_id = user.id.0 as i64;
    let lang = resolve_lang(
        user.language_code.as_deref(),
        &state.settings.default_language,
    );

    let Some(data) = q.data else {
        return Ok(());
    };
    let (chat_id, message_id) = match q.message.as_ref() {
        Some(msg) => (msg.chat().id, Some(msg.id())),
        None => (ChatId(user_id), None),
    };

    match data.as_str() {
        "main_menu" | "trial_cancel" => {
            answer_ack(&bot, callback_id).await;
            send_main_menu(&bot, &state, chat_id, message_id, user_id, &lang).await;
        }

        "buy_sub" => {
            if state.pricing.is_empty() {
                error!("No subscription durations configured");
                answer_alert(&bot, callback_id, &state.texts.t(&lang, "error_try_again")).await;
                return Ok(());
            }
            answer_ack(&bot, callback_id).await;
            let kb = keyboards::period_menu(
                &state.pricing,
                &state.texts,
                &lang,
                &state.settings.currency_symbol,
            );
            edit_or_send(
                &bot,
                chat_id,
                message_id,
                &state.texts.t(&lang, "choose_period"),
                Some(kb),
            )
            .await;
        }

        p if p.starts_with("period_") => {
            let months: i32 = p.strip_prefix("period_").unwrap_or("0").parse().unwrap_or(0);
            let Some(quote) = state.pricing.quote(months) else {
                error!("Callback for unknown duration: {}", data);
                answer_alert(&bot, callback_id, &state.texts.t(&lang, "error_try_again")).await;
                return Ok(());
            };
            answer_ack(&bot, callback_id).await;
            let kb = keyboards::payment_method_menu(
                &quote,
                state.crypto.configured(),
                state.stars.enabled(),
                &state.texts,
                &lang,
            );
            edit_or_send(
                &bot,
                chat_id,
                message_id,
                &state.texts.t(&lang, "choose_payment_method"),
                Some(kb),
            )
            .await;
        }

        p if p.starts_with("pay_card_") => {
            let months: i32 = p.strip_prefix("pay_card_").unwrap_or("0").parse().unwrap_or(0);
            let Some(quote) = state.pricing.quote(months) else {
                error!("Card payment callback for unknown duration: {}", data);
                answer_alert(&bot, callback_id, &state.texts.t(&lang, "error_try_again")).await;
                return Ok(());
            };
            let Some(template) = quote.card_link.as_deref() else {
                answer_alert(
                    &bot,
                    callback_id,
                    &state.texts.t(&lang, "payment_service_unavailable"),
                )
                .await;
                return Ok(());
            };

            let link = build_card_link(template, user_id, quote.price, months);
            answer_ack(&bot, callback_id).await;
            let instructions = state.texts.t(&lang, "card_payment_instructions");
            match keyboards::payment_url_menu(&link, &state.texts, &lang) {
                Some(kb) => {
                    edit_or_send(&bot, chat_id, message_id, &instructions, Some(kb)).await;
                }
                None => {
                    // Operator put something non-URL into the template;
                    // show it inline rather than losing the payment.
                    warn!("Card payment link is not a valid URL: {}", link);
                    let text = format!("{}\n\n{}", instructions, link);
                    edit_or_send(&bot, chat_id, message_id, &text, None).await;
                }
            }
        }

        p if p.starts_with("pay_crypto_") => {
            if !state.crypto.configured() {
                answer_alert(
                    &bot,
                    callback_id,
                    &state.texts.t(&lang, "payment_service_unavailable"),
                )
                .await;
                return Ok(());
            }
            let months: i32 = p.strip_prefix("pay_crypto_").unwrap_or("0").parse().unwrap_or(0);
            let Some(quote) = state.pricing.quote(months) else {
                error!("Crypto payment callback for unknown duration: {}", data);
                answer_alert(&bot, callback_id, &state.texts.t(&lang, "error_try_again")).await;
                return Ok(());
            };

            let description = state.texts.tf(
                &lang,
                "payment_description",
                &[("months", months.to_string())],
            );
            match state
                .crypto
                .create_invoice(user_id, months, quote.price, &description)
                .await
            {
                Ok(url) => {
                    answer_ack(&bot, callback_id).await;
                    let text = state.texts.tf(
                        &lang,
                        "payment_link_message",
                        &[("months", months.to_string())],
                    );
                    match keyboards::payment_url_menu(&url, &state.texts, &lang) {
                        Some(kb) => edit_or_send(&bot, chat_id, message_id, &text, Some(kb)).await,
                        None => {
                            warn!("Provider returned a non-URL invoice link: {}", url);
                            let text = format!("{}\n\n{}", text, url);
                            edit_or_send(&bot, chat_id, message_id, &text, None).await;
                        }
                    }
                }
                Err(e) => {
                    error!("Crypto invoice creation failed for user {}: {}", user_id, e);
                    answer_alert(
                        &bot,
                        callback_id,
                        &state.texts.t(&lang, "error_payment_gateway"),
                    )
                    .await;
                }
            }
        }

        p if p.starts_with("pay_stars_") => {
            if !state.stars.enabled() {
                answer_alert(
                    &bot,
                    callback_id,
                    &state.texts.t(&lang, "payment_service_unavailable"),
                )
                .await;
                return Ok(());
            }
            let months: i32 = p.strip_prefix("pay_stars_").unwrap_or("0").parse().unwrap_or(0);
            let stars_price = state.pricing.quote(months).and_then(|q| q.stars_price);
            let Some(stars_price) = stars_price else {
                error!("Stars payment callback without a stars price: {}", data);
                answer_alert(&bot, callback_id, &state.texts.t(&lang, "error_try_again")).await;
                return Ok(());
            };

            match state.stars.create_invoice(user_id, months, stars_price).await {
                Ok(invoice) => {
                    answer_ack(&bot, callback_id).await;
                    let description = state.texts.tf(
                        &lang,
                        "payment_description",
                        &[("months", months.to_string())],
                    );
                    let prices = vec![LabeledPrice {
                        label: description.clone(),
                        amount: stars_price,
                    }];
                    if let Err(e) = bot
                        .send_invoice(
                            chat_id,
                            state.texts.t(&lang, "stars_invoice_title"),
                            description,
                            invoice.payload,
                            "XTR",
                            prices,
                        )
                        .await
                    {
                        error!(
                            "Failed to send stars invoice (intent {}): {}",
                            invoice.intent_id, e
                        );
                    }
                }
                Err(e) => {
                    error!("Stars invoice creation failed for user {}: {}", user_id, e);
                    answer_alert(
                        &bot,
                        callback_id,
                        &state.texts.t(&lang, "error_payment_gateway"),
                    )
                    .await;
                }
            }
        }

        "trial_start" => match state.subs.trial_gate(user_id).await {
            Ok(TrialGate::Eligible) => {
                answer_ack(&bot, callback_id).await;
                let kb = keyboards::trial_prompt_menu(
                    state.settings.trial_channel_url.as_deref(),
                    &state.texts,
                    &lang,
                );
                edit_or_send(
                    &bot,
                    chat_id,
                    message_id,
                    &state.texts.t(&lang, "trial_follow_prompt"),
                    Some(kb),
                )
                .await;
            }
            Ok(TrialGate::Disabled) => {
                answer_alert(&bot, callback_id, &state.texts.t(&lang, "trial_disabled")).await;
            }
            Ok(TrialGate::AlreadyHad) => {
                answer_alert(&bot, callback_id, &state.texts.t(&lang, "trial_already_had")).await;
            }
            Err(e) => {
                error!("Trial gate check failed for user {}: {}", user_id, e);
                answer_alert(&bot, callback_id, &state.texts.t(&lang, "error_try_again")).await;
            }
        },

        "trial_followed" => match state.subs.activate_trial(user_id).await {
            Ok(TrialOutcome::Activated {
                end_date,
                subscription_url,
                traffic_gb,
                days,
            }) => {
                answer_alert(
                    &bot,
                    callback_id,
                    &state.texts.t(&lang, "trial_activated_alert"),
                )
                .await;
                let traffic = if traffic_gb > 0 {
                    format!("{} GB", traffic_gb)
                } else {
                    state.texts.t(&lang, "traffic_unlimited")
                };
                let config_link = subscription_url
                    .clone()
                    .unwrap_or_else(|| state.texts.t(&lang, "config_link_not_available"));
                let text = state.texts.tf(
                    &lang,
                    "trial_activated_details",
                    &[
                        ("days", days.to_string()),
                        ("end_date", end_date.format("%Y-%m-%d").to_string()),
                        ("traffic", traffic),
                        ("config_link", config_link),
                    ],
                );
                let kb = keyboards::connect_menu(subscription_url.as_deref(), &state.texts, &lang);
                edit_or_send(&bot, chat_id, message_id, &text, Some(kb)).await;
            }
            Ok(TrialOutcome::Rejected(gate)) => {
                let key = match gate {
                    TrialGate::Disabled => "trial_disabled",
                    _ => "trial_already_had",
                };
                answer_alert(&bot, callback_id, &state.texts.t(&lang, key)).await;
                send_main_menu(&bot, &state, chat_id, message_id, user_id, &lang).await;
            }
            Err(e) => {
                error!("Trial activation failed for user {}: {}", user_id, e);
                answer_alert(&bot, callback_id, &state.texts.t(&lang, "error_try_again")).await;
            }
        },

        _ => {
            answer_ack(&bot, callback_id).await;
        }
    }

    Ok(())
}
