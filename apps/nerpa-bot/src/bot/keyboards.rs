use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::services::pricing::{PriceQuote, PricingTable};
use crate::services::texts::Texts;

pub fn main_menu(texts: &Texts, lang: &str, show_trial: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![InlineKeyboardButton::callback(
        texts.t(lang, "btn_buy_subscription"),
        "buy_sub",
    )]];
    if show_trial {
        rows.push(vec![InlineKeyboardButton::callback(
            texts.t(lang, "btn_free_trial"),
            "trial_start",
        )]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn period_menu(
    pricing: &PricingTable,
    texts: &Texts,
    lang: &str,
    currency: &str,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = pricing
        .durations()
        .map(|(months, price)| {
            let label = texts.tf(
                lang,
                "period_label",
                &[
                    ("months", months.to_string()),
                    ("price", format_price(price)),
                    ("currency", currency.to_string()),
                ],
            );
            vec![InlineKeyboardButton::callback(label, format!("period_{}", months))]
        })
        .collect();
    rows.push(vec![back_button(texts, lang, "main_menu")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn payment_method_menu(
    quote: &PriceQuote,
    crypto_available: bool,
    stars_available: bool,
    texts: &Texts,
    lang: &str,
) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if quote.card_link.is_some() {
        rows.push(vec![InlineKeyboardButton::callback(
            texts.t(lang, "btn_pay_card"),
            format!("pay_card_{}", quote.months),
        )]);
    }
    if crypto_available {
        rows.push(vec![InlineKeyboardButton::callback(
            texts.t(lang, "btn_pay_crypto"),
            format!("pay_crypto_{}", quote.months),
        )]);
    }
    if stars_available {
        if let Some(stars) = quote.stars_price {
            rows.push(vec![InlineKeyboardButton::callback(
                texts.tf(lang, "btn_pay_stars", &[("stars", stars.to_string())]),
                format!("pay_stars_{}", quote.months),
            )]);
        }
    }
    rows.push(vec![back_button(texts, lang, "buy_sub")]);
    InlineKeyboardMarkup::new(rows)
}

/// Inline button opening an external payment page. `None` when the link
/// does not parse as a URL, so the caller can fall back to plain text.
pub fn payment_url_menu(link: &str, texts: &Texts, lang: &str) -> Option<InlineKeyboardMarkup> {
    let url = link.parse::<Url>().ok()?;
    Some(InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url(texts.t(lang, "btn_open_payment"), url)],
        vec![back_button(texts, lang, "buy_sub")],
    ]))
}

pub fn trial_prompt_menu(
    channel_url: Option<&str>,
    texts: &Texts,
    lang: &str,
) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(url) = channel_url.and_then(|u| u.parse::<Url>().ok()) {
        rows.push(vec![InlineKeyboardButton::url(texts.t(lang, "btn_trial_follow"), url)]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        texts.t(lang, "btn_trial_followed"),
        "trial_followed",
    )]);
    rows.push(vec![back_button(texts, lang, "trial_cancel")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn connect_menu(
    subscription_url: Option<&str>,
    texts: &Texts,
    lang: &str,
) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(url) = subscription_url.and_then(|u| u.parse::<Url>().ok()) {
        rows.push(vec![InlineKeyboardButton::url(texts.t(lang, "btn_connect"), url)]);
    }
    rows.push(vec![back_button(texts, lang, "main_menu")]);
    InlineKeyboardMarkup::new(rows)
}

fn back_button(texts: &Texts, lang: &str, target: &str) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(texts.t(lang, "btn_back_to_menu"), target.to_string())
}

fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{}", price as i64)
    } else {
        format!("{:.2}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_prices_render_without_decimals() {
        assert_eq!(format_price(150.0), "150");
        assert_eq!(format_price(99.5), "99.50");
    }

    #[test]
    fn unparseable_payment_link_yields_no_keyboard() {
        let texts = Texts::new().unwrap();
        assert!(payment_url_menu("not a url", &texts, "en").is_none());
        assert!(payment_url_menu("https://pay.example.com/x", &texts, "en").is_some());
    }
}
