use std::collections::HashSet;
use url::Url;

/// Builds the card-redirect URL from a donation-link template by
/// appending `telegram_user_id`, `amount` (minor currency units) and
/// `period` query parameters, each only if not already present.
/// Pre-existing parameters are preserved untouched. A template that
/// cannot be parsed or re-encoded is returned unchanged; the external
/// provider is authoritative for whatever the user then lands on.
pub fn build_card_link(template: &str, user_id: i64, price: f64, months: i32) -> String {
    let Ok(mut link) = Url::parse(template) else {
        return template.to_string();
    };

    let present: HashSet<String> = link.query_pairs().map(|(k, _)| k.into_owned()).collect();
    // Fractional minor units are not supported; truncation is the
    // documented precision boundary.
    let amount_minor = (price * 100.0) as i64;

    {
        let mut pairs = link.query_pairs_mut();
        if !present.contains("telegram_user_id") {
            pairs.append_pair("telegram_user_id", &user_id.to_string());
        }
        if !present.contains("amount") {
            pairs.append_pair("amount", &amount_minor.to_string());
        }
        if !present.contains("period") {
            pairs.append_pair("period", &months.to_string());
        }
    }

    link.to_string()
}
