use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub database_url: String,
    pub panel_url: String,
    pub panel_token: String,
    pub default_language: String,
    pub currency_symbol: String,
    pub trial_enabled: bool,
    pub trial_days: i64,
    pub trial_traffic_gb: i32,
    pub trial_channel_url: Option<String>,
    pub stars_enabled: bool,
    pub crypto_pay_token: Option<String>,
    pub notify_chat_id: Option<i64>,
    /// months -> fiat price
    pub subscription_prices: BTreeMap<i32, f64>,
    /// months -> Stars price
    pub stars_prices: BTreeMap<i32, u32>,
    /// months -> duration-specific card payment link
    pub card_links: BTreeMap<i32, String>,
    pub card_link_fallback: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let panel_url =
            env::var("PANEL_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let panel_token = env::var("PANEL_TOKEN").unwrap_or_default();

        let subscription_prices: BTreeMap<i32, f64> = env::var("SUBSCRIPTION_OPTIONS")
            .map(|raw| parse_options(&raw))
            .unwrap_or_default();

        let mut card_links = BTreeMap::new();
        for months in subscription_prices.keys() {
            if let Ok(link) = env::var(format!("CARD_PAYMENT_LINK_{}", months)) {
                if !link.trim().is_empty() {
                    card_links.insert(*months, link);
                }
            }
        }

        Ok(Settings {
            bot_token,
            database_url,
            panel_url,
            panel_token,
            default_language: env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            currency_symbol: env::var("CURRENCY_SYMBOL").unwrap_or_else(|_| "₽".to_string()),
            trial_enabled: env_flag("TRIAL_ENABLED", false),
            trial_days: env_parsed("TRIAL_DURATION_DAYS", 3),
            trial_traffic_gb: env_parsed("TRIAL_TRAFFIC_LIMIT_GB", 0),
            trial_channel_url: env_opt("TRIAL_CHANNEL_URL"),
            stars_enabled: env_flag("STARS_ENABLED", false),
            crypto_pay_token: env_opt("CRYPTO_PAY_TOKEN"),
            notify_chat_id: env::var("NOTIFY_CHAT_ID").ok().and_then(|v| v.parse().ok()),
            subscription_prices,
            stars_prices: env::var("STARS_OPTIONS")
                .map(|raw| parse_options(&raw))
                .unwrap_or_default(),
            card_links,
            card_link_fallback: env_opt("CARD_PAYMENT_LINK"),
        })
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `"1:150,3:400,12:1300"` style duration maps. Malformed pairs
/// are skipped rather than failing startup.
pub fn parse_options<T: FromStr>(raw: &str) -> BTreeMap<i32, T> {
    raw.split(',')
        .filter_map(|pair| {
            let (months, value) = pair.trim().split_once(':')?;
            Some((
                months.trim().parse().ok()?,
                value.trim().parse::<T>().ok()?,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_price_pairs() {
        let opts: BTreeMap<i32, f64> = parse_options("1:150, 3:400,12:1300");
        assert_eq!(opts.len(), 3);
        assert_eq!(opts[&1], 150.0);
        assert_eq!(opts[&3], 400.0);
        assert_eq!(opts[&12], 1300.0);
    }

    #[test]
    fn skips_malformed_pairs() {
        let opts: BTreeMap<i32, u32> = parse_options("1:100,broken,abc:5,6:250:extra,:,,");
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[&1], 100);
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let opts: BTreeMap<i32, f64> = parse_options("");
        assert!(opts.is_empty());
    }
}
