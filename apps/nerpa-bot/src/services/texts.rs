use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

static EN: &str = include_str!("../../locales/en.json");
static RU: &str = include_str!("../../locales/ru.json");

/// Embedded string catalogs. Lookup never fails: a missing language
/// falls back to English, a missing key falls back to the key itself,
/// so a catalog hole shows up in chat instead of breaking the flow.
pub struct Texts {
    catalogs: HashMap<String, HashMap<String, String>>,
}

impl Texts {
    pub fn new() -> Result<Self> {
        let mut catalogs = HashMap::new();
        catalogs.insert("en".to_string(), parse_catalog(EN).context("Bad en catalog")?);
        catalogs.insert("ru".to_string(), parse_catalog(RU).context("Bad ru catalog")?);
        Ok(Self { catalogs })
    }

    pub fn t(&self, lang: &str, key: &str) -> String {
        if let Some(text) = self.catalogs.get(lang).and_then(|c| c.get(key)) {
            return text.clone();
        }
        if let Some(text) = self.catalogs.get("en").and_then(|c| c.get(key)) {
            return text.clone();
        }
        warn!("Missing text key {:?} for language {:?}", key, lang);
        key.to_string()
    }

    /// Lookup with `{placeholder}` substitution.
    pub fn tf(&self, lang: &str, key: &str, args: &[(&str, String)]) -> String {
        let mut text = self.t(lang, key);
        for (name, value) in args {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }
}

fn parse_catalog(raw: &str) -> Result<HashMap<String, String>> {
    let value: Value = serde_json::from_str(raw)?;
    let map = value
        .as_object()
        .context("Catalog root must be an object")?;
    Ok(map
        .iter()
        .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_resolve_in_both_languages() {
        let texts = Texts::new().unwrap();
        assert_ne!(texts.t("en", "error_try_again"), "error_try_again");
        assert_ne!(texts.t("ru", "error_try_again"), "error_try_again");
        assert_ne!(texts.t("en", "error_try_again"), texts.t("ru", "error_try_again"));
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let texts = Texts::new().unwrap();
        assert_eq!(texts.t("de", "error_try_again"), texts.t("en", "error_try_again"));
    }

    #[test]
    fn unknown_key_falls_back_to_the_key_itself() {
        let texts = Texts::new().unwrap();
        assert_eq!(texts.t("en", "no_such_key"), "no_such_key");
    }

    #[test]
    fn placeholders_are_substituted() {
        let texts = Texts::new().unwrap();
        let msg = texts.tf(
            "en",
            "payment_success",
            &[("end_date", "2026-01-01".to_string())],
        );
        assert!(msg.contains("2026-01-01"));
        assert!(!msg.contains("{end_date}"));
    }
}
