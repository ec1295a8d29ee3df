use std::collections::BTreeMap;

use crate::config::Settings;

/// Resolved price for one subscription duration. Derived at request
/// time from static configuration, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub months: i32,
    pub price: f64,
    pub stars_price: Option<u32>,
    /// Card donation-link template; the duration-specific link wins
    /// over the global fallback.
    pub card_link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: BTreeMap<i32, f64>,
    stars: BTreeMap<i32, u32>,
    card_links: BTreeMap<i32, String>,
    card_link_fallback: Option<String>,
}

impl PricingTable {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            prices: settings.subscription_prices.clone(),
            stars: settings.stars_prices.clone(),
            card_links: settings.card_links.clone(),
            card_link_fallback: settings.card_link_fallback.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn durations(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.prices.iter().map(|(m, p)| (*m, *p))
    }

    pub fn quote(&self, months: i32) -> Option<PriceQuote> {
        let price = *self.prices.get(&months)?;
        let card_link = self
            .card_links
            .get(&months)
            .cloned()
            .or_else(|| self.card_link_fallback.clone());
        Some(PriceQuote {
            months,
            price,
            stars_price: self.stars.get(&months).copied(),
            card_link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PricingTable {
        PricingTable {
            prices: BTreeMap::from([(1, 150.0), (3, 400.0), (12, 1300.0)]),
            stars: BTreeMap::from([(1, 100), (3, 270)]),
            card_links: BTreeMap::from([(3, "https://pay.example/three".to_string())]),
            card_link_fallback: Some("https://pay.example/any".to_string()),
        }
    }

    #[test]
    fn quotes_match_configuration() {
        let t = table();
        for (months, price) in t.durations().collect::<Vec<_>>() {
            let q = t.quote(months).unwrap();
            assert_eq!(q.months, months);
            assert_eq!(q.price, price);
        }
        assert_eq!(t.quote(1).unwrap().stars_price, Some(100));
        assert_eq!(t.quote(12).unwrap().stars_price, None);
    }

    #[test]
    fn unconfigured_duration_is_not_found() {
        assert!(table().quote(6).is_none());
        assert!(table().quote(0).is_none());
        assert!(table().quote(-1).is_none());
    }

    #[test]
    fn duration_specific_card_link_wins_over_fallback() {
        let t = table();
        assert_eq!(
            t.quote(3).unwrap().card_link.as_deref(),
            Some("https://pay.example/three")
        );
        assert_eq!(
            t.quote(1).unwrap().card_link.as_deref(),
            Some("https://pay.example/any")
        );
    }

    #[test]
    fn no_links_configured_means_no_card_option() {
        let t = PricingTable {
            prices: BTreeMap::from([(1, 150.0)]),
            stars: BTreeMap::new(),
            card_links: BTreeMap::new(),
            card_link_fallback: None,
        };
        assert_eq!(t.quote(1).unwrap().card_link, None);
    }
}
