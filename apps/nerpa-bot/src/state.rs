use std::sync::Arc;

use crate::config::Settings;
use crate::services::crypto_pay_service::CryptoPayService;
use crate::services::ledger::Ledger;
use crate::services::pricing::PricingTable;
use crate::services::stars_service::StarsService;
use crate::services::subscription_service::SubscriptionService;
use crate::services::texts::Texts;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub texts: Arc<Texts>,
    pub pricing: Arc<PricingTable>,
    pub ledger: Arc<dyn Ledger>,
    pub subs: SubscriptionService,
    pub crypto: CryptoPayService,
    pub stars: StarsService,
}
