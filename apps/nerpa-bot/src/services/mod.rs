pub mod crypto_pay_service;
pub mod ledger;
pub mod notification_service;
pub mod pay_service;
pub mod pricing;
pub mod stars_service;
pub mod subscription_service;
pub mod texts;
