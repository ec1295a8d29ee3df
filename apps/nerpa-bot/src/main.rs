use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;

mod api_client;
mod bot;
mod config;
mod services;
mod state;

use crate::api_client::{PanelApi, PanelClient};
use crate::config::Settings;
use crate::services::crypto_pay_service::CryptoPayService;
use crate::services::ledger::{Ledger, PgLedger};
use crate::services::notification_service::{NotificationSink, TelegramNotifier};
use crate::services::pricing::PricingTable;
use crate::services::stars_service::StarsService;
use crate::services::subscription_service::SubscriptionService;
use crate::services::texts::Texts;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    log::info!("Starting Nerpa bot...");

    let settings = Settings::from_env()?;
    let pool = nerpa_db::connect(&settings.database_url).await?;

    let ledger: Arc<dyn Ledger> = Arc::new(PgLedger::new(pool));
    let panel: Arc<dyn PanelApi> = Arc::new(PanelClient::new(
        settings.panel_url.clone(),
        settings.panel_token.clone(),
    ));

    let bot = Bot::new(settings.bot_token.clone());
    let notifier: Arc<dyn NotificationSink> =
        Arc::new(TelegramNotifier::new(bot.clone(), settings.notify_chat_id));

    let texts = Arc::new(Texts::new()?);
    let pricing = Arc::new(PricingTable::from_settings(&settings));

    let subs = SubscriptionService::new(ledger.clone(), panel, notifier, &settings);
    let crypto = CryptoPayService::new(settings.crypto_pay_token.clone(), ledger.clone());
    let stars = StarsService::new(ledger.clone(), settings.stars_enabled);

    let state = AppState {
        settings: Arc::new(settings),
        texts,
        pricing,
        ledger,
        subs,
        crypto,
        stars,
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received Ctrl-C, shutting down...");
            let _ = shutdown_tx.send(());
        }
    });

    bot::run_bot(bot, shutdown_rx, state).await;
    Ok(())
}
