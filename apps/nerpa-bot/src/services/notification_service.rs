use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::warn;

/// Fire-and-forget notification channel for noteworthy billing events.
/// Failures never propagate into the flow that triggered them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_trial_activation(&self, user_id: i64, end_date: DateTime<Utc>) -> Result<()>;
}

pub struct TelegramNotifier {
    bot: Bot,
    chat_id: Option<i64>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: Option<i64>) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn notify_trial_activation(&self, user_id: i64, end_date: DateTime<Utc>) -> Result<()> {
        let Some(chat_id) = self.chat_id else {
            return Ok(());
        };
        let text = format!(
            "🆓 Trial activated by user {} (until {})",
            user_id,
            end_date.format("%Y-%m-%d")
        );
        if let Err(e) = self.bot.send_message(ChatId(chat_id), text).await {
            warn!("Failed to send trial activation notice: {}", e);
        }
        Ok(())
    }
}
