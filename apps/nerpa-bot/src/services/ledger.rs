use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nerpa_db::models::billing::{FinalizeOutcome, PaymentProvider, Subscription, TrialActivation};
use nerpa_db::repositories::payment_repo::PaymentRepository;
use nerpa_db::repositories::subscription_repo::SubscriptionRepository;
use nerpa_db::repositories::user_repo::UserRepository;
use nerpa_db::sqlx::PgPool;

/// Single source of truth for subscription and payment-intent state.
/// All mutation of the ledger goes through this trait; handlers never
/// touch storage directly.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn upsert_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        language_code: Option<&str>,
    ) -> Result<()>;

    async fn get_active_subscription(&self, user_id: i64) -> Result<Option<Subscription>>;

    async fn has_had_any_subscription(&self, user_id: i64) -> Result<bool>;

    /// Transactional: flips the has-ever-had flag and creates the trial
    /// record as one unit. Exactly one concurrent caller can succeed.
    async fn activate_trial(
        &self,
        user_id: i64,
        subscription_uuid: &str,
        subscription_url: Option<&str>,
        days: i64,
        traffic_gb: i32,
    ) -> Result<TrialActivation>;

    async fn create_pending_intent(
        &self,
        user_id: i64,
        months: i32,
        amount: i64,
        provider: PaymentProvider,
        external_id: Option<&str>,
    ) -> Result<i64>;

    /// Idempotent pending -> confirmed transition plus subscription
    /// extension; duplicates observe `AlreadyConfirmed`.
    async fn finalize_intent(&self, intent_id: i64, months: i32) -> Result<FinalizeOutcome>;

    async fn mark_trial_attribution(&self, user_id: i64) -> Result<()>;
}

#[derive(Clone)]
pub struct PgLedger {
    users: UserRepository,
    subscriptions: SubscriptionRepository,
    payments: PaymentRepository,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool),
        }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn upsert_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        language_code: Option<&str>,
    ) -> Result<()> {
        self.users.upsert(user_id, username, language_code).await?;
        Ok(())
    }

    async fn get_active_subscription(&self, user_id: i64) -> Result<Option<Subscription>> {
        self.subscriptions.get_active_by_user(user_id).await
    }

    async fn has_had_any_subscription(&self, user_id: i64) -> Result<bool> {
        self.users.has_had_any_subscription(user_id).await
    }

    async fn activate_trial(
        &self,
        user_id: i64,
        subscription_uuid: &str,
        subscription_url: Option<&str>,
        days: i64,
        traffic_gb: i32,
    ) -> Result<TrialActivation> {
        self.subscriptions
            .activate_trial(user_id, subscription_uuid, subscription_url, days, traffic_gb)
            .await
    }

    async fn create_pending_intent(
        &self,
        user_id: i64,
        months: i32,
        amount: i64,
        provider: PaymentProvider,
        external_id: Option<&str>,
    ) -> Result<i64> {
        self.payments
            .create_pending(user_id, months, amount, provider, external_id)
            .await
    }

    async fn finalize_intent(&self, intent_id: i64, months: i32) -> Result<FinalizeOutcome> {
        self.payments.finalize(intent_id, months).await
    }

    async fn mark_trial_attribution(&self, user_id: i64) -> Result<()> {
        self.users.mark_trial_attribution(user_id).await
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory ledger double mirroring the transactional semantics of
    //! the Postgres implementation, for state-machine tests.

    use super::*;
    use chrono::{Duration, Months};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemUser {
        has_had_subscription: bool,
        attributed: bool,
    }

    struct MemIntent {
        user_id: i64,
        status: &'static str,
    }

    #[derive(Default)]
    struct Inner {
        users: HashMap<i64, MemUser>,
        subscriptions: HashMap<i64, Subscription>,
        intents: HashMap<i64, MemIntent>,
        next_intent_id: i64,
        next_sub_id: i64,
    }

    #[derive(Default)]
    pub struct MemoryLedger {
        inner: Mutex<Inner>,
    }

    impl MemoryLedger {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn attribution_count(&self) -> usize {
            let inner = self.inner.lock().await;
            inner.users.values().filter(|u| u.attributed).count()
        }

        pub async fn expiry_of(&self, user_id: i64) -> Option<DateTime<Utc>> {
            let inner = self.inner.lock().await;
            inner.subscriptions.get(&user_id).map(|s| s.expires_at)
        }
    }

    #[async_trait]
    impl Ledger for MemoryLedger {
        async fn upsert_user(&self, user_id: i64, _: Option<&str>, _: Option<&str>) -> Result<()> {
            let mut inner = self.inner.lock().await;
            inner.users.entry(user_id).or_default();
            Ok(())
        }

        async fn get_active_subscription(&self, user_id: i64) -> Result<Option<Subscription>> {
            let inner = self.inner.lock().await;
            Ok(inner.subscriptions.get(&user_id).cloned())
        }

        async fn has_had_any_subscription(&self, user_id: i64) -> Result<bool> {
            let inner = self.inner.lock().await;
            Ok(inner
                .users
                .get(&user_id)
                .map(|u| u.has_had_subscription)
                .unwrap_or(false))
        }

        async fn activate_trial(
            &self,
            user_id: i64,
            subscription_uuid: &str,
            subscription_url: Option<&str>,
            days: i64,
            traffic_gb: i32,
        ) -> Result<TrialActivation> {
            let mut inner = self.inner.lock().await;
            let user = inner.users.entry(user_id).or_default();
            if user.has_had_subscription {
                return Ok(TrialActivation::AlreadyHad);
            }
            user.has_had_subscription = true;

            let end_date = Utc::now() + Duration::days(days);
            inner.next_sub_id += 1;
            let id = inner.next_sub_id;
            inner.subscriptions.insert(
                user_id,
                Subscription {
                    id,
                    user_id,
                    subscription_uuid: subscription_uuid.to_string(),
                    subscription_url: subscription_url.map(|s| s.to_string()),
                    is_active: true,
                    is_trial: true,
                    traffic_limit_gb: traffic_gb,
                    expires_at: end_date,
                    created_at: Utc::now(),
                },
            );
            Ok(TrialActivation::Activated { end_date })
        }

        async fn create_pending_intent(
            &self,
            user_id: i64,
            _months: i32,
            _amount: i64,
            _provider: PaymentProvider,
            _external_id: Option<&str>,
        ) -> Result<i64> {
            let mut inner = self.inner.lock().await;
            inner.next_intent_id += 1;
            let id = inner.next_intent_id;
            inner.intents.insert(
                id,
                MemIntent {
                    user_id,
                    status: "pending",
                },
            );
            Ok(id)
        }

        async fn finalize_intent(&self, intent_id: i64, months: i32) -> Result<FinalizeOutcome> {
            let mut inner = self.inner.lock().await;
            let Some(intent) = inner.intents.get_mut(&intent_id) else {
                return Ok(FinalizeOutcome::NotFound);
            };
            if intent.status != "pending" {
                return Ok(FinalizeOutcome::AlreadyConfirmed);
            }
            intent.status = "confirmed";
            let user_id = intent.user_id;

            inner.users.entry(user_id).or_default().has_had_subscription = true;
            let now = Utc::now();
            inner.next_sub_id += 1;
            let next_id = inner.next_sub_id;
            let sub = inner.subscriptions.entry(user_id).or_insert_with(|| Subscription {
                id: next_id,
                user_id,
                subscription_uuid: format!("mem-{}", user_id),
                subscription_url: None,
                is_active: true,
                is_trial: false,
                traffic_limit_gb: 0,
                expires_at: now,
                created_at: now,
            });
            let base = sub.expires_at.max(now);
            let new_expiry = base
                .checked_add_months(Months::new(months as u32))
                .unwrap_or(base);
            sub.expires_at = new_expiry;
            Ok(FinalizeOutcome::Finalized { new_expiry })
        }

        async fn mark_trial_attribution(&self, user_id: i64) -> Result<()> {
            let mut inner = self.inner.lock().await;
            inner.users.entry(user_id).or_default().attributed = true;
            Ok(())
        }
    }
}
