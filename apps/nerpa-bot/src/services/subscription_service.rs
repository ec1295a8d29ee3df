use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use nerpa_db::models::billing::{Subscription, TrialActivation};
use std::sync::Arc;
use tracing::{error, warn};

use crate::api_client::PanelApi;
use crate::config::Settings;
use crate::services::ledger::Ledger;
use crate::services::notification_service::NotificationSink;

/// Why a trial request was turned down. Guards are evaluated in this
/// order and short-circuit without touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialGate {
    Disabled,
    AlreadyHad,
    Eligible,
}

#[derive(Debug, Clone)]
pub enum TrialOutcome {
    Activated {
        end_date: DateTime<Utc>,
        subscription_url: Option<String>,
        traffic_gb: i32,
        days: i64,
    },
    Rejected(TrialGate),
}

#[derive(Clone)]
pub struct SubscriptionService {
    ledger: Arc<dyn Ledger>,
    panel: Arc<dyn PanelApi>,
    notifier: Arc<dyn NotificationSink>,
    trial_enabled: bool,
    trial_days: i64,
    trial_traffic_gb: i32,
}

impl SubscriptionService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        panel: Arc<dyn PanelApi>,
        notifier: Arc<dyn NotificationSink>,
        settings: &Settings,
    ) -> Self {
        Self {
            ledger,
            panel,
            notifier,
            trial_enabled: settings.trial_enabled,
            trial_days: settings.trial_days,
            trial_traffic_gb: settings.trial_traffic_gb,
        }
    }

    pub async fn active_subscription(&self, user_id: i64) -> Result<Option<Subscription>> {
        self.ledger.get_active_subscription(user_id).await
    }

    pub async fn trial_gate(&self, user_id: i64) -> Result<TrialGate> {
        if !self.trial_enabled {
            return Ok(TrialGate::Disabled);
        }
        if self.ledger.has_had_any_subscription(user_id).await? {
            return Ok(TrialGate::AlreadyHad);
        }
        Ok(TrialGate::Eligible)
    }

    /// The activation step of the trial flow. Panel provisioning runs
    /// before the ledger transaction so no external call ever sits
    /// inside one; if the conditional flag update then loses to a
    /// concurrent activation, the freshly provisioned panel account is
    /// removed best-effort and the caller gets the rejection path.
    ///
    /// Post-activation side effects (notification, ad attribution) are
    /// best-effort: the grant is already committed and a lost
    /// attribution record never rolls it back.
    pub async fn activate_trial(&self, user_id: i64) -> Result<TrialOutcome> {
        match self.trial_gate(user_id).await? {
            TrialGate::Eligible => {}
            gate => return Ok(TrialOutcome::Rejected(gate)),
        }

        let expires_at = Utc::now() + Duration::days(self.trial_days);
        let account = self
            .panel
            .create_user(user_id, expires_at, self.trial_traffic_gb)
            .await
            .context("Panel provisioning for trial failed")?;

        let activation = self
            .ledger
            .activate_trial(
                user_id,
                &account.uuid,
                Some(&account.subscription_url),
                self.trial_days,
                self.trial_traffic_gb,
            )
            .await;

        match activation {
            Ok(TrialActivation::Activated { end_date }) => {
                if let Err(e) = self.notifier.notify_trial_activation(user_id, end_date).await {
                    warn!("Trial notification for user {} failed: {}", user_id, e);
                }
                if let Err(e) = self.ledger.mark_trial_attribution(user_id).await {
                    error!(
                        "Failed to mark trial attribution for user {}: {}",
                        user_id, e
                    );
                }
                Ok(TrialOutcome::Activated {
                    end_date,
                    subscription_url: Some(account.subscription_url),
                    traffic_gb: self.trial_traffic_gb,
                    days: self.trial_days,
                })
            }
            Ok(TrialActivation::AlreadyHad) => {
                self.deprovision(&account.uuid).await;
                Ok(TrialOutcome::Rejected(TrialGate::AlreadyHad))
            }
            Err(e) => {
                self.deprovision(&account.uuid).await;
                Err(e)
            }
        }
    }

    async fn deprovision(&self, uuid: &str) {
        if let Err(e) = self.panel.delete_user(uuid).await {
            error!("Failed to remove orphaned panel account {}: {}", uuid, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::PanelAccount;
    use crate::services::ledger::memory::MemoryLedger;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubPanel {
        created: AtomicUsize,
        deleted: AtomicUsize,
    }

    #[async_trait]
    impl PanelApi for StubPanel {
        async fn create_user(
            &self,
            user_id: i64,
            _expires_at: DateTime<Utc>,
            _traffic_limit_gb: i32,
        ) -> Result<PanelAccount> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(PanelAccount {
                uuid: format!("panel-{}-{}", user_id, n),
                subscription_url: format!("https://sub.example/{}", user_id),
            })
        }

        async fn delete_user(&self, _uuid: &str) -> Result<()> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify_trial_activation(&self, _: i64, _: DateTime<Utc>) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        panel: Arc<StubPanel>,
        sink: Arc<RecordingSink>,
        service: SubscriptionService,
    }

    fn fixture(trial_enabled: bool) -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let panel = Arc::new(StubPanel::default());
        let sink = Arc::new(RecordingSink::default());
        let service = SubscriptionService {
            ledger: ledger.clone(),
            panel: panel.clone(),
            notifier: sink.clone(),
            trial_enabled,
            trial_days: 3,
            trial_traffic_gb: 10,
        };
        Fixture {
            ledger,
            panel,
            sink,
            service,
        }
    }

    #[tokio::test]
    async fn disabled_trial_is_rejected_without_provisioning() {
        let f = fixture(false);
        let outcome = f.service.activate_trial(42).await.unwrap();
        assert!(matches!(outcome, TrialOutcome::Rejected(TrialGate::Disabled)));
        assert_eq!(f.panel.created.load(Ordering::SeqCst), 0);
        assert!(!f.ledger.has_had_any_subscription(42).await.unwrap());
    }

    #[tokio::test]
    async fn eligible_user_activates_once_with_side_effects() {
        let f = fixture(true);

        assert_eq!(f.service.trial_gate(42).await.unwrap(), TrialGate::Eligible);

        let outcome = f.service.activate_trial(42).await.unwrap();
        match outcome {
            TrialOutcome::Activated {
                end_date,
                subscription_url,
                traffic_gb,
                days,
            } => {
                let expected = Utc::now() + Duration::days(3);
                assert!((expected - end_date).num_seconds().abs() < 5);
                assert_eq!(subscription_url.as_deref(), Some("https://sub.example/42"));
                assert_eq!(traffic_gb, 10);
                assert_eq!(days, 3);
            }
            other => panic!("expected activation, got {:?}", other),
        }

        assert!(f.ledger.has_had_any_subscription(42).await.unwrap());
        assert_eq!(f.sink.sent.load(Ordering::SeqCst), 1);
        assert_eq!(f.ledger.attribution_count().await, 1);

        // The flag is monotonic: every further attempt rejects.
        let again = f.service.activate_trial(42).await.unwrap();
        assert!(matches!(
            again,
            TrialOutcome::Rejected(TrialGate::AlreadyHad)
        ));
        assert_eq!(f.sink.sent.load(Ordering::SeqCst), 1);
        assert_eq!(f.service.trial_gate(42).await.unwrap(), TrialGate::AlreadyHad);
    }

    #[tokio::test]
    async fn concurrent_activations_grant_exactly_one_trial() {
        let f = fixture(true);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = f.service.clone();
            handles.push(tokio::spawn(
                async move { service.activate_trial(7).await },
            ));
        }

        let mut activated = 0;
        for handle in handles {
            if let TrialOutcome::Activated { .. } = handle.await.unwrap().unwrap() {
                activated += 1;
            }
        }

        assert_eq!(activated, 1);
        assert!(f.ledger.has_had_any_subscription(7).await.unwrap());
        // Losers that provisioned a panel account before losing the
        // flag race must have cleaned it up.
        let created = f.panel.created.load(Ordering::SeqCst);
        let deleted = f.panel.deleted.load(Ordering::SeqCst);
        assert_eq!(created - deleted, 1);
        assert_eq!(f.sink.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn paid_user_is_never_offered_a_trial() {
        let f = fixture(true);

        // A paid extension consumes eligibility exactly like a trial.
        let intent = f
            .ledger
            .create_pending_intent(
                9,
                1,
                15000,
                nerpa_db::models::billing::PaymentProvider::Stars,
                None,
            )
            .await
            .unwrap();
        f.ledger.finalize_intent(intent, 1).await.unwrap();

        assert_eq!(f.service.trial_gate(9).await.unwrap(), TrialGate::AlreadyHad);
        let outcome = f.service.activate_trial(9).await.unwrap();
        assert!(matches!(
            outcome,
            TrialOutcome::Rejected(TrialGate::AlreadyHad)
        ));
        assert_eq!(f.panel.created.load(Ordering::SeqCst), 0);
    }
}
