use anyhow::Result;
use chrono::{DateTime, Utc};
use nerpa_db::models::billing::{FinalizeOutcome, PaymentProvider};
use std::sync::Arc;
use tracing::{info, warn};

use crate::services::ledger::Ledger;

/// Telegram Stars invoices. The pending intent is created first so its
/// id can travel inside the invoice payload and come back with the
/// confirmation message, keeping confirmation stateless.
#[derive(Clone)]
pub struct StarsService {
    ledger: Arc<dyn Ledger>,
    enabled: bool,
}

#[derive(Debug, Clone)]
pub struct StarsInvoice {
    pub intent_id: i64,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub enum StarsConfirmation {
    Extended {
        months: i32,
        new_expiry: DateTime<Utc>,
    },
    /// Re-delivered confirmation for an already-confirmed intent.
    Duplicate,
    /// Malformed or unknown payload; logged and ignored.
    Dropped,
}

impl StarsService {
    pub fn new(ledger: Arc<dyn Ledger>, enabled: bool) -> Self {
        Self { ledger, enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub async fn create_invoice(
        &self,
        user_id: i64,
        months: i32,
        stars_price: u32,
    ) -> Result<StarsInvoice> {
        let intent_id = self
            .ledger
            .create_pending_intent(
                user_id,
                months,
                stars_price as i64,
                PaymentProvider::Stars,
                None,
            )
            .await?;

        Ok(StarsInvoice {
            intent_id,
            payload: invoice_payload(intent_id, months),
        })
    }

    /// Consumes a successful-payment confirmation. Idempotent: repeated
    /// delivery of the same payload extends the subscription exactly
    /// once. Malformed payloads are dropped silently; the provider has
    /// no retry channel for them.
    pub async fn confirm_payment(
        &self,
        payload: &str,
        total_amount: i64,
        user_id: i64,
    ) -> Result<StarsConfirmation> {
        let Some((intent_id, months)) = parse_invoice_payload(payload) else {
            warn!(
                "Dropping malformed stars payload {:?} from user {}",
                payload, user_id
            );
            return Ok(StarsConfirmation::Dropped);
        };

        match self.ledger.finalize_intent(intent_id, months).await? {
            FinalizeOutcome::Finalized { new_expiry } => {
                info!(
                    "Stars payment confirmed for user {}: intent {}, {} XTR, {} months",
                    user_id, intent_id, total_amount, months
                );
                Ok(StarsConfirmation::Extended { months, new_expiry })
            }
            FinalizeOutcome::AlreadyConfirmed => {
                info!(
                    "Duplicate stars confirmation for intent {} ignored",
                    intent_id
                );
                Ok(StarsConfirmation::Duplicate)
            }
            FinalizeOutcome::NotFound => {
                warn!(
                    "Stars confirmation for unknown intent {} from user {}",
                    intent_id, user_id
                );
                Ok(StarsConfirmation::Dropped)
            }
        }
    }
}

/// Wire format carried through the provider: `"{intent_id}:{months}"`,
/// both decimal integers.
pub fn invoice_payload(intent_id: i64, months: i32) -> String {
    format!("{}:{}", intent_id, months)
}

pub fn parse_invoice_payload(payload: &str) -> Option<(i64, i32)> {
    let (intent, months) = payload.split_once(':')?;
    let intent_id: i64 = intent.parse().ok()?;
    let months: i32 = months.parse().ok()?;
    if intent_id <= 0 || months <= 0 {
        return None;
    }
    Some((intent_id, months))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ledger::memory::MemoryLedger;

    fn service(ledger: Arc<MemoryLedger>) -> StarsService {
        StarsService::new(ledger, true)
    }

    #[test]
    fn payload_round_trips() {
        assert_eq!(invoice_payload(42, 3), "42:3");
        assert_eq!(parse_invoice_payload("42:3"), Some((42, 3)));
    }

    #[test]
    fn rejects_malformed_payloads() {
        for bad in ["abc", "", "42", ":", "42:", ":3", "a:3", "42:b", "0:1", "42:0", "-1:3"] {
            assert_eq!(parse_invoice_payload(bad), None, "payload {:?}", bad);
        }
    }

    #[tokio::test]
    async fn confirmation_extends_once_and_duplicates_are_noops() {
        let ledger = Arc::new(MemoryLedger::new());
        let stars = service(ledger.clone());

        let invoice = stars.create_invoice(42, 1, 100).await.unwrap();
        assert_eq!(invoice.payload, format!("{}:1", invoice.intent_id));

        let first = stars.confirm_payment(&invoice.payload, 100, 42).await.unwrap();
        let expiry = match first {
            StarsConfirmation::Extended { months, new_expiry } => {
                assert_eq!(months, 1);
                new_expiry
            }
            other => panic!("expected extension, got {:?}", other),
        };

        let second = stars.confirm_payment(&invoice.payload, 100, 42).await.unwrap();
        assert!(matches!(second, StarsConfirmation::Duplicate));
        assert_eq!(ledger.expiry_of(42).await, Some(expiry));
    }

    #[tokio::test]
    async fn concurrent_confirmations_extend_exactly_once() {
        let ledger = Arc::new(MemoryLedger::new());
        let stars = service(ledger.clone());
        let invoice = stars.create_invoice(7, 3, 270).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let stars = stars.clone();
            let payload = invoice.payload.clone();
            handles.push(tokio::spawn(async move {
                stars.confirm_payment(&payload, 270, 7).await.unwrap()
            }));
        }

        let mut extended = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), StarsConfirmation::Extended { .. }) {
                extended += 1;
            }
        }
        assert_eq!(extended, 1);
    }

    #[tokio::test]
    async fn malformed_payload_leaves_ledger_untouched() {
        let ledger = Arc::new(MemoryLedger::new());
        let stars = service(ledger.clone());

        let outcome = stars.confirm_payment("abc", 100, 42).await.unwrap();
        assert!(matches!(outcome, StarsConfirmation::Dropped));
        assert_eq!(ledger.expiry_of(42).await, None);
    }

    #[tokio::test]
    async fn unknown_intent_is_dropped() {
        let ledger = Arc::new(MemoryLedger::new());
        let stars = service(ledger.clone());

        let outcome = stars.confirm_payment("999:1", 100, 42).await.unwrap();
        assert!(matches!(outcome, StarsConfirmation::Dropped));
        assert_eq!(ledger.expiry_of(42).await, None);
    }
}
