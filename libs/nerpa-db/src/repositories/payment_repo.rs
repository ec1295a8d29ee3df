use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::warn;

use crate::models::billing::{FinalizeOutcome, Payment, PaymentProvider};
use crate::repositories::subscription_repo::SubscriptionRepository;

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_pending(
        &self,
        user_id: i64,
        months: i32,
        amount: i64,
        provider: PaymentProvider,
        external_id: Option<&str>,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO payments (user_id, months, amount, provider, external_id, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(months)
        .bind(amount)
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create pending payment intent")
    }

    /// Idempotent confirmation: the pending -> confirmed transition and
    /// the subscription extension commit together. Re-delivery of the
    /// same confirmation (including concurrent delivery) loses the
    /// compare-and-set and is reported as `AlreadyConfirmed`.
    pub async fn finalize(&self, intent_id: i64, months: i32) -> Result<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;

        let intent: Option<Payment> =
            sqlx::query_as("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(intent_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to lock payment intent")?;

        let Some(intent) = intent else {
            return Ok(FinalizeOutcome::NotFound);
        };
        if intent.status != "pending" {
            return Ok(FinalizeOutcome::AlreadyConfirmed);
        }

        let updated = sqlx::query(
            "UPDATE payments SET status = 'confirmed', confirmed_at = CURRENT_TIMESTAMP
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(intent_id)
        .execute(&mut *tx)
        .await
        .context("Failed to confirm payment intent")?;

        if updated.rows_affected() == 0 {
            warn!("Payment intent {} lost confirmation race", intent_id);
            return Ok(FinalizeOutcome::AlreadyConfirmed);
        }

        let new_expiry =
            SubscriptionRepository::extend_in_tx(&mut tx, intent.user_id, months).await?;

        tx.commit().await?;
        Ok(FinalizeOutcome::Finalized { new_expiry })
    }
}
