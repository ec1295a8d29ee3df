use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::billing::{Subscription, TrialActivation};

#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_active_by_user(&self, user_id: i64) -> Result<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = $1 AND is_active LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch active subscription for user")
    }

    /// Atomic trial activation: the has_had_subscription flag flips
    /// false -> true and the trial record is created in one transaction.
    /// A concurrent duplicate attempt loses the conditional update and
    /// observes `AlreadyHad`; nothing is written for it.
    pub async fn activate_trial(
        &self,
        user_id: i64,
        subscription_uuid: &str,
        subscription_url: Option<&str>,
        days: i64,
        traffic_gb: i32,
    ) -> Result<TrialActivation> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let claimed = sqlx::query(
            "UPDATE users SET has_had_subscription = TRUE
             WHERE user_id = $1 AND has_had_subscription = FALSE",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to claim trial eligibility")?;

        if claimed.rows_affected() == 0 {
            return Ok(TrialActivation::AlreadyHad);
        }

        let end_date = Utc::now() + Duration::days(days);
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (user_id, subscription_uuid, subscription_url, is_trial, traffic_limit_gb, expires_at)
            VALUES ($1, $2, $3, TRUE, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(subscription_uuid)
        .bind(subscription_url)
        .bind(traffic_gb)
        .bind(end_date)
        .execute(&mut *tx)
        .await
        .context("Failed to create trial subscription")?;

        tx.commit().await?;
        Ok(TrialActivation::Activated { end_date })
    }

    pub async fn extend(&self, user_id: i64, months: i32) -> Result<DateTime<Utc>> {
        let mut tx = self.pool.begin().await?;
        let expiry = Self::extend_in_tx(&mut tx, user_id, months).await?;
        tx.commit().await?;
        Ok(expiry)
    }

    /// Extends the active subscription (or creates one from now) inside
    /// the caller's transaction. A lapsed expiry is bumped from now, not
    /// from the old end date.
    pub async fn extend_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        months: i32,
    ) -> Result<DateTime<Utc>> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM subscriptions WHERE user_id = $1 AND is_active FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to lock active subscription")?;

        let new_expiry: DateTime<Utc> = if let Some(sub_id) = existing {
            sqlx::query_scalar(
                "UPDATE subscriptions
                 SET expires_at = GREATEST(expires_at, CURRENT_TIMESTAMP) + make_interval(months => $1)
                 WHERE id = $2
                 RETURNING expires_at",
            )
            .bind(months)
            .bind(sub_id)
            .fetch_one(&mut **tx)
            .await
            .context("Failed to extend subscription expiry")?
        } else {
            sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(user_id)
                .execute(&mut **tx)
                .await?;

            // A paid period also consumes future trial eligibility.
            sqlx::query(
                "UPDATE users SET has_had_subscription = TRUE
                 WHERE user_id = $1 AND has_had_subscription = FALSE",
            )
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

            sqlx::query_scalar(
                r#"
                INSERT INTO subscriptions (user_id, subscription_uuid, expires_at)
                VALUES ($1, $2, CURRENT_TIMESTAMP + make_interval(months => $3))
                RETURNING expires_at
                "#,
            )
            .bind(user_id)
            .bind(Uuid::new_v4().to_string())
            .bind(months)
            .fetch_one(&mut **tx)
            .await
            .context("Failed to create subscription for paid period")?
        };

        Ok(new_expiry)
    }
}
