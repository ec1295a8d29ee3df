use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::billing::User;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        user_id: i64,
        username: Option<&str>,
        language_code: Option<&str>,
    ) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, username, language_code)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                username = EXCLUDED.username,
                language_code = COALESCE(EXCLUDED.language_code, users.language_code)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(language_code)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert user")
    }

    pub async fn has_had_any_subscription(&self, user_id: i64) -> Result<bool> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT has_had_subscription FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch has_had_subscription flag")?;
        Ok(flag.unwrap_or(false))
    }

    /// Ad-attribution bookkeeping; set once, further calls are no-ops.
    pub async fn mark_trial_attribution(&self, user_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE users SET trial_attributed_at = CURRENT_TIMESTAMP
             WHERE user_id = $1 AND trial_attributed_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark trial attribution")?;
        Ok(())
    }
}
