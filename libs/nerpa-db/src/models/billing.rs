use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub language_code: Option<String>,
    pub has_had_subscription: bool,
    pub trial_attributed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub subscription_uuid: String,
    pub subscription_url: Option<String>,
    pub is_active: bool,
    pub is_trial: bool,
    /// 0 means unlimited.
    pub traffic_limit_gb: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub months: i32,
    pub amount: i64,
    pub provider: String,
    pub external_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentProvider {
    CardRedirect,
    Crypto,
    Stars,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::CardRedirect => "card",
            PaymentProvider::Crypto => "crypto",
            PaymentProvider::Stars => "stars",
        }
    }
}

/// Outcome of the transactional trial activation.
#[derive(Debug, Clone)]
pub enum TrialActivation {
    Activated { end_date: DateTime<Utc> },
    /// The eligibility flag was already set; a concurrent or earlier
    /// activation won and this caller must take the rejection path.
    AlreadyHad,
}

/// Outcome of finalizing a pending payment intent.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    Finalized { new_expiry: DateTime<Utc> },
    AlreadyConfirmed,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_tags_are_stable() {
        // These tags end up in the payments.provider column and in
        // webhook correlation, so they must not drift.
        assert_eq!(PaymentProvider::CardRedirect.as_str(), "card");
        assert_eq!(PaymentProvider::Crypto.as_str(), "crypto");
        assert_eq!(PaymentProvider::Stars.as_str(), "stars");
    }
}
