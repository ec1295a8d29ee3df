use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Provisioning contract against the panel. The bot never talks to the
/// panel database directly; accounts are created and removed through
/// this API only.
#[async_trait]
pub trait PanelApi: Send + Sync {
    async fn create_user(
        &self,
        user_id: i64,
        expires_at: DateTime<Utc>,
        traffic_limit_gb: i32,
    ) -> Result<PanelAccount>;

    async fn delete_user(&self, uuid: &str) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelAccount {
    pub uuid: String,
    pub subscription_url: String,
}

#[derive(Clone)]
pub struct PanelClient {
    client: Client,
    base_url: String,
    token: String,
}

impl PanelClient {
    pub fn new(base_url: String, token: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url,
            token,
        }
    }

    async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}/api/v1/bot{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .header("X-Panel-Token", &self.token)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("Panel request failed: {}", resp.status()));
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PanelApi for PanelClient {
    async fn create_user(
        &self,
        user_id: i64,
        expires_at: DateTime<Utc>,
        traffic_limit_gb: i32,
    ) -> Result<PanelAccount> {
        #[derive(Serialize)]
        struct CreateReq {
            telegram_id: i64,
            expires_at: DateTime<Utc>,
            traffic_limit_gb: i32,
        }
        self.post(
            "/users",
            &CreateReq {
                telegram_id: user_id,
                expires_at,
                traffic_limit_gb,
            },
        )
        .await
    }

    async fn delete_user(&self, uuid: &str) -> Result<()> {
        let url = format!("{}/api/v1/bot/users/{}", self.base_url, uuid);
        let resp = self
            .client
            .delete(&url)
            .header("X-Panel-Token", &self.token)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!(
                "Panel user deletion failed: {}",
                resp.status()
            ));
        }
        Ok(())
    }
}
