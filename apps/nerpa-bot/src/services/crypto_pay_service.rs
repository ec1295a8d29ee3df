use anyhow::{Context, Result};
use nerpa_db::models::billing::PaymentProvider;
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

use crate::services::ledger::Ledger;

const CRYPTO_PAY_API: &str = "https://pay.crypt.bot/api";

/// Crypto invoices through the CryptoBot API. Unconfigured (no token)
/// means the payment method is simply not offered; the provider is
/// never contacted in that case.
#[derive(Clone)]
pub struct CryptoPayService {
    client: Client,
    token: Option<String>,
    ledger: Arc<dyn Ledger>,
}

impl CryptoPayService {
    pub fn new(token: Option<String>, ledger: Arc<dyn Ledger>) -> Self {
        // Invoice creation happens inside a menu interaction; a stalled
        // provider must surface as a gateway error, not a hang.
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            token,
            ledger,
        }
    }

    pub fn configured(&self) -> bool {
        self.token
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }

    /// Creates a provider invoice and, only once the provider has
    /// accepted it, records the pending intent keyed by the provider's
    /// invoice id. Provider failure leaves no intent behind.
    pub async fn create_invoice(
        &self,
        user_id: i64,
        months: i32,
        amount: f64,
        description: &str,
    ) -> Result<String> {
        let token = self
            .token
            .as_deref()
            .context("Crypto provider is not configured")?;

        #[derive(serde::Serialize)]
        struct InvoiceReq<'a> {
            currency_type: &'a str,
            fiat: &'a str,
            amount: String,
            description: &'a str,
        }
        #[derive(serde::Deserialize)]
        struct InvoiceResp {
            ok: bool,
            result: Option<InvoiceResult>,
        }
        #[derive(serde::Deserialize)]
        struct InvoiceResult {
            invoice_id: i64,
            bot_invoice_url: String,
        }

        let resp = self
            .client
            .post(format!("{}/createInvoice", CRYPTO_PAY_API))
            .header("Crypto-Pay-API-Token", token)
            .json(&InvoiceReq {
                currency_type: "fiat",
                fiat: "RUB",
                amount: format!("{:.2}", amount),
                description,
            })
            .send()
            .await
            .context("Crypto provider request failed")?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!(
                "Crypto provider returned {}",
                resp.status()
            ));
        }

        let body: InvoiceResp = resp.json().await.context("Bad crypto provider response")?;
        if !body.ok {
            return Err(anyhow::anyhow!("Crypto provider rejected the invoice"));
        }
        let invoice = body
            .result
            .ok_or_else(|| anyhow::anyhow!("Crypto provider response has no invoice"))?;

        let amount_minor = (amount * 100.0) as i64;
        let intent_id = self
            .ledger
            .create_pending_intent(
                user_id,
                months,
                amount_minor,
                PaymentProvider::Crypto,
                Some(&invoice.invoice_id.to_string()),
            )
            .await?;

        info!(
            "Created crypto intent {} (invoice {}) for user {}: {} months",
            intent_id, invoice.invoice_id, user_id, months
        );
        Ok(invoice.bot_invoice_url)
    }
}
