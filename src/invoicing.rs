use std::time::Duration;

use reqwest::Client;

/// Thin client for the external invoicing service. Strictly a side-channel:
/// callers spawn it after a successful purchase and drop the error, so an
/// invoicing outage cannot affect the ledger.
pub struct InvoicingClient {
    base: String,
    api_key: Option<String>,
    http: Client,
}

impl InvoicingClient {
    /// `None` when no invoicing endpoint is configured; purchases then skip
    /// invoicing entirely.
    pub fn from_env() -> Option<Self> {
        let base = crate::config::INVOICING_API_URL.clone()?;
        Some(Self::new(base, crate::config::INVOICING_API_KEY.clone()))
    }

    pub fn new(base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key,
            http: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("client build"),
        }
    }

    pub async fn issue(
        &self,
        user_id: i32,
        amount_cents: i64,
        description: &str,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/v1/invoices", self.base);
        let mut req = self.http.post(&url).json(&serde_json::json!({
            "user_id": user_id,
            "amount_cents": amount_cents,
            "description": description,
        }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req.send().await?.error_for_status()?;
        tracing::info!(%user_id, %amount_cents, "invoice issued");
        Ok(())
    }
}
