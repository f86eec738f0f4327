use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::ProviderError;

/// Refresh this long before the reported expiry so an in-flight provider
/// call never rides an expiring token.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Memoizing client for the upstream OAuth token endpoint shared by the
/// multimodal and video providers. Acquire-on-miss, refresh-before-expiry;
/// the cache is owned here rather than living in module-global state so
/// tests can construct isolated instances.
#[derive(Clone)]
pub struct TokenClient {
    inner: Arc<TokenClientInner>,
}

struct TokenClientInner {
    endpoint: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    static_token: Option<String>,
    http: Client,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenClient {
    pub fn from_env() -> Self {
        Self::new(
            crate::config::UPSTREAM_TOKEN_URL.clone(),
            crate::config::UPSTREAM_CLIENT_ID.clone(),
            crate::config::UPSTREAM_CLIENT_SECRET.clone(),
            crate::config::UPSTREAM_STATIC_TOKEN.clone(),
        )
    }

    pub fn new(
        endpoint: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
        static_token: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(TokenClientInner {
                endpoint,
                client_id,
                client_secret,
                static_token,
                http: Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()
                    .expect("client build"),
                cached: RwLock::new(None),
            }),
        }
    }

    /// Current bearer token: the configured static token, a still-fresh
    /// cached one, or a newly acquired one.
    pub async fn bearer(&self) -> Result<String, ProviderError> {
        if let Some(token) = &self.inner.static_token {
            return Ok(token.clone());
        }

        let now = Utc::now();
        {
            let cached = self.inner.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > now {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut cached = self.inner.cached.write().await;
        // A concurrent caller may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.expires_at > now {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.acquire().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn acquire(&self) -> Result<CachedToken, ProviderError> {
        let endpoint = self.inner.endpoint.as_deref().ok_or_else(|| {
            ProviderError::Rejected("no upstream token endpoint configured".into())
        })?;
        let response = self
            .inner
            .http
            .post(endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.inner.client_id.as_deref().unwrap_or("")),
                (
                    "client_secret",
                    self.inner.client_secret.as_deref().unwrap_or(""),
                ),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Rejected(format!(
                "token endpoint answered {}",
                response.status()
            )));
        }
        let body: TokenResponse = response.json().await?;
        let lifetime = (body.expires_in - EXPIRY_MARGIN_SECS).max(1);
        Ok(CachedToken {
            value: body.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        })
    }
}
