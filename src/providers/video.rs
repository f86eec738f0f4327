use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use super::token::TokenClient;
use super::{ProviderError, RemoteStatus, RemoteSubmission};

/// Client for the long-video generation API behind `video-from-image`.
/// Always asynchronous: submit yields an operation name, completion is
/// observed by polling it.
pub struct VideoClient {
    base: String,
    tokens: TokenClient,
    http: Client,
}

impl VideoClient {
    pub fn from_env(tokens: TokenClient) -> Self {
        Self::new(crate::config::VIDEO_API_URL.clone(), tokens)
    }

    pub fn new(base: impl Into<String>, tokens: TokenClient) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            tokens,
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("client build"),
        }
    }

    pub async fn submit(&self, payload: &Value) -> Result<RemoteSubmission, ProviderError> {
        let bearer = self.tokens.bearer().await?;
        let url = format!("{}/v1/videos:generate", self.base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Rejected(format!(
                "video generation rejected with {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Rejected("video response missing operation name".into()))?;
        Ok(RemoteSubmission::Pending(name.to_string()))
    }

    pub async fn check_status(&self, handle: &str) -> Result<RemoteStatus, ProviderError> {
        let bearer = self.tokens.bearer().await?;
        let url = format!("{}/v1/{}", self.base, handle);
        let response = self.http.get(&url).bearer_auth(bearer).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "operation lookup answered {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;

        if !body.get("done").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(RemoteStatus::Running);
        }
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("video generation failed");
            return Ok(RemoteStatus::Failed(message.to_string()));
        }
        let uri = body
            .get("response")
            .and_then(|r| r.get("video"))
            .and_then(|v| v.get("uri"))
            .and_then(Value::as_str);
        match uri {
            Some(uri) => Ok(RemoteStatus::Succeeded(uri.to_string())),
            None => Ok(RemoteStatus::Failed(
                "video operation finished without a result".into(),
            )),
        }
    }
}
