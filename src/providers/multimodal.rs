use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::Value;

use super::token::TokenClient;
use super::{ProviderError, RemoteStatus, RemoteSubmission};

/// Client for the multimodal content API behind `image-edit`. The awkward
/// part of this provider is that it answers synchronously (inline base64
/// image) or asynchronously (operation name) depending on load, and nests
/// the result under different keys in each case; both shapes are normalized
/// here.
pub struct MultimodalClient {
    base: String,
    tokens: TokenClient,
    http: Client,
}

impl MultimodalClient {
    pub fn from_env(tokens: TokenClient) -> Self {
        Self::new(crate::config::MULTIMODAL_API_URL.clone(), tokens)
    }

    pub fn new(base: impl Into<String>, tokens: TokenClient) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            tokens,
            http: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("client build"),
        }
    }

    pub async fn submit(&self, payload: &Value) -> Result<RemoteSubmission, ProviderError> {
        let bearer = self.tokens.bearer().await?;
        let url = format!("{}/v1/images:edit", self.base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Rejected(format!(
                "image edit rejected with {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;

        // Async acceptance: the provider handed back an operation name.
        if let Some(name) = body
            .get("operation")
            .and_then(|op| op.get("name"))
            .and_then(Value::as_str)
        {
            return Ok(RemoteSubmission::Pending(name.to_string()));
        }
        if let Some(result) = extract_inline_result(&body) {
            return Ok(RemoteSubmission::Immediate(result));
        }
        Err(ProviderError::Rejected(
            "unrecognized image edit response shape".into(),
        ))
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
                .unwrap_or("operation failed");
            return Ok(RemoteStatus::Failed(message.to_string()));
        }
        // In the async case the finished payload hangs off `response`.
        if let Some(result) = body.get("response").and_then(extract_inline_result) {
            return Ok(RemoteStatus::Succeeded(result));
        }
        // Finished without a usable result is a confirmed terminal outcome,
        // not a transport blip.
        Ok(RemoteStatus::Failed(
            "operation finished without a result".into(),
        ))
    }
}

/// Digs the inline base64 image out of a candidates list and re-encodes it
/// as a self-contained data URL the client can render directly.
fn extract_inline_result(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    for part in parts {
        if let Some(inline) = part.get("inline_data") {
            let mime = inline
                .get("mime_type")
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            let data = inline.get("data").and_then(Value::as_str)?;
            // Reject payloads the client could never decode.
            STANDARD.decode(data).ok()?;
            return Some(format!("data:{mime};base64,{data}"));
        }
        // Some responses carry a hosted URI instead of inline bytes.
        if let Some(uri) = part.get("file_data").and_then(|f| f.get("file_uri")).and_then(Value::as_str) {
            return Some(uri.to_string());
        }
    }
    None
}
