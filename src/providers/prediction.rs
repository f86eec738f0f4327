use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use super::{ProviderError, RemoteStatus, RemoteSubmission};

/// Client for the prediction-polling API behind `texture-change`. Submit
/// returns a prediction id; the status endpoint reports a lifecycle string
/// (`starting`/`processing`/`succeeded`/`failed`/`canceled`) with the output
/// URL or an error field attached.
pub struct PredictionClient {
    base: String,
    api_key: Option<String>,
    http: Client,
}

impl PredictionClient {
    pub fn from_env() -> Self {
        Self::new(
            crate::config::PREDICTION_API_URL.clone(),
            crate::config::PREDICTION_API_KEY.clone(),
        )
    }

    pub fn new(base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key,
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("client build"),
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Token {key}")),
            None => req,
        }
    }

    pub async fn submit(&self, payload: &Value) -> Result<RemoteSubmission, ProviderError> {
        let url = format!("{}/v1/predictions", self.base);
        let response = self
            .authorized(self.http.post(&url))
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Rejected(format!(
                "prediction rejected with {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Rejected("prediction response missing id".into()))?;
        Ok(RemoteSubmission::Pending(id.to_string()))
    }

    pub async fn check_status(&self, handle: &str) -> Result<RemoteStatus, ProviderError> {
        let url = format!("{}/v1/predictions/{}", self.base, handle);
        let response = self.authorized(self.http.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "prediction lookup answered {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        let status = body.get("status").and_then(Value::as_str).unwrap_or("");
        match status {
            "starting" | "processing" => Ok(RemoteStatus::Running),
            "succeeded" => match extract_output(&body) {
                Some(output) => Ok(RemoteStatus::Succeeded(output)),
                None => Ok(RemoteStatus::Failed(
                    "prediction succeeded without output".into(),
                )),
            },
            "failed" | "canceled" => {
                let detail = body
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("prediction failed");
                Ok(RemoteStatus::Failed(detail.to_string()))
            }
            other => Err(ProviderError::Transport(format!(
                "unknown prediction status '{other}'"
            ))),
        }
    }
}

/// The output field is a bare URL for single-file models and an array of
/// URLs for multi-file ones; the first entry wins in the latter case.
fn extract_output(body: &Value) -> Option<String> {
    match body.get("output")? {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_output_is_taken_directly() {
        let body = json!({"output": "https://cdn.example/tex.glb"});
        assert_eq!(
            extract_output(&body).unwrap(),
            "https://cdn.example/tex.glb"
        );
    }

    #[test]
    fn array_output_takes_first_entry() {
        let body = json!({"output": ["https://cdn.example/a.png", "https://cdn.example/b.png"]});
        assert_eq!(extract_output(&body).unwrap(), "https://cdn.example/a.png");
    }

    #[test]
    fn non_url_output_is_none() {
        assert_eq!(extract_output(&json!({"output": 17})), None);
        assert_eq!(extract_output(&json!({})), None);
    }
}
