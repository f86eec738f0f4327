pub mod multimodal;
pub mod prediction;
pub mod token;
pub mod video;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::jobs::JobKind;

/// Outcome of handing a job to a remote provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSubmission {
    /// The provider answered synchronously with a finished result.
    Immediate(String),
    /// The provider is running asynchronously; the handle is polled later.
    Pending(String),
}

/// Normalized status of a remote long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Running,
    Succeeded(String),
    Failed(String),
}

/// Rejections and transport faults are kept apart on purpose: only a
/// confirmed remote failure may trigger a refund downstream, a network blip
/// must not.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected request: {0}")]
    Rejected(String),
    #[error("provider transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

/// Uniform interface over the heterogeneous generative providers. All
/// response-shape normalization lives behind this trait; the orchestrator
/// never branches on provider JSON.
#[async_trait]
pub trait RemoteJobAdapter: Send + Sync {
    async fn submit(&self, kind: JobKind, payload: &Value)
        -> Result<RemoteSubmission, ProviderError>;

    async fn check_status(&self, kind: JobKind, handle: &str)
        -> Result<RemoteStatus, ProviderError>;
}

/// Dispatches each job kind to its provider client.
pub struct ProviderRouter {
    multimodal: multimodal::MultimodalClient,
    video: video::VideoClient,
    prediction: prediction::PredictionClient,
}

impl ProviderRouter {
    pub fn from_env() -> Self {
        let tokens = token::TokenClient::from_env();
        Self {
            multimodal: multimodal::MultimodalClient::from_env(tokens.clone()),
            video: video::VideoClient::from_env(tokens),
            prediction: prediction::PredictionClient::from_env(),
        }
    }
}

#[async_trait]
impl RemoteJobAdapter for ProviderRouter {
    async fn submit(
        &self,
        kind: JobKind,
        payload: &Value,
    ) -> Result<RemoteSubmission, ProviderError> {
        match kind {
            JobKind::ImageEdit => self.multimodal.submit(payload).await,
            JobKind::VideoFromImage => self.video.submit(payload).await,
            JobKind::TextureChange => self.prediction.submit(payload).await,
        }
    }

    async fn check_status(
        &self,
        kind: JobKind,
        handle: &str,
    ) -> Result<RemoteStatus, ProviderError> {
        match kind {
            JobKind::ImageEdit => self.multimodal.check_status(handle).await,
            JobKind::VideoFromImage => self.video.check_status(handle).await,
            JobKind::TextureChange => self.prediction.check_status(handle).await,
        }
    }
}
