use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which generative capability a job invoked. Each kind maps to one remote
/// provider family and a fixed credit tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    ImageEdit,
    VideoFromImage,
    TextureChange,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ImageEdit => "image-edit",
            JobKind::VideoFromImage => "video-from-image",
            JobKind::TextureChange => "texture-change",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image-edit" => Some(JobKind::ImageEdit),
            "video-from-image" => Some(JobKind::VideoFromImage),
            "texture-change" => Some(JobKind::TextureChange),
            _ => None,
        }
    }

    /// Credits debited at submission time for this capability.
    pub fn cost(&self) -> i64 {
        match self {
            JobKind::ImageEdit => 2,
            JobKind::VideoFromImage => 10,
            JobKind::TextureChange => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "processing" => Some(JobState::Processing),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One submitted unit of remote generative work, retained forever as history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub owner_id: i32,
    pub kind: String,
    pub cost_reserved: i64,
    pub remote_handle: Option<String>,
    pub state: String,
    pub result_payload: Option<String>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn job_kind(&self) -> Option<JobKind> {
        JobKind::parse(&self.kind)
    }

    pub fn job_state(&self) -> Option<JobState> {
        JobState::parse(&self.state)
    }

    pub fn is_terminal(&self) -> bool {
        self.job_state().map(|s| s.is_terminal()).unwrap_or(false)
    }
}

/// What a caller sees when polling a job. Serialized flat so the client's
/// polling loop can switch on `state` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobStatusView {
    Processing {
        #[serde(skip_serializing_if = "Option::is_none")]
        transient_error: Option<String>,
    },
    Completed {
        result: String,
    },
    Failed {
        error: String,
    },
}

impl JobStatusView {
    /// View of a record as stored, used for the terminal short-circuit and
    /// the no-progress poll answer.
    pub fn from_record(record: &JobRecord) -> Self {
        match record.job_state() {
            Some(JobState::Completed) => JobStatusView::Completed {
                result: record.result_payload.clone().unwrap_or_default(),
            },
            Some(JobState::Failed) => JobStatusView::Failed {
                error: record
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| "generation failed".to_string()),
            },
            _ => JobStatusView::Processing {
                transient_error: None,
            },
        }
    }
}
