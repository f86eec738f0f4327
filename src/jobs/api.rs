use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

use super::models::{JobRecord, JobStatusView};
use super::orchestrator::JobOrchestrator;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

pub async fn submit_job(
    Extension(orchestrator): Extension<JobOrchestrator>,
    AuthUser { user_id, .. }: AuthUser,
    Json(payload): Json<SubmitJobRequest>,
) -> AppResult<(StatusCode, Json<SubmitJobResponse>)> {
    let kind = super::models::JobKind::parse(&payload.kind)
        .ok_or_else(|| AppError::BadRequest(format!("unknown job kind '{}'", payload.kind)))?;
    let record = orchestrator
        .submit(user_id, kind, &payload.payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            job_id: record.id,
            state: record.state,
        }),
    ))
}

pub async fn poll_job(
    Extension(orchestrator): Extension<JobOrchestrator>,
    AuthUser { user_id, .. }: AuthUser,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<JobStatusView>> {
    let view = orchestrator.poll(job_id, user_id).await?;
    Ok(Json(view))
}

pub async fn list_jobs(
    Extension(orchestrator): Extension<JobOrchestrator>,
    AuthUser { user_id, .. }: AuthUser,
) -> AppResult<Json<Vec<JobRecord>>> {
    let records = orchestrator.history(user_id).await?;
    Ok(Json(records))
}

pub async fn get_balance(
    Extension(orchestrator): Extension<JobOrchestrator>,
    AuthUser { user_id, .. }: AuthUser,
) -> AppResult<Json<BalanceResponse>> {
    let balance = orchestrator.balance(user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}
