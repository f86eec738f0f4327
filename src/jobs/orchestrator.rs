use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger::CreditLedger;
use crate::providers::{ProviderError, RemoteJobAdapter, RemoteStatus, RemoteSubmission};

use super::models::{JobKind, JobRecord, JobStatusView};
use super::store::JobStore;

/// Coordinates the money-bearing job lifecycle: reserve credits, hand the
/// work to the remote provider, persist the record, and reconcile it on
/// later polls. This is the only place that pairs ledger mutations with job
/// state, so every call site gets the same compensation behavior.
#[derive(Clone)]
pub struct JobOrchestrator {
    ledger: CreditLedger,
    store: JobStore,
    adapter: Arc<dyn RemoteJobAdapter>,
    stale_after_hours: Option<i64>,
}

impl JobOrchestrator {
    pub fn new(ledger: CreditLedger, store: JobStore, adapter: Arc<dyn RemoteJobAdapter>) -> Self {
        Self {
            ledger,
            store,
            adapter,
            stale_after_hours: None,
        }
    }

    /// Enables force-failing (and refunding) `processing` records older than
    /// the given number of hours on their next poll. Off by default; such
    /// records otherwise stay `processing` indefinitely.
    pub fn with_stale_policy(mut self, stale_after_hours: Option<i64>) -> Self {
        self.stale_after_hours = stale_after_hours;
        self
    }

    /// Reserve → submit → persist. Credits are debited before the remote
    /// call; any submit failure after the debit refunds before returning, so
    /// no path leaves the user charged for work that never started.
    pub async fn submit(
        &self,
        owner_id: i32,
        kind: JobKind,
        payload: &Value,
    ) -> AppResult<JobRecord> {
        let cost = kind.cost();
        self.ledger.reserve(owner_id, cost).await?;

        let submission = match self.adapter.submit(kind, payload).await {
            Ok(submission) => submission,
            Err(err) => {
                self.ledger.refund(owner_id, cost).await?;
                tracing::warn!(%owner_id, kind = kind.as_str(), %err, "submit failed, reservation refunded");
                return Err(match err {
                    ProviderError::Rejected(detail) => AppError::ProviderSubmitFailed(detail),
                    ProviderError::Transport(detail) => AppError::ProviderUnavailable(detail),
                });
            }
        };

        let record = match submission {
            RemoteSubmission::Immediate(result) => {
                self.store
                    .create_completed(owner_id, kind, cost, &result)
                    .await?
            }
            RemoteSubmission::Pending(handle) => {
                self.store
                    .create_processing(owner_id, kind, cost, &handle)
                    .await?
            }
        };
        tracing::info!(job_id = %record.id, %owner_id, kind = kind.as_str(), state = %record.state, "job submitted");
        Ok(record)
    }

    /// Client-driven reconciliation. Terminal records short-circuit without
    /// touching the provider; a confirmed remote failure transitions the
    /// record and refunds exactly once, gated on the store's transition
    /// result so concurrent polls cannot double-refund.
    pub async fn poll(&self, job_id: Uuid, owner_id: i32) -> AppResult<JobStatusView> {
        let record = self
            .store
            .get_owned(job_id, owner_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if record.is_terminal() {
            return Ok(JobStatusView::from_record(&record));
        }

        let kind = record
            .job_kind()
            .ok_or_else(|| AppError::Message(format!("job {} has unknown kind", record.id)))?;

        if self.is_stale(&record) {
            return self
                .fail_and_refund(&record, "job exceeded the maximum processing age")
                .await;
        }

        let Some(handle) = record.remote_handle.as_deref() else {
            // A processing record without a handle can never resolve; failing
            // it returns the reserved credits instead of stranding them.
            return self.fail_and_refund(&record, "job lost its remote operation").await;
        };

        match self.adapter.check_status(kind, handle).await {
            Ok(RemoteStatus::Running) => Ok(JobStatusView::Processing {
                transient_error: None,
            }),
            Ok(RemoteStatus::Succeeded(result)) => {
                let applied = self
                    .store
                    .transition_to_completed(record.id, &result)
                    .await?;
                if applied {
                    return Ok(JobStatusView::Completed { result });
                }
                // A concurrent poll already reconciled the job; report what
                // the store actually holds rather than a success it rejected.
                let current = self
                    .store
                    .get_owned(record.id, record.owner_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                Ok(JobStatusView::from_record(&current))
            }
            Ok(RemoteStatus::Failed(detail)) => self.fail_and_refund(&record, &detail).await,
            Err(ProviderError::Transport(detail)) => {
                // A network blip is not a failed job: no transition, no
                // refund, the client simply polls again.
                tracing::warn!(job_id = %record.id, %detail, "status poll hit transport error");
                Ok(JobStatusView::Processing {
                    transient_error: Some(detail),
                })
            }
            Err(ProviderError::Rejected(detail)) => {
                tracing::warn!(job_id = %record.id, %detail, "status poll rejected upstream");
                Ok(JobStatusView::Processing {
                    transient_error: Some(detail),
                })
            }
        }
    }

    /// Marks the record failed and, iff this call won the transition,
    /// returns the reserved credits. Losing the race means another poll
    /// already reconciled the job; re-read and report its outcome.
    async fn fail_and_refund(&self, record: &JobRecord, detail: &str) -> AppResult<JobStatusView> {
        let applied = self.store.transition_to_failed(record.id, detail).await?;
        if applied {
            self.ledger
                .refund(record.owner_id, record.cost_reserved)
                .await?;
            tracing::info!(
                job_id = %record.id,
                owner_id = %record.owner_id,
                credits = %record.cost_reserved,
                %detail,
                "job failed, reservation refunded"
            );
            return Ok(JobStatusView::Failed {
                error: detail.to_string(),
            });
        }
        let current = self
            .store
            .get_owned(record.id, record.owner_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(JobStatusView::from_record(&current))
    }

    fn is_stale(&self, record: &JobRecord) -> bool {
        match self.stale_after_hours {
            Some(hours) => record.created_at + Duration::hours(hours) < Utc::now(),
            None => false,
        }
    }

    pub async fn history(&self, owner_id: i32) -> AppResult<Vec<JobRecord>> {
        self.store.list_by_owner(owner_id).await
    }

    pub async fn balance(&self, owner_id: i32) -> AppResult<i64> {
        self.ledger.balance_of(owner_id).await
    }
}
