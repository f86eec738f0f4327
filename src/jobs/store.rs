use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

use super::models::{JobKind, JobRecord};

/// Durable CRUD for job records. Terminal transitions are conditional
/// UPDATEs guarded on `state = 'processing'`; the returned bool reports
/// whether the transition applied, which is what lets the orchestrator issue
/// at most one refund per job under concurrent polls.
#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a record pending on a remote operation.
    pub async fn create_processing(
        &self,
        owner_id: i32,
        kind: JobKind,
        cost_reserved: i64,
        remote_handle: &str,
    ) -> AppResult<JobRecord> {
        let record = sqlx::query_as::<_, JobRecord>(
            r#"
            INSERT INTO jobs (id, owner_id, kind, cost_reserved, remote_handle, state)
            VALUES ($1, $2, $3, $4, $5, 'processing')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(kind.as_str())
        .bind(cost_reserved)
        .bind(remote_handle)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    /// Inserts a record that is `completed` from its first read; used when a
    /// provider answers synchronously so the job is never observed pending.
    pub async fn create_completed(
        &self,
        owner_id: i32,
        kind: JobKind,
        cost_reserved: i64,
        result_payload: &str,
    ) -> AppResult<JobRecord> {
        let record = sqlx::query_as::<_, JobRecord>(
            r#"
            INSERT INTO jobs (id, owner_id, kind, cost_reserved, state, result_payload)
            VALUES ($1, $2, $3, $4, 'completed', $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(kind.as_str())
        .bind(cost_reserved)
        .bind(result_payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn get_owned(&self, id: Uuid, owner_id: i32) -> AppResult<Option<JobRecord>> {
        let record = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Marks the job completed. Returns whether the transition applied; a
    /// record that is already terminal is left untouched.
    pub async fn transition_to_completed(&self, id: Uuid, result_payload: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'completed', result_payload = $2, updated_at = NOW()
            WHERE id = $1 AND state = 'processing'
            "#,
        )
        .bind(id)
        .bind(result_payload)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Marks the job failed. Same terminality guard as
    /// [`JobStore::transition_to_completed`].
    pub async fn transition_to_failed(&self, id: Uuid, error_detail: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed', error_detail = $2, updated_at = NOW()
            WHERE id = $1 AND state = 'processing'
            "#,
        )
        .bind(id)
        .bind(error_detail)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Full generation history for a user, newest first.
    pub async fn list_by_owner(&self, owner_id: i32) -> AppResult<Vec<JobRecord>> {
        let records = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
