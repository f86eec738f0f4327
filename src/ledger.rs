use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// Sole arbiter of credit balance mutation. Every debit goes through
/// [`CreditLedger::reserve`], a single conditional UPDATE, so two concurrent
/// spend attempts can never both pass a balance check and drive the balance
/// negative. The `CHECK (balance >= 0)` constraint on `users` backs this up
/// at the schema level.
#[derive(Clone)]
pub struct CreditLedger {
    pool: PgPool,
}

impl CreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically debits `amount` credits, failing with
    /// [`AppError::InsufficientCredits`] when the balance does not cover it.
    /// On failure no mutation occurs.
    pub async fn reserve(&self, user_id: i32, amount: i64) -> AppResult<()> {
        if amount <= 0 {
            return Err(AppError::BadRequest("reserve amount must be positive".into()));
        }
        let result = sqlx::query(
            "UPDATE users SET balance = balance - $2 WHERE id = $1 AND balance >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::InsufficientCredits);
        }
        Ok(())
    }

    /// Unconditionally credits `amount` back. The ledger does not deduplicate;
    /// callers are responsible for at-most-once semantics (the orchestrator
    /// gates refunds on the job store's transition result, the purchase
    /// webhook on the event-id uniqueness constraint).
    pub async fn refund(&self, user_id: i32, amount: i64) -> AppResult<()> {
        if amount <= 0 {
            return Err(AppError::BadRequest("refund amount must be positive".into()));
        }
        let result = sqlx::query("UPDATE users SET balance = balance + $2 WHERE id = $1")
            .bind(user_id)
            .bind(amount)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            // Refunding an unknown user means a job record outlived its owner.
            tracing::error!(%user_id, %amount, "refund targeted missing user");
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Same increment, scoped to a caller-owned transaction. Used by the
    /// purchase webhook so the idempotency insert and the credit commit or
    /// roll back together; crediting outside that pairing would let a
    /// recorded purchase and its balance drift apart.
    pub async fn refund_within(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: i32,
        amount: i64,
    ) -> AppResult<()> {
        if amount <= 0 {
            return Err(AppError::BadRequest("refund amount must be positive".into()));
        }
        let result = sqlx::query("UPDATE users SET balance = balance + $2 WHERE id = $1")
            .bind(user_id)
            .bind(amount)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tracing::error!(%user_id, %amount, "credit targeted missing user");
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    pub async fn balance_of(&self, user_id: i32) -> AppResult<i64> {
        let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        balance.ok_or(AppError::NotFound)
    }
}
