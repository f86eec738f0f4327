use axum::{extract::Extension, http::StatusCode};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::invoicing::InvoicingClient;
use crate::ledger::CreditLedger;

/// Verified "credit purchase completed" events from the payment processor.
/// The handler's obligations are exactly: verify the signature, credit the
/// purchase at most once per event id, and kick off invoicing without letting
/// its failure roll back the credit increment.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhookEvent {
    pub event_id: String,
    pub event_type: String,
    #[serde(default)]
    pub data: PaymentEventData,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentEventData {
    pub user_id: Option<i32>,
    pub credits: Option<i64>,
    pub amount_cents: Option<i64>,
    pub description: Option<String>,
}

pub async fn payment_webhook(
    Extension(pool): Extension<PgPool>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> AppResult<StatusCode> {
    verify_signature(&headers, &body)?;

    let event: PaymentWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed webhook payload: {e}")))?;

    if event.event_type != "checkout.completed" {
        // Other event families are acknowledged so the processor stops
        // redelivering them.
        return Ok(StatusCode::ACCEPTED);
    }

    let user_id = event
        .data
        .user_id
        .ok_or_else(|| AppError::BadRequest("checkout event missing user_id".into()))?;
    let credits = event
        .data
        .credits
        .filter(|c| *c > 0)
        .ok_or_else(|| AppError::BadRequest("checkout event missing credits".into()))?;
    let amount_cents = event.data.amount_cents.unwrap_or(0);
    let description = event
        .data
        .description
        .unwrap_or_else(|| format!("{credits} credits"));

    // The idempotency insert and the credit share one transaction: a failure
    // between them rolls the event_id back too, so a redelivery can still
    // apply the purchase instead of finding it recorded-but-uncredited.
    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(
        r#"
        INSERT INTO credit_purchases (event_id, user_id, credits, amount_cents, description)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(&event.event_id)
    .bind(user_id)
    .bind(credits)
    .bind(amount_cents)
    .bind(&description)
    .execute(&mut tx)
    .await?;
    if inserted.rows_affected() == 0 {
        tracing::info!(event_id = %event.event_id, "purchase event already applied");
        return Ok(StatusCode::OK);
    }

    CreditLedger::refund_within(&mut tx, user_id, credits).await?;
    tx.commit().await?;
    tracing::info!(%user_id, %credits, event_id = %event.event_id, "purchase credited");

    // Fire-and-forget: invoicing failure must never roll back the credits.
    if let Some(invoicing) = InvoicingClient::from_env() {
        tokio::spawn(async move {
            if let Err(err) = invoicing.issue(user_id, amount_cents, &description).await {
                tracing::warn!(%user_id, %err, "invoice emission failed");
            }
        });
    }

    Ok(StatusCode::OK)
}

fn verify_signature(headers: &axum::http::HeaderMap, body: &[u8]) -> AppResult<()> {
    let sig_header = headers
        .get("x-payment-signature")
        .ok_or(AppError::BadRequest("missing signature".into()))?;
    let sig = sig_header
        .to_str()
        .map_err(|_| AppError::BadRequest("bad signature header".into()))?;
    let secret = crate::config::PAYMENT_WEBHOOK_SECRET.as_str();
    let expected = {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can use any key length");
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    };
    if expected != sig {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_accepted() {
        std::env::set_var("PAYMENT_WEBHOOK_SECRET", "whsec-test");
        let body = br#"{"event_id":"evt-1"}"#;
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-payment-signature",
            sign("whsec-test", body).parse().unwrap(),
        );
        assert!(verify_signature(&headers, body).is_ok());
    }

    #[test]
    fn tampered_body_rejected() {
        std::env::set_var("PAYMENT_WEBHOOK_SECRET", "whsec-test");
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-payment-signature",
            sign("whsec-test", b"original").parse().unwrap(),
        );
        assert!(verify_signature(&headers, b"tampered").is_err());
    }

    #[test]
    fn missing_signature_rejected() {
        std::env::set_var("PAYMENT_WEBHOOK_SECRET", "whsec-test");
        let headers = HeaderMap::new();
        assert!(verify_signature(&headers, b"{}").is_err());
    }
}
