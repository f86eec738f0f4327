use axum::body::Bytes;
use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;

use pixelforge::ledger::CreditLedger;
use pixelforge::webhooks::payment_webhook;

const SECRET: &str = "whsec-integration";

fn signed_headers(body: &[u8]) -> HeaderMap {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(body);
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-payment-signature",
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
            .parse()
            .unwrap(),
    );
    headers
}

async fn seed_user(pool: &PgPool, email: &str, balance: i64) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO users (email, password_hash, balance) VALUES ($1, 'hashed', $2) RETURNING id",
    )
    .bind(email)
    .bind(balance)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn balance_of(pool: &PgPool, user_id: i32) -> i64 {
    sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn checkout_event_credits_balance(pool: PgPool) {
    std::env::set_var("PAYMENT_WEBHOOK_SECRET", SECRET);
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "wh-a@example.com", 3).await;

    let body = serde_json::json!({
        "event_id": "evt-100",
        "event_type": "checkout.completed",
        "data": {"user_id": user_id, "credits": 50, "amount_cents": 999, "description": "starter pack"}
    })
    .to_string();
    let status = payment_webhook(
        Extension(pool.clone()),
        signed_headers(body.as_bytes()),
        Bytes::from(body),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance_of(&pool, user_id).await, 53);
}

// Redelivered events hit the event_id uniqueness and credit nothing more.
#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn redelivered_event_credits_once(pool: PgPool) {
    std::env::set_var("PAYMENT_WEBHOOK_SECRET", SECRET);
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "wh-b@example.com", 0).await;

    let body = serde_json::json!({
        "event_id": "evt-200",
        "event_type": "checkout.completed",
        "data": {"user_id": user_id, "credits": 20}
    })
    .to_string();

    for _ in 0..3 {
        payment_webhook(
            Extension(pool.clone()),
            signed_headers(body.as_bytes()),
            Bytes::from(body.clone()),
        )
        .await
        .unwrap();
    }
    assert_eq!(balance_of(&pool, user_id).await, 20);
}

// The purchase row and the balance credit share one transaction: rolling it
// back leaves neither behind, so a failure between the two statements cannot
// strand an event as recorded-but-uncredited.
#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn purchase_record_and_credit_roll_back_together(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "wh-e@example.com", 5).await;

    let mut tx = pool.begin().await.unwrap();
    sqlx::query(
        r#"
        INSERT INTO credit_purchases (event_id, user_id, credits, amount_cents, description)
        VALUES ('evt-500', $1, 30, 499, 'rolled back')
        ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .execute(&mut tx)
    .await
    .unwrap();
    CreditLedger::refund_within(&mut tx, user_id, 30).await.unwrap();
    tx.rollback().await.unwrap();

    let recorded: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM credit_purchases WHERE event_id = 'evt-500'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(recorded, 0);
    assert_eq!(balance_of(&pool, user_id).await, 5);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn bad_signature_is_rejected_without_credit(pool: PgPool) {
    std::env::set_var("PAYMENT_WEBHOOK_SECRET", SECRET);
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "wh-c@example.com", 0).await;

    let body = serde_json::json!({
        "event_id": "evt-300",
        "event_type": "checkout.completed",
        "data": {"user_id": user_id, "credits": 20}
    })
    .to_string();
    let mut headers = HeaderMap::new();
    headers.insert("x-payment-signature", "sha256=deadbeef".parse().unwrap());

    let result = payment_webhook(Extension(pool.clone()), headers, Bytes::from(body)).await;
    assert!(result.is_err());
    assert_eq!(balance_of(&pool, user_id).await, 0);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn unrelated_events_are_acknowledged(pool: PgPool) {
    std::env::set_var("PAYMENT_WEBHOOK_SECRET", SECRET);
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let body = serde_json::json!({
        "event_id": "evt-400",
        "event_type": "customer.updated",
        "data": {}
    })
    .to_string();
    let status = payment_webhook(
        Extension(pool.clone()),
        signed_headers(body.as_bytes()),
        Bytes::from(body),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::ACCEPTED);

    let purchases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credit_purchases")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(purchases, 0);
}
