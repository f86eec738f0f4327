use pixelforge::error::AppError;
use pixelforge::ledger::CreditLedger;
use sqlx::PgPool;

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

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn reserve_debits_when_covered(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "ledger-a@example.com", 12).await;

    let ledger = CreditLedger::new(pool);
    ledger.reserve(user_id, 10).await.unwrap();
    assert_eq!(ledger.balance_of(user_id).await.unwrap(), 2);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn reserve_rejects_without_mutation_when_short(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "ledger-b@example.com", 5).await;

    let ledger = CreditLedger::new(pool);
    let err = ledger.reserve(user_id, 10).await.err().unwrap();
    assert!(matches!(err, AppError::InsufficientCredits));
    assert_eq!(ledger.balance_of(user_id).await.unwrap(), 5);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn refund_restores_reserved_credits(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "ledger-c@example.com", 20).await;

    let ledger = CreditLedger::new(pool);
    ledger.reserve(user_id, 10).await.unwrap();
    ledger.refund(user_id, 10).await.unwrap();
    assert_eq!(ledger.balance_of(user_id).await.unwrap(), 20);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn non_positive_amounts_rejected(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "ledger-d@example.com", 20).await;

    let ledger = CreditLedger::new(pool);
    assert!(matches!(
        ledger.reserve(user_id, 0).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        ledger.refund(user_id, -3).await,
        Err(AppError::BadRequest(_))
    ));
    assert_eq!(ledger.balance_of(user_id).await.unwrap(), 20);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn refund_to_unknown_user_fails(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let ledger = CreditLedger::new(pool);
    assert!(matches!(
        ledger.refund(999_999, 10).await,
        Err(AppError::NotFound)
    ));
}

// Balance never goes negative: concurrent reserves each take the conditional
// update path, so exactly floor(balance / amount) of them can win.
#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn concurrent_reserves_never_drive_balance_negative(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "ledger-race@example.com", 100).await;

    let ledger = CreditLedger::new(pool.clone());
    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(
            async move { ledger.reserve(user_id, 30).await },
        ));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 3, "only three reserves of 30 fit in 100");
    let balance = ledger.balance_of(user_id).await.unwrap();
    assert_eq!(balance, 10);
    assert!(balance >= 0);
}
