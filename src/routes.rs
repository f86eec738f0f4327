use axum::{
    routing::{get, post},
    Router,
};

use crate::{auth, jobs, webhooks};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/register", post(auth::register_user))
        .route("/api/login", post(auth::login_user))
        .route("/api/logout", post(auth::logout_user))
        .route("/api/me", get(auth::current_user))
        .route(
            "/api/jobs",
            get(jobs::api::list_jobs).post(jobs::api::submit_job),
        )
        .route("/api/jobs/:id", get(jobs::api::poll_job))
        .route("/api/credits", get(jobs::api::get_balance))
        .route("/api/webhooks/payments", post(webhooks::payment_webhook))
}
