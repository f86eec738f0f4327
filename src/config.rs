use once_cell::sync::Lazy;

/// Secret used for JWT signing. Must be set via the `JWT_SECRET` env variable.
pub static JWT_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"));

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// Credits granted to a freshly registered account. Defaults to `0`.
pub static SIGNUP_CREDIT_GRANT: Lazy<i64> = Lazy::new(|| {
    std::env::var("SIGNUP_CREDIT_GRANT")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(0)
});

/// Shared secret used to verify payment webhook signatures.
pub static PAYMENT_WEBHOOK_SECRET: Lazy<String> = Lazy::new(|| {
    std::env::var("PAYMENT_WEBHOOK_SECRET").expect("PAYMENT_WEBHOOK_SECRET must be set")
});

/// Base URL of the multimodal content API (image edits).
pub static MULTIMODAL_API_URL: Lazy<String> = Lazy::new(|| {
    read_optional_env("MULTIMODAL_API_URL")
        .unwrap_or_else(|| "https://api.multimodal.example".to_string())
});

/// Base URL of the long-video generation API.
pub static VIDEO_API_URL: Lazy<String> = Lazy::new(|| {
    read_optional_env("VIDEO_API_URL")
        .unwrap_or_else(|| "https://api.video.example".to_string())
});

/// Base URL of the prediction-polling API (texture changes).
pub static PREDICTION_API_URL: Lazy<String> = Lazy::new(|| {
    read_optional_env("PREDICTION_API_URL")
        .unwrap_or_else(|| "https://api.prediction.example".to_string())
});

/// API key presented to the prediction-polling provider.
pub static PREDICTION_API_KEY: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("PREDICTION_API_KEY"));

/// OAuth token endpoint for the multimodal/video provider family.
pub static UPSTREAM_TOKEN_URL: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("UPSTREAM_TOKEN_URL"));

/// Client credentials for the upstream token endpoint.
pub static UPSTREAM_CLIENT_ID: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("UPSTREAM_CLIENT_ID"));

pub static UPSTREAM_CLIENT_SECRET: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("UPSTREAM_CLIENT_SECRET"));

/// Static bearer token fallback when no token endpoint is configured.
pub static UPSTREAM_STATIC_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("UPSTREAM_STATIC_TOKEN"));

/// Base URL of the invoicing side-channel. Invoicing is skipped when unset.
pub static INVOICING_API_URL: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("INVOICING_API_URL"));

/// Optional API key for the invoicing service.
pub static INVOICING_API_KEY: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("INVOICING_API_KEY"));

/// Optional stale-job policy: a `processing` job older than this many hours is
/// force-failed (and refunded) on the next poll. Unset disables the policy and
/// such jobs stay `processing` indefinitely.
pub static JOB_STALE_AFTER_HOURS: Lazy<Option<i64>> = Lazy::new(|| {
    std::env::var("JOB_STALE_AFTER_HOURS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value > 0)
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
