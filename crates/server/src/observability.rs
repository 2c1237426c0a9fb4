use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};
use service::auth::domain::Identity;
use service::auth::AuthError;

// Prometheus metrics (default registry)
pub static TOKENS_ISSUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "clinic_auth_tokens_issued_total",
        "Total session tokens issued"
    )
    .expect("register tokens_issued_total")
});

pub static TOKEN_VALIDATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "clinic_auth_token_validations_total",
        "Token validations by outcome",
        &["outcome"]
    )
    .expect("register token_validations_total")
});

pub static LOGIN_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "clinic_auth_login_failures_total",
        "Total rejected logins"
    )
    .expect("register login_failures_total")
});

pub static RESTORE_CODES_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "clinic_auth_restore_codes_sent_total",
        "Total password restore codes dispatched"
    )
    .expect("register restore_codes_sent_total")
});

/// Count a validation as `ok`, `rejected` or `store_error`.
pub fn record_validation(result: &Result<Identity, AuthError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) if e.is_retriable() => "store_error",
        Err(_) => "rejected",
    };
    TOKEN_VALIDATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
