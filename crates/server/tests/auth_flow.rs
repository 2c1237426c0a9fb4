use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use async_trait::async_trait;
use serde_json::{json, Value};
use tower::ServiceExt;

use server::observability::TOKEN_VALIDATIONS_TOTAL;
use server::routes;
use server::state::{AppState, AuthSettings, SharedStore};
use service::auth::domain::{Role, User};
use service::auth::password::hash_password;
use service::auth::repository::mock::MockUserRepository;
use service::auth::SigningMaterial;
use service::mail::mock::RecordingMailer;
use service::session::{MemorySessionStore, SessionStore, StoreError};
use service::verifier::client::VerifierClient;

const PRIVATE_PEM: &[u8] = include_bytes!("../../service/tests/fixtures/es256_private.pem");
const PUBLIC_PEM: &[u8] = include_bytes!("../../service/tests/fixtures/es256_public.pem");

const DOCTOR_EMAIL: &str = "house@clinic.test";
const DOCTOR_PASSWORD: &str = "Vicodin-2004";

struct Harness {
    app: Router,
    mailer: Arc<RecordingMailer>,
}

fn harness() -> Harness {
    harness_with(Arc::new(MemorySessionStore::new()))
}

fn harness_with(store: SharedStore) -> Harness {
    let keys = Arc::new(SigningMaterial::from_pem(PRIVATE_PEM, PUBLIC_PEM).expect("fixture keys"));
    let users = Arc::new(MockUserRepository::with_users([User {
        id: "doc-1".into(),
        email: DOCTOR_EMAIL.into(),
        role: Role::Doctor,
        password_hash: hash_password(DOCTOR_PASSWORD).expect("hash"),
    }]));
    let mailer = Arc::new(RecordingMailer::default());
    let settings = AuthSettings {
        token_lifetime: Duration::from_secs(3600),
        restore_code_lifetime: Duration::from_secs(300),
        store_timeout: Duration::from_secs(2),
    };
    let state = AppState::new(keys, store, users, mailer.clone(), settings);
    let app = routes::build_router(state, tower_http::cors::CorsLayer::very_permissive());
    Harness { app, mailer }
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> anyhow::Result<(StatusCode, Value)> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(serde_json::to_vec(&b)?))?,
        None => req.body(Body::empty())?,
    };

    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, value))
}

async fn login(app: &Router, email: &str, password: &str) -> anyhow::Result<(StatusCode, Value)> {
    send(app, "POST", "/auth/login", None, Some(json!({"email": email, "password": password}))).await
}

async fn login_token(app: &Router) -> anyhow::Result<String> {
    let (status, body) = login(app, DOCTOR_EMAIL, DOCTOR_PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(body["token"].as_str().unwrap_or_default().to_string())
}

/// The mailed code is the first 6-digit run in the body.
fn mailed_code(mailer: &RecordingMailer) -> String {
    let sent = mailer.sent();
    let body = &sent.last().expect("a restore mail").body;
    body.split(|c: char| !c.is_ascii_digit())
        .find(|run| run.len() == 6)
        .expect("code in mail body")
        .to_string()
}

#[tokio::test]
async fn health_and_metrics_are_public() -> anyhow::Result<()> {
    let h = harness();
    let (status, body) = send(&h.app, "GET", "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    login_token(&h.app).await?;
    let resp = h.app.clone().oneshot(Request::builder().uri("/metrics").body(Body::empty())?).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let text = String::from_utf8(axum::body::to_bytes(resp.into_body(), usize::MAX).await?.to_vec())?;
    assert!(text.contains("clinic_auth_tokens_issued_total"));
    Ok(())
}

#[tokio::test]
async fn login_me_logout_flow() -> anyhow::Result<()> {
    let h = harness();
    let (status, body) = login(&h.app, DOCTOR_EMAIL, DOCTOR_PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], "doc-1");
    assert_eq!(body["role"], "doctor");
    let token = body["token"].as_str().unwrap_or_default().to_string();

    let (status, me) = send(&h.app, "GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me, json!({"userId": "doc-1", "role": "doctor"}));

    let (status, _) = send(&h.app, "POST", "/auth/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&h.app, "GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    Ok(())
}

#[tokio::test]
async fn bad_credentials_and_missing_token_are_unauthorized() -> anyhow::Result<()> {
    let h = harness();
    let (status, _) = login(&h.app, DOCTOR_EMAIL, "not-the-password").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&h.app, "nobody@clinic.test", DOCTOR_PASSWORD).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&h.app, "GET", "/auth/me", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&h.app, "GET", "/auth/me", Some("a.b.c"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn second_login_supersedes_first() -> anyhow::Result<()> {
    let h = harness();
    let first = login_token(&h.app).await?;
    let second = login_token(&h.app).await?;
    assert_ne!(first, second);

    let (status, _) = send(&h.app, "GET", "/auth/me", Some(&first), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&h.app, "GET", "/auth/me", Some(&second), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn change_password_requires_old_password() -> anyhow::Result<()> {
    let h = harness();
    let token = login_token(&h.app).await?;

    let wrong = json!({"oldPassword": "guess", "newPassword": "Brand-new-pass"});
    let (status, _) = send(&h.app, "POST", "/auth/password", Some(&token), Some(wrong)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let ok = json!({"oldPassword": DOCTOR_PASSWORD, "newPassword": "Brand-new-pass"});
    let (status, _) = send(&h.app, "POST", "/auth/password", Some(&token), Some(ok)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = login(&h.app, DOCTOR_EMAIL, "Brand-new-pass").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn restore_flow_resets_password() -> anyhow::Result<()> {
    let h = harness();
    let old_token = login_token(&h.app).await?;

    let (status, body) = send(&h.app, "POST", "/auth/restore", None, Some(json!({"email": DOCTOR_EMAIL}))).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);

    let code = mailed_code(&h.mailer);
    let wrong_code = if code == "000000" { "111111" } else { "000000" };

    let confirm = |code: &str| json!({"email": DOCTOR_EMAIL, "code": code, "newPassword": "Restored-pass-1"});
    let (status, _) = send(&h.app, "POST", "/auth/restore/confirm", None, Some(confirm(wrong_code))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // a mismatch leaves the code usable
    let (status, _) = send(&h.app, "POST", "/auth/restore/confirm", None, Some(confirm(&code))).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // single use
    let (status, _) = send(&h.app, "POST", "/auth/restore/confirm", None, Some(confirm(&code))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = login(&h.app, DOCTOR_EMAIL, DOCTOR_PASSWORD).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&h.app, DOCTOR_EMAIL, "Restored-pass-1").await?;
    assert_eq!(status, StatusCode::OK);

    // the pre-restore session was dropped
    let (status, _) = send(&h.app, "GET", "/auth/me", Some(&old_token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn restore_request_conflicts_and_unknown_email() -> anyhow::Result<()> {
    let h = harness();
    let (status, _) = send(&h.app, "POST", "/auth/restore", None, Some(json!({"email": DOCTOR_EMAIL}))).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&h.app, "POST", "/auth/restore", None, Some(json!({"email": DOCTOR_EMAIL}))).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(h.mailer.sent().len(), 1);

    let (status, _) = send(&h.app, "POST", "/auth/restore", None, Some(json!({"email": "ghost@clinic.test"}))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn failed_mail_reports_bad_gateway_and_allows_retry() -> anyhow::Result<()> {
    let h = harness();
    h.mailer.set_failing(true);
    let (status, _) = send(&h.app, "POST", "/auth/restore", None, Some(json!({"email": DOCTOR_EMAIL}))).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    h.mailer.set_failing(false);
    let (status, _) = send(&h.app, "POST", "/auth/restore", None, Some(json!({"email": DOCTOR_EMAIL}))).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    Ok(())
}

#[tokio::test]
async fn rpc_validate_collapses_failures() -> anyhow::Result<()> {
    let h = harness();
    let token = login_token(&h.app).await?;

    let (status, body) = send(&h.app, "POST", "/rpc/validate", None, Some(json!({"token": token}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"statusCode": 200, "userId": "doc-1", "userRole": "doctor"}));

    let unauthorized = json!({"statusCode": 401, "userId": "", "userRole": ""});
    let (status, body) = send(&h.app, "POST", "/rpc/validate", None, Some(json!({"token": "garbage"}))).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, unauthorized);

    let (status, _) = send(&h.app, "POST", "/auth/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&h.app, "POST", "/rpc/validate", None, Some(json!({"token": token}))).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, unauthorized);
    Ok(())
}

#[tokio::test]
async fn verifier_client_over_tcp() -> anyhow::Result<()> {
    let h = harness();
    let token = login_token(&h.app).await?;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = h.app.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = VerifierClient::new(&format!("http://{addr}/"), Duration::from_secs(5))?;
    assert_eq!(client.endpoint(), format!("http://{addr}/rpc/validate"));

    let resp = client.validate(&token).await?;
    assert!(resp.is_authorized());
    assert_eq!(resp.identity().map(|i| i.role), Some(Role::Doctor));

    let resp = client.validate("not-a-token").await?;
    assert!(!resp.is_authorized());
    assert_eq!(resp.identity(), None);
    Ok(())
}

/// Cache that refuses every call.
struct DownStore;

#[async_trait]
impl SessionStore for DownStore {
    async fn set_if_absent(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    async fn put(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    async fn get(&self, _: &str) -> Result<String, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    async fn delete(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

#[tokio::test]
async fn rpc_store_outage_is_unauthorized_and_counted() -> anyhow::Result<()> {
    let token = login_token(&harness().app).await?;
    let down = harness_with(Arc::new(DownStore));

    let before = TOKEN_VALIDATIONS_TOTAL.with_label_values(&["store_error"]).get();
    let (status, body) = send(&down.app, "POST", "/rpc/validate", None, Some(json!({"token": token}))).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"statusCode": 401, "userId": "", "userRole": ""}));
    assert!(TOKEN_VALIDATIONS_TOTAL.with_label_values(&["store_error"]).get() > before);

    // the protected surface reports the outage instead of a rejection
    let (status, _) = send(&down.app, "GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn restore_confirm_with_weak_password_keeps_code() -> anyhow::Result<()> {
    let h = harness();
    let (status, _) = send(&h.app, "POST", "/auth/restore", None, Some(json!({"email": DOCTOR_EMAIL}))).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    let code = mailed_code(&h.mailer);

    let weak = json!({"email": DOCTOR_EMAIL, "code": code, "newPassword": "short"});
    let (status, _) = send(&h.app, "POST", "/auth/restore/confirm", None, Some(weak)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let ok = json!({"email": DOCTOR_EMAIL, "code": code, "newPassword": "Long-enough-1"});
    let (status, _) = send(&h.app, "POST", "/auth/restore/confirm", None, Some(ok)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}
