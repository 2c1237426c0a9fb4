use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::errors::ApiError;
use crate::observability::record_validation;
use crate::state::AppState;

/// Read `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Route layer for endpoints that need a live session. On success the
/// caller's [`service::auth::domain::Identity`] is placed in request extensions.
pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(req.headers()) else {
        debug!(path = %req.uri().path(), "missing bearer token");
        return Err(ApiError::MissingToken);
    };

    let result = state.tokens.validate_token(&token).await;
    record_validation(&result);
    let identity = result?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
