use axum::{extract::State, http::StatusCode, Json};

use service::verifier::{ValidateRequest, ValidateResponse};

use crate::observability::record_validation;
use crate::state::AppState;

/// `POST /rpc/validate`. The HTTP status mirrors `statusCode` in the body.
pub async fn validate(State(state): State<AppState>, Json(req): Json<ValidateRequest>) -> (StatusCode, Json<ValidateResponse>) {
    let outcome = state.verifier.check(&req.token).await;
    record_validation(&outcome);
    let resp = ValidateResponse::from_outcome(&outcome);

    let status = StatusCode::from_u16(resp.status_code).unwrap_or(StatusCode::UNAUTHORIZED);
    (status, Json(resp))
}
