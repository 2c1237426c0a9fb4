use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use service::auth::domain::{AuthSession, Identity, LoginInput, Role};
use service::auth::password::validate_password_strength;
use service::auth::AuthError;

use crate::errors::ApiError;
use crate::observability::{LOGIN_FAILURES_TOTAL, RESTORE_CODES_SENT_TOTAL, TOKENS_ISSUED_TOTAL};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeOutput {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequestInput {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreConfirmInput {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

pub async fn login(State(state): State<AppState>, Json(input): Json<LoginInput>) -> Result<Json<AuthSession>, ApiError> {
    let user = state.credentials.verify_credentials(&input.email, &input.password).await.map_err(|e| {
        LOGIN_FAILURES_TOTAL.inc();
        e
    })?;
    let token = state.tokens.create_token(&user.id, user.role).await?;
    TOKENS_ISSUED_TOTAL.inc();
    Ok(Json(AuthSession { user_id: user.id, role: user.role, token }))
}

pub async fn logout(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> Result<StatusCode, ApiError> {
    state.tokens.invalidate_token(&identity.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(Extension(identity): Extension<Identity>) -> Json<MeOutput> {
    Json(MeOutput { user_id: identity.user_id, role: identity.role })
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(input): Json<ChangePasswordInput>,
) -> Result<StatusCode, ApiError> {
    state
        .credentials
        .change_password(&identity.user_id, &input.old_password, &input.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The code only travels by mail; the response never contains it.
pub async fn request_restore(State(state): State<AppState>, Json(input): Json<RestoreRequestInput>) -> Result<StatusCode, ApiError> {
    state.restore.send_restore_code(&input.email).await?;
    RESTORE_CODES_SENT_TOTAL.inc();
    Ok(StatusCode::ACCEPTED)
}

/// Authenticate by code, burn the code, then set the new password.
///
/// A new password that fails the strength check is rejected before the code
/// is looked at, so the code stays usable. Once matched, the code is deleted
/// before the password write, so a failed write still leaves it unusable.
/// Existing sessions are dropped once the password has changed.
pub async fn confirm_restore(State(state): State<AppState>, Json(input): Json<RestoreConfirmInput>) -> Result<StatusCode, ApiError> {
    validate_password_strength(&input.new_password).map_err(AuthError::Validation)?;
    let user = state.restore.authenticate(&input.email, &input.code).await?;

    if let Err(e) = state.restore.delete_code(&input.email).await {
        warn!(user_id = %user.id, error = %e, "restore code cleanup failed");
    }

    state.credentials.set_new_password(&user.id, &input.new_password).await?;

    match state.tokens.invalidate_token(&user.id).await {
        Ok(()) => {}
        Err(AuthError::Store(e)) => warn!(user_id = %user.id, error = %e, "could not drop sessions after restore"),
        Err(e) => return Err(e.into()),
    }
    info!(user_id = %user.id, "password_restore_completed");
    Ok(StatusCode::NO_CONTENT)
}
