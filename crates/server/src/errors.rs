use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::types::ErrorBody;
use service::auth::AuthError;
use thiserror::Error;
use tracing::error;

/// Code reported for every token rejection; the kind stays in-process.
const TOKEN_REJECTED_CODE: u16 = 1100;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("missing bearer token")]
    MissingToken,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::Auth(e) => match e {
                AuthError::InvalidToken(_)
                | AuthError::Expired
                | AuthError::Revoked
                | AuthError::Superseded
                | AuthError::WrongPassword => StatusCode::UNAUTHORIZED,
                AuthError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::CodeAlreadyOutstanding => StatusCode::CONFLICT,
                AuthError::NoSuchCode | AuthError::CodeMismatch | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::SendFailed(_) => StatusCode::BAD_GATEWAY,
                AuthError::KeyParse(_) | AuthError::Sign(_) | AuthError::Persist(_) | AuthError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::MissingToken => ErrorBody { error: "unauthorized".into(), code: TOKEN_REJECTED_CODE },
            ApiError::Auth(e) if e.is_token_rejection() => {
                ErrorBody { error: "unauthorized".into(), code: TOKEN_REJECTED_CODE }
            }
            ApiError::Auth(e) => ErrorBody { error: e.to_string(), code: e.code() },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("key material rejected: {0}")]
    Keys(String),
    #[error("session store unavailable: {0}")]
    Store(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
