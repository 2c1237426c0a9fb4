use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

use super::{ValidateRequest, ValidateResponse};

/// Path of the validation RPC on the auth server.
pub const VALIDATE_PATH: &str = "/rpc/validate";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The auth server could not be reached or answered out of contract.
    /// Callers may retry; they must not treat this as authorized.
    #[error("verifier transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Client used by other services' authorization middleware.
#[derive(Clone)]
pub struct VerifierClient {
    http: reqwest::Client,
    endpoint: String,
}

impl VerifierClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), VALIDATE_PATH);
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn validate(&self, token: &str) -> Result<ValidateResponse, ClientError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&ValidateRequest { token: token.to_string() })
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => {
                let body: ValidateResponse = resp.json().await?;
                if body.is_authorized() {
                    Ok(body)
                } else {
                    Ok(ValidateResponse::unauthorized())
                }
            }
            StatusCode::UNAUTHORIZED => Ok(ValidateResponse::unauthorized()),
            other => {
                warn!(status = %other, endpoint = %self.endpoint, "verifier answered out of contract");
                Err(ClientError::Transport(format!("unexpected status {other}")))
            }
        }
    }
}
