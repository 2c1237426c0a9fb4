//! Cross-service token verification.
//!
//! Other services never parse tokens themselves; they send them here and get
//! back a status plus identity. Every failure kind collapses to the same
//! unauthorized answer so the wire cannot be used as an oracle for session
//! state (expired vs. revoked vs. malformed look identical).

pub mod client;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::auth::domain::{Identity, Role};
use crate::auth::errors::AuthError;
use crate::auth::token::TokenService;
use crate::session::SessionStore;

pub use client::{ClientError, VerifierClient};

pub const STATUS_OK: u16 = 200;
pub const STATUS_UNAUTHORIZED: u16 = 401;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub status_code: u16,
    pub user_id: String,
    pub user_role: String,
}

impl ValidateResponse {
    pub fn authorized(identity: Identity) -> Self {
        Self { status_code: STATUS_OK, user_id: identity.user_id, user_role: identity.role.to_string() }
    }

    pub fn unauthorized() -> Self {
        Self { status_code: STATUS_UNAUTHORIZED, user_id: String::new(), user_role: String::new() }
    }

    pub fn is_authorized(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// Collapse a validation result to its wire form.
    pub fn from_outcome(outcome: &Result<Identity, AuthError>) -> Self {
        match outcome {
            Ok(identity) => Self::authorized(identity.clone()),
            Err(_) => Self::unauthorized(),
        }
    }

    /// The identity carried by an authorized response.
    pub fn identity(&self) -> Option<Identity> {
        if !self.is_authorized() {
            return None;
        }
        let role: Role = self.user_role.parse().ok()?;
        Some(Identity { user_id: self.user_id.clone(), role })
    }
}

/// In-process side of the RPC: wraps [`TokenService::validate_token`].
pub struct RemoteVerifier<S: SessionStore> {
    tokens: Arc<TokenService<S>>,
}

impl<S: SessionStore> RemoteVerifier<S> {
    pub fn new(tokens: Arc<TokenService<S>>) -> Self {
        Self { tokens }
    }

    pub async fn validate(&self, token: &str) -> ValidateResponse {
        ValidateResponse::from_outcome(&self.check(token).await)
    }

    /// Validate and keep the failure kind for server-side accounting. The
    /// kind must not reach the caller of the RPC.
    #[instrument(skip_all)]
    pub async fn check(&self, token: &str) -> Result<Identity, AuthError> {
        let outcome = self.tokens.validate_token(token).await;
        match &outcome {
            Err(e) if e.is_retriable() => error!(error = %e, "remote validation failed on session store; denying"),
            Err(e) => debug!(code = e.code(), "remote validation rejected token"),
            Ok(_) => {}
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::auth::token::TokenConfig;
    use crate::test_support::{signing_material, token_service, FailingStore};

    #[tokio::test]
    async fn valid_token_yields_identity() -> Result<(), anyhow::Error> {
        let (svc, _) = token_service(Duration::from_secs(60));
        let svc = Arc::new(svc);
        let token = svc.create_token("u1", Role::Doctor).await?;

        let resp = RemoteVerifier::new(Arc::clone(&svc)).validate(&token).await;
        assert_eq!(resp, ValidateResponse { status_code: 200, user_id: "u1".into(), user_role: "doctor".into() });
        assert_eq!(resp.identity(), Some(Identity { user_id: "u1".into(), role: Role::Doctor }));
        Ok(())
    }

    #[tokio::test]
    async fn every_failure_looks_the_same() -> Result<(), anyhow::Error> {
        let (svc, _) = token_service(Duration::from_secs(60));
        let svc = Arc::new(svc);
        let verifier = RemoteVerifier::new(Arc::clone(&svc));

        let superseded = svc.create_token("a", Role::Patient).await?;
        svc.create_token("a", Role::Patient).await?;
        let revoked = svc.create_token("b", Role::Patient).await?;
        svc.invalidate_token("b").await?;

        let responses = [
            verifier.validate("garbage").await,
            verifier.validate(&superseded).await,
            verifier.validate(&revoked).await,
        ];
        for resp in responses {
            assert_eq!(resp, ValidateResponse::unauthorized());
            assert!(resp.identity().is_none());
        }
        Ok(())
    }

    #[tokio::test]
    async fn store_failure_collapses_to_unauthorized() -> Result<(), anyhow::Error> {
        let (healthy, _) = token_service(Duration::from_secs(60));
        let token = healthy.create_token("u1", Role::Doctor).await?;

        let cfg = TokenConfig { lifetime: Duration::from_secs(60), store_timeout: Duration::from_secs(1) };
        let broken = Arc::new(TokenService::new(signing_material(), FailingStore, cfg));
        let verifier = RemoteVerifier::new(broken);

        let outcome = verifier.check(&token).await;
        assert!(matches!(outcome, Err(AuthError::Store(_))));
        assert_eq!(verifier.validate(&token).await, ValidateResponse::unauthorized());
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_collapses_to_unauthorized() -> Result<(), anyhow::Error> {
        let (svc, _) = token_service(Duration::from_secs(1));
        let svc = Arc::new(svc);
        let token = svc.create_token("u1", Role::Patient).await?;
        tokio::time::sleep(Duration::from_millis(2100)).await;

        let verifier = RemoteVerifier::new(Arc::clone(&svc));
        assert!(matches!(verifier.check(&token).await, Err(AuthError::Expired)));
        assert_eq!(verifier.validate(&token).await, ValidateResponse::unauthorized());
        Ok(())
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(ValidateResponse::unauthorized()).unwrap();
        assert_eq!(json, serde_json::json!({"statusCode": 401, "userId": "", "userRole": ""}));
    }
}
