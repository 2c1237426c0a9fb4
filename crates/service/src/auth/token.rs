use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, instrument};

use super::domain::{Claims, Identity, Role};
use super::errors::AuthError;
use super::signing::SigningMaterial;
use crate::session::{NamespacedStore, SessionStore, StoreError, SESSION_NAMESPACE};

/// Token service configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Token validity; also the TTL of the session record.
    pub lifetime: Duration,
    /// Upper bound on each cache call.
    pub store_timeout: Duration,
}

/// Issues, validates and revokes session tokens.
///
/// A token is only accepted when its signature and expiry check out *and* the
/// session record for its user holds exactly that token. The cache is the
/// source of truth for liveness; the signature alone is not sufficient.
///
/// One session per user: issuing a token overwrites the user's record, so any
/// earlier token for that user fails with [`AuthError::Superseded`].
pub struct TokenService<S: SessionStore> {
    keys: Arc<SigningMaterial>,
    sessions: NamespacedStore<S>,
    lifetime: Duration,
}

impl<S: SessionStore> TokenService<S> {
    pub fn new(keys: Arc<SigningMaterial>, store: S, cfg: TokenConfig) -> Self {
        Self {
            keys,
            sessions: NamespacedStore::new(store, SESSION_NAMESPACE, cfg.store_timeout),
            lifetime: cfg.lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a token for `user_id` and record it as the user's only live session.
    ///
    /// If the session write fails the token must be treated as not issued.
    #[instrument(skip(self), fields(user_id = %user_id, role = %role))]
    pub async fn create_token(&self, user_id: &str, role: Role) -> Result<String, AuthError> {
        if user_id.trim().is_empty() {
            return Err(AuthError::Validation("user id must not be empty".into()));
        }

        let now = Utc::now().timestamp();
        let expires_at = i64::try_from(self.lifetime.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(secs))
            .ok_or_else(|| AuthError::Validation(format!("token lifetime {:?} out of range", self.lifetime)))?;
        let claims = Claims { user_id: user_id.to_string(), role, issued_at: now, expires_at };
        let token = self.keys.sign(&claims)?;

        // forced write: last login wins
        self.sessions.put(user_id, &token, self.lifetime).await.map_err(|e| {
            error!(error = %e, "session write failed; token discarded");
            AuthError::Store(e)
        })?;

        info!(expires_at = claims.expires_at, "token_issued");
        Ok(token)
    }

    /// Validate signature, expiry and the session record, in that order.
    #[instrument(skip(self, token))]
    pub async fn validate_token(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.keys.verify(token).map_err(|e| {
            debug!(error = %e, "token rejected by signature/expiry check");
            AuthError::from(e)
        })?;

        match self.sessions.get(&claims.user_id).await {
            Ok(current) if current == token => Ok(Identity { user_id: claims.user_id, role: claims.role }),
            Ok(_) => {
                debug!(user_id = %claims.user_id, "token superseded by newer login");
                Err(AuthError::Superseded)
            }
            Err(StoreError::NotFound) => {
                debug!(user_id = %claims.user_id, "no live session for token");
                Err(AuthError::Revoked)
            }
            Err(e) => {
                // fail closed: never authorize without the session record
                error!(user_id = %claims.user_id, error = %e, "session lookup failed");
                Err(AuthError::Store(e))
            }
        }
    }

    /// Drop the user's session record. Idempotent.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn invalidate_token(&self, user_id: &str) -> Result<(), AuthError> {
        match self.sessions.delete(user_id).await {
            Ok(()) => {
                info!("session_invalidated");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                debug!("no session to invalidate");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "session delete failed");
                Err(AuthError::Store(e))
            }
        }
    }
}
