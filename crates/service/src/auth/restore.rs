//! One-time password-restore codes.
//!
//! A code is a 6-digit number stored under `restore:<email>` with a short
//! TTL. Only one code may be outstanding per email: a second request fails
//! rather than replacing the first, so re-requesting cannot invalidate a
//! restore already in flight.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::Rng;
use tracing::{debug, error, info, instrument, warn};

use super::domain::User;
use super::errors::AuthError;
use super::repository::UserRepository;
use crate::mail::Mailer;
use crate::session::{NamespacedStore, SessionStore, StoreError, RESTORE_NAMESPACE};

pub const CODE_DIGITS: u32 = 6;
pub const RESTORE_SUBJECT: &str = "Password restore code";

#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub code_lifetime: Duration,
    pub store_timeout: Duration,
}

pub struct RestoreCodeFlow<S: SessionStore, U: ?Sized, M: ?Sized> {
    codes: NamespacedStore<S>,
    users: Arc<U>,
    mailer: Arc<M>,
    code_lifetime: Duration,
}

/// Uniformly random, zero padded, `CODE_DIGITS` wide.
pub fn generate_code() -> String {
    let upper = 10u32.pow(CODE_DIGITS);
    let n: u32 = OsRng.gen_range(0..upper);
    format!("{:0width$}", n, width = CODE_DIGITS as usize)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Constant-time comparison to avoid leaking how many leading digits matched.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

impl<S, U, M> RestoreCodeFlow<S, U, M>
where
    S: SessionStore,
    U: UserRepository + ?Sized,
    M: Mailer + ?Sized,
{
    pub fn new(store: S, users: Arc<U>, mailer: Arc<M>, cfg: RestoreConfig) -> Self {
        Self {
            codes: NamespacedStore::new(store, RESTORE_NAMESPACE, cfg.store_timeout),
            users,
            mailer,
            code_lifetime: cfg.code_lifetime,
        }
    }

    /// Generate, store and mail a restore code for `email`.
    ///
    /// If mailing fails the stored code is removed again so the user is not
    /// locked out until it expires.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn send_restore_code(&self, email: &str) -> Result<String, AuthError> {
        let key = normalize_email(email);
        let user = self.users.find_by_email(&key).await?.ok_or_else(|| {
            debug!("restore requested for unknown email");
            AuthError::UserNotFound
        })?;

        let code = generate_code();
        match self.codes.set_if_absent(&key, &code, self.code_lifetime).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => {
                warn!(user_id = %user.id, "restore code already outstanding");
                return Err(AuthError::CodeAlreadyOutstanding);
            }
            Err(e) => {
                error!(error = %e, "restore code write failed");
                return Err(AuthError::Store(e));
            }
        }

        let body = format!(
            "Your password restore code is {code}. It expires in {} minutes.",
            (self.code_lifetime.as_secs() / 60).max(1)
        );
        if let Err(e) = self.mailer.send(&user.email, RESTORE_SUBJECT, &body).await {
            error!(user_id = %user.id, error = %e, "restore mail failed; rolling back code");
            if let Err(rollback) = self.codes.delete(&key).await {
                error!(error = %rollback, "restore code rollback failed");
            }
            return Err(AuthError::SendFailed(e.to_string()));
        }

        info!(user_id = %user.id, "restore_code_sent");
        Ok(code)
    }

    /// Check `code` against the outstanding code for `email`.
    ///
    /// Leaves the code in place either way; callers delete it with
    /// [`Self::delete_code`] once they have acted on a successful match.
    #[instrument(skip(self, code), fields(email = %email))]
    pub async fn authenticate(&self, email: &str, code: &str) -> Result<User, AuthError> {
        let key = normalize_email(email);
        let stored = match self.codes.get(&key).await {
            Ok(stored) => stored,
            Err(StoreError::NotFound) => return Err(AuthError::NoSuchCode),
            Err(e) => return Err(AuthError::Store(e)),
        };

        if !constant_time_eq(stored.as_bytes(), code.trim().as_bytes()) {
            warn!("restore code mismatch");
            return Err(AuthError::CodeMismatch);
        }

        self.users.find_by_email(&key).await?.ok_or(AuthError::UserNotFound)
    }

    /// Remove the outstanding code for `email`; a missing code is not an error.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn delete_code(&self, email: &str) -> Result<(), AuthError> {
        match self.codes.delete(&normalize_email(email)).await {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(AuthError::Store(e)),
        }
    }
}
