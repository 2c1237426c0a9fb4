use thiserror::Error;

use crate::auth::signing::SigningError;
use crate::session::StoreError;

/// Business errors for the credential core.
///
/// Only in-process callers see the distinct kinds; the RPC facade collapses
/// all of them to one unauthorized status.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("key material could not be parsed: {0}")]
    KeyParse(String),
    #[error("token signing failed: {0}")]
    Sign(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    Expired,
    #[error("session revoked")]
    Revoked,
    #[error("session superseded by a newer login")]
    Superseded,
    #[error("session store error: {0}")]
    Store(StoreError),
    #[error("user not found")]
    UserNotFound,
    #[error("a restore code is already outstanding for this email")]
    CodeAlreadyOutstanding,
    #[error("no restore code outstanding")]
    NoSuchCode,
    #[error("restore code mismatch")]
    CodeMismatch,
    #[error("wrong password")]
    WrongPassword,
    #[error("restore code could not be sent: {0}")]
    SendFailed(String),
    #[error("password could not be persisted: {0}")]
    Persist(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("repository error: {0}")]
    Repository(String),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::KeyParse(_) => 1001,
            AuthError::Sign(_) => 1002,
            AuthError::InvalidToken(_) => 1101,
            AuthError::Expired => 1102,
            AuthError::Revoked => 1103,
            AuthError::Superseded => 1104,
            AuthError::Store(_) => 1200,
            AuthError::UserNotFound => 1301,
            AuthError::CodeAlreadyOutstanding => 1302,
            AuthError::NoSuchCode => 1303,
            AuthError::CodeMismatch => 1304,
            AuthError::SendFailed(_) => 1305,
            AuthError::WrongPassword => 1401,
            AuthError::Persist(_) => 1402,
            AuthError::Validation(_) => 1501,
            AuthError::Repository(_) => 1502,
        }
    }

    /// Whether retrying the same call may succeed. Token errors are terminal
    /// for that token; only cache I/O is transient.
    pub fn is_retriable(&self) -> bool {
        matches!(self, AuthError::Store(_))
    }

    /// True for every kind that means "this token does not authenticate".
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidToken(_) | AuthError::Expired | AuthError::Revoked | AuthError::Superseded
        )
    }
}

impl From<SigningError> for AuthError {
    fn from(e: SigningError) -> Self {
        match e {
            SigningError::KeyParse(msg) => AuthError::KeyParse(msg),
            SigningError::Sign(msg) => AuthError::Sign(msg),
            SigningError::Expired => AuthError::Expired,
            SigningError::BadSignature => AuthError::InvalidToken("bad signature".into()),
            SigningError::Malformed(msg) => AuthError::InvalidToken(msg),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_errors_map_to_token_kinds() {
        assert!(matches!(AuthError::from(SigningError::Expired), AuthError::Expired));
        assert!(matches!(AuthError::from(SigningError::BadSignature), AuthError::InvalidToken(_)));
        assert!(matches!(AuthError::from(SigningError::Malformed("x".into())), AuthError::InvalidToken(_)));
        assert!(matches!(AuthError::from(SigningError::KeyParse("x".into())), AuthError::KeyParse(_)));
    }

    #[test]
    fn only_store_errors_are_retriable() {
        assert!(AuthError::Store(StoreError::Timeout(std::time::Duration::from_millis(5))).is_retriable());
        assert!(!AuthError::Expired.is_retriable());
        assert!(!AuthError::Revoked.is_retriable());
        assert!(AuthError::Superseded.is_token_rejection());
        assert!(!AuthError::Store(StoreError::NotFound).is_token_rejection());
    }
}
