//! Credential/session core: token issuance and verification, session
//! revocation, and password-restore codes.
//! - Token and restore-code state lives in a TTL cache behind [`session::SessionStore`].
//! - Users and email are collaborators behind traits ([`auth::repository::UserRepository`], [`mail::Mailer`]).
//! - [`verifier`] is the cross-service validation facade.

pub mod auth;
pub mod errors;
pub mod mail;
pub mod session;
pub mod storage;
pub mod verifier;
#[cfg(test)]
pub mod test_support;
