#![cfg(test)]
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::auth::domain::{Role, User};
use crate::auth::password::hash_password;
use crate::auth::signing::SigningMaterial;
use crate::auth::token::{TokenConfig, TokenService};
use crate::session::{MemorySessionStore, SessionStore, StoreError};

const PRIVATE: &[u8] = include_bytes!("../tests/fixtures/es256_private.pem");
const PUBLIC: &[u8] = include_bytes!("../tests/fixtures/es256_public.pem");

// Parsing and the self-check run once for the whole test binary
static KEYS: Lazy<Arc<SigningMaterial>> =
    Lazy::new(|| Arc::new(SigningMaterial::from_pem(PRIVATE, PUBLIC).expect("fixture keys parse")));

pub fn signing_material() -> Arc<SigningMaterial> {
    Arc::clone(&KEYS)
}

pub fn token_service(lifetime: Duration) -> (TokenService<Arc<MemorySessionStore>>, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let cfg = TokenConfig { lifetime, store_timeout: Duration::from_secs(1) };
    (TokenService::new(signing_material(), Arc::clone(&store), cfg), store)
}

/// A user whose password hash is never checked.
pub fn user(id: &str, email: &str, role: Role) -> User {
    User { id: id.into(), email: email.into(), role, password_hash: "unused".into() }
}

pub fn user_with_password(id: &str, email: &str, role: Role, password: &str) -> User {
    User { password_hash: hash_password(password).expect("hash"), ..user(id, email, role) }
}

/// Store whose every call fails with a backend error.
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn set_if_absent(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    async fn put(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    async fn get(&self, _: &str) -> Result<String, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    async fn delete(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}
