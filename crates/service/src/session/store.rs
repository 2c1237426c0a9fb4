use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,
    #[error("key already exists")]
    AlreadyExists,
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Key/value cache with per-key TTL.
///
/// The same contract is served by the in-memory store used in tests and by
/// Redis in production, so token and restore-code logic never needs a live
/// cache to be exercised.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `value` under `key` only if no live entry exists.
    ///
    /// Returns [`StoreError::AlreadyExists`] instead of overwriting.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Store `value` under `key`, atomically replacing any previous entry.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Remove `key`; reports [`StoreError::NotFound`] when nothing was live.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).set_if_absent(key, value, ttl).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).put(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}
