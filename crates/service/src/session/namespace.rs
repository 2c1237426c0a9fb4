use std::future::Future;
use std::time::Duration;

use super::store::{SessionStore, StoreError};

/// Namespace for `userId -> token` session records.
pub const SESSION_NAMESPACE: &str = "jwtToken";
/// Namespace for `email -> code` password-restore codes.
pub const RESTORE_NAMESPACE: &str = "restore";

/// A logical store inside a shared cache.
///
/// Keys are written as `"<namespace>:<logicalKey>"` and every call is bounded
/// by `op_timeout`, surfacing [`StoreError::Timeout`] instead of hanging.
pub struct NamespacedStore<S> {
    inner: S,
    namespace: &'static str,
    op_timeout: Duration,
}

impl<S: SessionStore> NamespacedStore<S> {
    pub fn new(inner: S, namespace: &'static str, op_timeout: Duration) -> Self {
        Self { inner, namespace, op_timeout }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn key(&self, logical: &str) -> String {
        format!("{}:{}", self.namespace, logical)
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.op_timeout))?
    }

    pub async fn set_if_absent(&self, logical: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = self.key(logical);
        self.bounded(self.inner.set_if_absent(&key, value, ttl)).await
    }

    pub async fn put(&self, logical: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = self.key(logical);
        self.bounded(self.inner.put(&key, value, ttl)).await
    }

    pub async fn get(&self, logical: &str) -> Result<String, StoreError> {
        let key = self.key(logical);
        self.bounded(self.inner.get(&key)).await
    }

    pub async fn delete(&self, logical: &str) -> Result<(), StoreError> {
        let key = self.key(logical);
        self.bounded(self.inner.delete(&key)).await
    }
}
