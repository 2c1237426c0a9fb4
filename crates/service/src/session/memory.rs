use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::store::{SessionStore, StoreError};

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Instant,
}

impl Slot {
    fn new(value: &str, ttl: Duration) -> Result<Self, StoreError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| StoreError::Backend(format!("ttl {ttl:?} out of range")))?;
        Ok(Self { value: value.to_string(), expires_at })
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Writes between opportunistic sweeps of expired entries.
const PURGE_EVERY: usize = 256;

/// In-process TTL map. Expired entries are dropped lazily on access and
/// swept every [`PURGE_EVERY`] writes.
///
/// Shard-level locking in [`DashMap`] makes create-if-absent and overwrite
/// atomic per key, matching what Redis `SET NX` / `SET` give the other backend.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, Slot>,
    writes: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    fn after_write(&self) {
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY == 0 {
            self.purge_expired();
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let slot = Slot::new(value, ttl)?;
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Err(StoreError::AlreadyExists);
                }
                occupied.insert(slot);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }
        self.after_write();
        Ok(())
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let slot = Slot::new(value, ttl)?;
        self.entries.insert(key.to_string(), slot);
        self.after_write();
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let now = Instant::now();
        let found = self
            .entries
            .get(key)
            .map(|slot| slot.is_live(now).then(|| slot.value.clone()));
        match found {
            Some(Some(value)) => Ok(value),
            Some(None) => {
                self.entries.remove_if(key, |_, slot| !slot.is_live(now));
                Err(StoreError::NotFound)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        match self.entries.remove(key) {
            Some((_, slot)) if slot.is_live(now) => Ok(()),
            _ => Err(StoreError::NotFound),
        }
    }
}
