//! Cache-backed key/value storage with per-key TTL.
//!
//! Session records and restore codes live in the same backing cache under
//! different namespaces. All coordination goes through the store's atomic
//! primitives; nothing in this crate holds a lock over session state.

pub mod memory;
pub mod namespace;
pub mod redis;
pub mod store;

pub use memory::MemorySessionStore;
pub use namespace::{NamespacedStore, RESTORE_NAMESPACE, SESSION_NAMESPACE};
pub use self::redis::RedisSessionStore;
pub use store::{SessionStore, StoreError};
