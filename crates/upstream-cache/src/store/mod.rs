//! # TTL Store
//!
//! Key/value storage with per-entry expiry, shared by every process instance.
//! The resolver, the warmer and the distributed lock only ever talk to the
//! [`CacheStore`] trait; the concrete backend is injected at construction.

mod memory;
mod provider;
#[cfg(feature = "redis")]
mod redis;
mod types;

pub use memory::MemoryStore;
pub use provider::CacheStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
pub use types::{StoreError, StoreResult};
