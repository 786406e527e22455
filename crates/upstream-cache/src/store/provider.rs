//! # Store Provider
//!
//! The trait every TTL store backend implements.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::store::types::StoreResult;

/// A shared key/value store whose entries expire on their own.
///
/// Every operation is atomic on a single key. No multi-key transactions are
/// required by callers, and values are written last-writer-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the value stored under `key`, `None` if absent or expired
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Check whether `key` currently holds a value
    async fn contains(&self, key: &str) -> StoreResult<bool>;

    /// Remaining lifetime of `key`, `None` if absent or stored without expiry
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> StoreResult<()>;

    /// Store `value` only if `key` is absent. Returns `true` if this call wrote it.
    async fn set_if_absent(&self, key: &str, value: Bytes, ttl: Duration) -> StoreResult<bool>;

    /// Reset the lifetime of `key` to `ttl`, only while it still holds `expected`.
    ///
    /// Returns `false` if the key expired or is held by someone else.
    async fn expire_if_eq(&self, key: &str, expected: &[u8], ttl: Duration) -> StoreResult<bool>;

    /// Delete `key`, only while it still holds `expected`
    async fn delete_if_eq(&self, key: &str, expected: &[u8]) -> StoreResult<bool>;

    /// Delete `key` unconditionally
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Name of the backend, for logs
    fn provider_name(&self) -> &'static str;
}
