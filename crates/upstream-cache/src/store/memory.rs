//! # Memory Store
//!
//! In-process store built on Moka with a per-entry expiry policy. It is not
//! shared across processes, so it only fits single-instance deployments and
//! tests; a multi-instance deployment should use the Redis store.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use moka::ops::compute::{CompResult, Op};
use tracing::debug;

use crate::store::provider::CacheStore;
use crate::store::types::StoreResult;

/// Entry in the memory store
#[derive(Clone)]
struct StoredEntry {
    data: Bytes,
    ttl: Duration,
    expires_at: Instant,
}

impl StoredEntry {
    fn new(data: Bytes, ttl: Duration) -> Self {
        Self {
            data,
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }

    fn renewed(self, ttl: Duration) -> Self {
        Self::new(self.data, ttl)
    }

    fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        (self.expires_at > now).then(|| self.expires_at - now)
    }
}

/// Expires every entry after the TTL it was written with
struct PerEntryExpiry;

impl Expiry<String, StoredEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Memory store implementation using Moka
#[derive(Clone)]
pub struct MemoryStore {
    cache: MokaCache<String, StoredEntry>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty memory store
    pub fn new() -> Self {
        let cache = MokaCache::builder().expire_after(PerEntryExpiry).build();
        debug!("Memory store created");
        Self { cache }
    }

    /// Get the entry under `key` if it has not expired yet.
    ///
    /// Moka evicts lazily, so the deadline recorded in the entry is checked as well.
    async fn live_entry(&self, key: &str) -> Option<StoredEntry> {
        self.cache
            .get(key)
            .await
            .filter(|entry| entry.remaining().is_some())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let result = self.live_entry(key).await.map(|entry| entry.data);

        if result.is_some() {
            debug!(key = key, "Store HIT (memory)");
        } else {
            debug!(key = key, "Store MISS (memory)");
        }

        Ok(result)
    }

    async fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.live_entry(key).await.is_some())
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        Ok(self.live_entry(key).await.and_then(|entry| entry.remaining()))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> StoreResult<()> {
        self.cache
            .insert(key.to_string(), StoredEntry::new(value, ttl))
            .await;
        debug!(key = key, ttl_ms = ttl.as_millis() as u64, "Store SET (memory)");
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Bytes, ttl: Duration) -> StoreResult<bool> {
        // An entry past its deadline that Moka has not evicted yet counts as absent.
        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().remaining().is_some() => Op::Nop,
                    _ => Op::Put(StoredEntry::new(value, ttl)),
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(
            result,
            CompResult::Inserted(_) | CompResult::ReplacedWith(_)
        ))
    }

    async fn expire_if_eq(&self, key: &str, expected: &[u8], ttl: Duration) -> StoreResult<bool> {
        let expected = Bytes::copy_from_slice(expected);
        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry)
                        if entry.value().remaining().is_some()
                            && entry.value().data == expected =>
                    {
                        Op::Put(entry.into_value().renewed(ttl))
                    }
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(result, CompResult::ReplacedWith(_)))
    }

    async fn delete_if_eq(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        let expected = Bytes::copy_from_slice(expected);
        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().data == expected => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(result, CompResult::Removed(_)))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.cache.invalidate(key).await;
        debug!(key = key, "Store DEL (memory)");
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn data(content: &str) -> Bytes {
        Bytes::from(content.to_string())
    }

    #[tokio::test]
    async fn test_set_get_hit() {
        let store = MemoryStore::new();
        store
            .set("standings:2025-11-23", data("hello"), Duration::from_secs(60))
            .await
            .unwrap();

        let result = store.get("standings:2025-11-23").await.unwrap();
        assert_eq!(result, Some(data("hello")));
        assert!(store.contains("standings:2025-11-23").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_miss() {
        let store = MemoryStore::new();
        assert!(store.get("non_existent").await.unwrap().is_none());
        assert!(!store.contains("non_existent").await.unwrap());
        assert!(store.ttl("non_existent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_ttl() {
        let store = MemoryStore::new();
        store
            .set("short", data("transient"), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(store.contains("short").await.unwrap());

        sleep(Duration::from_millis(150)).await;

        assert!(store.get("short").await.unwrap().is_none());
        assert!(!store.contains("short").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_reports_remaining_lifetime() {
        let store = MemoryStore::new();
        store
            .set("k", data("v"), Duration::from_secs(3600))
            .await
            .unwrap();

        let remaining = store.ttl("k").await.unwrap().expect("ttl should be set");
        assert!(remaining <= Duration::from_secs(3600));
        assert!(remaining > Duration::from_secs(3590));
    }

    #[tokio::test]
    async fn test_double_set_overwrites_value() {
        let store = MemoryStore::new();
        store
            .set("k", data("value1"), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set("k", data("value2"), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(data("value2")));
    }

    #[tokio::test]
    async fn test_set_if_absent_only_first_writer_wins() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.set_if_absent("lock", data("a"), ttl).await.unwrap());
        assert!(!store.set_if_absent("lock", data("b"), ttl).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap(), Some(data("a")));
    }

    #[tokio::test]
    async fn test_set_if_absent_after_expiry() {
        let store = MemoryStore::new();
        assert!(
            store
                .set_if_absent("lock", data("a"), Duration::from_millis(30))
                .await
                .unwrap()
        );

        sleep(Duration::from_millis(100)).await;

        assert!(
            store
                .set_if_absent("lock", data("b"), Duration::from_secs(60))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_expire_if_eq_checks_owner() {
        let store = MemoryStore::new();
        store
            .set("lock", data("owner"), Duration::from_millis(200))
            .await
            .unwrap();

        assert!(
            !store
                .expire_if_eq("lock", b"intruder", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert!(
            store
                .expire_if_eq("lock", b"owner", Duration::from_secs(60))
                .await
                .unwrap()
        );

        let remaining = store.ttl("lock").await.unwrap().unwrap();
        assert!(remaining > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_expire_if_eq_on_missing_key() {
        let store = MemoryStore::new();
        assert!(
            !store
                .expire_if_eq("lock", b"owner", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert!(!store.contains("lock").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_if_eq_checks_owner() {
        let store = MemoryStore::new();
        store
            .set("lock", data("owner"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(!store.delete_if_eq("lock", b"intruder").await.unwrap());
        assert!(store.contains("lock").await.unwrap());

        assert!(store.delete_if_eq("lock", b"owner").await.unwrap());
        assert!(!store.contains("lock").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_non_existent_key() {
        let store = MemoryStore::new();
        assert!(store.delete("ghost_key").await.is_ok());
    }
}
