//! # Upstream Cache
//!
//! A cache-aside layer for fronting an aggressively rate-limited HTTP API.
//! It keeps a shared TTL cache populated so that most reads never reach
//! upstream, and serves stale data when upstream throttles.
//!
//! ## Features
//!
//! - Single upstream calls classified into success, throttled and failure
//! - Fixed-table backoff for background fetches
//! - Fresh / stale / unavailable resolution with write-through
//! - Redis-backed or in-process TTL store
//! - Distributed single-flight lock with lease renewal
//! - Periodic cache warmer driven by key templates

pub mod backoff;
pub mod builder;
pub mod config;
pub mod error;
pub mod fetch;
pub mod key;
pub mod lock;
pub mod resolver;
pub mod store;
pub mod warmer;

pub use backoff::{Backoff, BackoffSchedule};
pub use builder::CacheLayerConfigBuilder;
pub use config::{
    CacheLayerConfig, FetcherConfig, LockConfig, RedisConfig, ResolverConfig, WarmerConfig,
};
pub use error::{ConfigError, LockError, ResolveError, WarmError};
pub use fetch::{
    FailureKind, Fetch, FetchFailure, FetchOutcome, FetchTarget, HttpFetcher, UpstreamRequest,
    from_fn,
};
pub use key::CacheKey;
pub use lock::{DistributedLock, LeaseRenewal, LeaseStatus};
pub use resolver::{Resolved, Resolver, Source};
pub use store::{CacheStore, MemoryStore, StoreError, StoreResult};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use warmer::{
    CacheWarmer, CycleOutcome, CycleReport, KeyTemplate, StaticKeySource, TemplateContext,
    TemplateKeySource, WarmKeySource, WarmTarget, WarmerState,
};

// Re-exported so callers can build cancellation trees without a direct dependency
pub use tokio_util::sync::CancellationToken;
