//! # Cache-Aside Resolver
//!
//! Decides for every fetch whether the caller gets fresh upstream bytes, a
//! stale copy from the store, or nothing:
//!
//! | Fetch outcome | Store       | Result                          |
//! |---------------|-------------|---------------------------------|
//! | `Success`     | written     | [`Source::Fresh`]               |
//! | `Throttled`   | has value   | [`Source::Stale`]               |
//! | `Throttled`   | empty       | [`ResolveError::Throttled`]     |
//! | `Failure`     | not touched | `NotFound`/`Upstream`/`Malformed` |
//!
//! Reading a stale value never extends its lifetime. Only a successful fetch
//! writes to the store.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::{Backoff, BackoffSchedule};
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::fetch::{FailureKind, Fetch, FetchFailure, FetchOutcome};
use crate::store::CacheStore;

/// Where the returned bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fetched from upstream just now and written through
    Fresh,
    /// Upstream throttled; served from the store
    Stale,
    /// Found in the store without calling upstream
    Cached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub data: Bytes,
    pub source: Source,
}

impl Resolved {
    fn new(data: Bytes, source: Source) -> Self {
        Self { data, source }
    }
}

#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn CacheStore>,
    config: ResolverConfig,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("store", &self.store.provider_name())
            .field("config", &self.config)
            .finish()
    }
}

impl Resolver {
    pub fn new(store: Arc<dyn CacheStore>, config: ResolverConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Request-path resolve: exactly one upstream call, no retries.
    ///
    /// A failed write-through is logged and the fresh bytes are still returned.
    pub async fn resolve(&self, key: &str, fetch: &dyn Fetch) -> Result<Resolved, ResolveError> {
        match fetch.fetch().await {
            FetchOutcome::Success(data) => {
                if let Err(e) = self.store.set(key, data.clone(), self.config.ttl).await {
                    warn!(key = %key, error = %e, "Failed to write fetched value to store");
                }
                debug!(key = %key, bytes = data.len(), "Resolved fresh");
                Ok(Resolved::new(data, Source::Fresh))
            }
            FetchOutcome::Throttled(reason) => self.stale_or_unavailable(key, reason).await,
            FetchOutcome::Failure(failure) => Err(failure_to_error(key, failure)),
        }
    }

    async fn stale_or_unavailable(
        &self,
        key: &str,
        reason: String,
    ) -> Result<Resolved, ResolveError> {
        match self.store.get(key).await {
            Ok(Some(data)) => {
                info!(key = %key, reason = %reason, "Upstream throttled, serving stale value");
                Ok(Resolved::new(data, Source::Stale))
            }
            Ok(None) => {
                warn!(key = %key, reason = %reason, "Upstream throttled and no cached value");
                Err(ResolveError::Throttled {
                    key: key.to_owned(),
                    reason,
                })
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Store read failed while upstream throttled");
                Err(ResolveError::Throttled {
                    key: key.to_owned(),
                    reason,
                })
            }
        }
    }

    /// Background resolve: retry throttled fetches along `schedule`.
    ///
    /// A `Failure` aborts at once. Waiting is abandoned as soon as `cancel`
    /// fires, and no upstream call starts after that.
    pub async fn resolve_with_backoff(
        &self,
        key: &str,
        fetch: &dyn Fetch,
        schedule: &BackoffSchedule,
        cancel: &CancellationToken,
    ) -> Result<Resolved, ResolveError> {
        let mut attempt: u32 = 0;

        loop {
            let delay = match schedule.next_delay(attempt) {
                Backoff::Wait(delay) => delay,
                Backoff::Exhausted => {
                    warn!(key = %key, attempts = attempt, "Backoff exhausted, giving up");
                    return Err(ResolveError::Exhausted {
                        key: key.to_owned(),
                        attempts: attempt,
                    });
                }
            };

            if !delay.is_zero() {
                debug!(key = %key, attempt = attempt, delay = ?delay, "Waiting before retry");
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if cancel.is_cancelled() {
                debug!(key = %key, attempt = attempt, "Resolve cancelled");
                return Err(ResolveError::Cancelled {
                    key: key.to_owned(),
                });
            }

            match fetch.fetch().await {
                FetchOutcome::Success(data) => {
                    self.store
                        .set(key, data.clone(), self.config.ttl)
                        .await
                        .map_err(|source| ResolveError::Store {
                            key: key.to_owned(),
                            source,
                        })?;
                    debug!(key = %key, attempts = attempt + 1, "Resolved fresh after backoff");
                    return Ok(Resolved::new(data, Source::Fresh));
                }
                FetchOutcome::Throttled(reason) => {
                    attempt += 1;
                    warn!(key = %key, attempt = attempt, reason = %reason, "Upstream throttled");
                }
                FetchOutcome::Failure(failure) => {
                    warn!(key = %key, attempt = attempt + 1, error = %failure, "Upstream fetch failed");
                    return Err(failure_to_error(key, failure));
                }
            }
        }
    }

    /// Serve from the store if present, otherwise fetch with the refill backoff.
    pub async fn cached_or_fetch(
        &self,
        key: &str,
        fetch: &dyn Fetch,
        cancel: &CancellationToken,
    ) -> Result<Resolved, ResolveError> {
        match self.store.get(key).await {
            Ok(Some(data)) => return Ok(Resolved::new(data, Source::Cached)),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Store read failed, fetching upstream"),
        }

        self.resolve_with_backoff(key, fetch, &self.config.refill_backoff, cancel)
            .await
    }
}

fn failure_to_error(key: &str, failure: FetchFailure) -> ResolveError {
    let key = key.to_owned();
    match failure.kind {
        FailureKind::NotFound => ResolveError::NotFound {
            key,
            message: failure.message,
        },
        FailureKind::Status(code) => ResolveError::Upstream {
            key,
            status: Some(code),
            message: failure.message,
        },
        FailureKind::Transport => ResolveError::Upstream {
            key,
            status: None,
            message: failure.message,
        },
        FailureKind::Malformed => ResolveError::Malformed {
            key,
            message: failure.message,
        },
    }
}
