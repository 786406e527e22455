//! # Cache Warmer
//!
//! Periodically fills missing keys so request-path resolves rarely reach
//! upstream. Each cycle runs only on the instance holding the distributed
//! lock:
//!
//! 1. acquire the lock, or skip the cycle
//! 2. start lease renewal
//! 3. ask the [`WarmKeySource`] for the key set
//! 4. skip keys already in the store
//! 5. fetch the rest through the backoff-wrapped resolve, pausing between
//!    entities that needed a fetch
//! 6. stop renewal, then release the lock
//!
//! A key that fails is logged and left for the next cycle. Losing the lock
//! stops upstream calls for the rest of the cycle. A cycle future that is
//! dropped midway stops its renewal and returns the warmer to idle; its lease
//! then expires on its own.

mod source;
pub mod template;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CacheLayerConfig, WarmerConfig};
use crate::error::{ConfigError, ResolveError};
use crate::lock::{DistributedLock, LeaseStatus};
use crate::resolver::Resolver;
use crate::store::CacheStore;

pub use source::{StaticKeySource, WarmKeySource, WarmTarget};
pub use template::{KeyTemplate, TemplateContext, TemplateKeySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmerState {
    Idle,
    Warming,
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another instance held the lock, or the lock could not be checked
    Skipped,
    Completed,
    /// The lease was lost mid-cycle
    LockLost,
    /// Shutdown was requested mid-cycle
    Cancelled,
}

/// Summary of one warming cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub filled: usize,
    pub already_cached: usize,
    pub failed: usize,
}

impl CycleReport {
    fn new(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            filled: 0,
            already_cached: 0,
            failed: 0,
        }
    }
}

pub struct CacheWarmer {
    resolver: Resolver,
    lock: DistributedLock,
    source: Arc<dyn WarmKeySource>,
    config: WarmerConfig,
    state: RwLock<WarmerState>,
}

impl std::fmt::Debug for CacheWarmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWarmer")
            .field("lock", &self.lock)
            .field("config", &self.config)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl CacheWarmer {
    pub fn new(
        resolver: Resolver,
        lock: DistributedLock,
        source: Arc<dyn WarmKeySource>,
        config: WarmerConfig,
    ) -> Self {
        Self {
            resolver,
            lock,
            source,
            config,
            state: RwLock::new(WarmerState::Idle),
        }
    }

    /// Wire resolver, lock and warmer over one shared store
    pub fn from_config(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn WarmKeySource>,
        config: &CacheLayerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = Resolver::new(store.clone(), config.resolver.clone());
        let lock = DistributedLock::new(store, config.lock.clone())?;
        Ok(Self::new(resolver, lock, source, config.warmer.clone()))
    }

    pub fn state(&self) -> WarmerState {
        *self.state.read()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Run a cycle now and then every `period` until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        // interval panics on a zero period
        let period = self.config.period.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period = ?self.config.period, "Cache warmer started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Cache warmer shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.run_cycle(&shutdown).await;
                    info!(
                        outcome = ?report.outcome,
                        filled = report.filled,
                        already_cached = report.already_cached,
                        failed = report.failed,
                        "Warming cycle finished"
                    );
                }
            }
        }
    }

    /// Run a single warming cycle
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> CycleReport {
        if shutdown.is_cancelled() {
            return CycleReport::new(CycleOutcome::Cancelled);
        }

        match self.lock.try_acquire().await {
            Ok(true) => {}
            Ok(false) => {
                info!(lock_key = %self.lock.key(), "Another instance is warming, skipping cycle");
                return CycleReport::new(CycleOutcome::Skipped);
            }
            Err(e) => {
                warn!(error = %e, "Could not check warmer lock, skipping cycle");
                return CycleReport::new(CycleOutcome::Skipped);
            }
        }

        let _warming = StateGuard::enter(&self.state);

        // cancelled on shutdown or when the lease is lost
        let cycle = shutdown.child_token();
        let renewal = self.lock.spawn_renewal(cycle.clone());

        let mut report = self.warm_keys(&cycle).await;

        let lease = renewal.stop().await;
        if let Err(e) = self.lock.release().await {
            warn!(error = %e, "Failed to release warmer lock");
        }

        report.outcome = if shutdown.is_cancelled() {
            CycleOutcome::Cancelled
        } else if lease == LeaseStatus::Lost {
            CycleOutcome::LockLost
        } else {
            CycleOutcome::Completed
        };
        report
    }

    async fn warm_keys(&self, cycle: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::new(CycleOutcome::Completed);

        let targets = match self.source.warm_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate warm targets");
                return report;
            }
        };
        debug!(count = targets.len(), "Warming key set");

        // entity of the last key that went upstream
        let mut last_fetched: Option<Option<String>> = None;
        for target in targets {
            if cycle.is_cancelled() {
                break;
            }
            let key = target.key.as_str();

            match self.needs_fetch(key).await {
                Ok(false) => {
                    report.already_cached += 1;
                    continue;
                }
                Ok(true) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Store check failed, skipping key");
                    report.failed += 1;
                    continue;
                }
            }

            let entity_changed = last_fetched
                .as_ref()
                .is_some_and(|last| *last != target.entity);
            if entity_changed && !self.config.pacing.is_zero() {
                tokio::select! {
                    () = cycle.cancelled() => break,
                    _ = tokio::time::sleep(self.config.pacing) => {}
                }
            }
            last_fetched = Some(target.entity.clone());

            match self
                .resolver
                .resolve_with_backoff(key, target.fetch.as_ref(), &self.config.backoff, cycle)
                .await
            {
                Ok(_) => {
                    debug!(key = %key, "Warmed key");
                    report.filled += 1;
                }
                Err(ResolveError::Cancelled { .. }) => break,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to warm key");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Missing keys always need a fetch; with refresh-ahead, so do keys close to expiry
    async fn needs_fetch(&self, key: &str) -> Result<bool, crate::store::StoreError> {
        let store = self.resolver.store();
        match self.config.refresh_ahead {
            None => Ok(!store.contains(key).await?),
            Some(threshold) => Ok(near_expiry(store.ttl(key).await?, threshold)),
        }
    }
}

/// Marks the warmer busy until dropped
struct StateGuard<'a>(&'a RwLock<WarmerState>);

impl<'a> StateGuard<'a> {
    fn enter(state: &'a RwLock<WarmerState>) -> Self {
        *state.write() = WarmerState::Warming;
        Self(state)
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *self.0.write() = WarmerState::Idle;
    }
}

fn near_expiry(remaining: Option<Duration>, threshold: Duration) -> bool {
    match remaining {
        Some(remaining) => remaining < threshold,
        None => true,
    }
}
