//! # Distributed Single-Flight Lock
//!
//! Ensures at most one instance runs a warming cycle at a time. The lock is a
//! single store key holding the owner's token, written with set-if-absent and
//! bounded by a lease TTL so a crashed holder blocks others for at most one
//! lease. While holding it, the owner extends the lease from a background
//! [`LeaseRenewal`] task; if a renewal fails the lock is considered lost and
//! renewal stops for good. Dropping the [`LeaseRenewal`] handle also stops
//! renewal, so an abandoned cycle lets its lease expire.
//!
//! Renew and release only ever act on a lease this instance still owns.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LockConfig;
use crate::error::{ConfigError, LockError};
use crate::store::CacheStore;

#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn CacheStore>,
    config: LockConfig,
    token: String,
}

impl std::fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLock")
            .field("key", &self.config.key)
            .field("token", &self.token)
            .field("lease_ttl", &self.config.lease_ttl)
            .finish()
    }
}

impl DistributedLock {
    /// Create a lock handle with a fresh owner token
    pub fn new(store: Arc<dyn CacheStore>, config: LockConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            token: Uuid::new_v4().to_string(),
        })
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn lease_ttl(&self) -> Duration {
        self.config.lease_ttl
    }

    fn error(&self, operation: &'static str, source: crate::store::StoreError) -> LockError {
        LockError {
            lock_key: self.config.key.clone(),
            operation,
            source,
        }
    }

    /// Try to take the lock. `Ok(false)` means another instance holds it.
    pub async fn try_acquire(&self) -> Result<bool, LockError> {
        let acquired = self
            .store
            .set_if_absent(
                &self.config.key,
                Bytes::from(self.token.clone()),
                self.config.lease_ttl,
            )
            .await
            .map_err(|e| self.error("acquire", e))?;

        if acquired {
            info!(lock_key = %self.config.key, token = %self.token, "Lock acquired");
        } else {
            debug!(lock_key = %self.config.key, "Lock held by another instance");
        }
        Ok(acquired)
    }

    /// Extend the lease. `Ok(false)` means the lease expired or changed hands.
    pub async fn renew(&self) -> Result<bool, LockError> {
        self.store
            .expire_if_eq(
                &self.config.key,
                self.token.as_bytes(),
                self.config.lease_ttl,
            )
            .await
            .map_err(|e| self.error("renew", e))
    }

    /// Give the lock up. `Ok(false)` means this instance no longer held it.
    pub async fn release(&self) -> Result<bool, LockError> {
        let released = self
            .store
            .delete_if_eq(&self.config.key, self.token.as_bytes())
            .await
            .map_err(|e| self.error("release", e))?;

        if released {
            info!(lock_key = %self.config.key, "Lock released");
        } else {
            warn!(lock_key = %self.config.key, "Lock was no longer held at release");
        }
        Ok(released)
    }

    /// Start extending the lease every `renew_interval`.
    ///
    /// `on_lost` is cancelled if a renewal fails, after which the task exits.
    pub fn spawn_renewal(&self, on_lost: CancellationToken) -> LeaseRenewal {
        let lock = self.clone();
        let stop = CancellationToken::new();
        let stop_signal = stop.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(lock.config.renew_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = stop_signal.cancelled() => {
                        debug!(lock_key = %lock.config.key, "Lease renewal stopped");
                        return LeaseStatus::Held;
                    }
                    _ = ticker.tick() => {
                        match lock.renew().await {
                            Ok(true) => {
                                debug!(lock_key = %lock.config.key, "Lease renewed");
                            }
                            Ok(false) => {
                                warn!(lock_key = %lock.config.key, "Lease lost, stopping renewal");
                                on_lost.cancel();
                                return LeaseStatus::Lost;
                            }
                            Err(e) => {
                                warn!(error = %e, "Lease renewal failed, treating lock as lost");
                                on_lost.cancel();
                                return LeaseStatus::Lost;
                            }
                        }
                    }
                }
            }
        });

        LeaseRenewal {
            _stop_on_drop: stop.clone().drop_guard(),
            stop,
            handle,
        }
    }
}

/// State of the lease when its renewal task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseStatus {
    Held,
    Lost,
}

/// Handle to a running renewal task. Dropping it stops the task without
/// waiting for it.
pub struct LeaseRenewal {
    stop: CancellationToken,
    handle: JoinHandle<LeaseStatus>,
    _stop_on_drop: DropGuard,
}

impl std::fmt::Debug for LeaseRenewal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseRenewal")
            .field("stopped", &self.stop.is_cancelled())
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl LeaseRenewal {
    /// Stop renewing and wait for the task to exit
    pub async fn stop(mut self) -> LeaseStatus {
        self.stop.cancel();
        match (&mut self.handle).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Lease renewal task ended abnormally");
                LeaseStatus::Lost
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
