//! # Builder for CacheLayerConfig
//!
//! Fluent construction of a [`CacheLayerConfig`], validated on `build`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use upstream_cache::CacheLayerConfig;
//!
//! let config = CacheLayerConfig::builder()
//!     .with_fetch_timeout(Duration::from_secs(5))
//!     .with_cache_ttl(Duration::from_secs(30 * 60))
//!     .with_lock_key("my-warmer-lock")
//!     .with_warm_period(Duration::from_secs(300))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.lock.key, "my-warmer-lock");
//! ```

use std::time::Duration;

use reqwest::header::HeaderValue;

use crate::backoff::BackoffSchedule;
use crate::config::CacheLayerConfig;
use crate::error::ConfigError;

/// Builder for creating CacheLayerConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct CacheLayerConfigBuilder {
    config: CacheLayerConfig,
}

impl CacheLayerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheLayerConfig::default(),
        }
    }

    /// Set the deadline for one upstream call
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher.connect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.fetcher.user_agent = user_agent.into();
        self
    }

    /// Add a header sent with every upstream request. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.fetcher.headers.insert(name, value);
        }
        self
    }

    /// Set the lifetime of cached entries
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.resolver.ttl = ttl;
        self
    }

    pub fn with_refill_backoff(mut self, schedule: BackoffSchedule) -> Self {
        self.config.resolver.refill_backoff = schedule;
        self
    }

    pub fn with_lock_key(mut self, key: impl Into<String>) -> Self {
        self.config.lock.key = key.into();
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.config.lock.lease_ttl = ttl;
        self
    }

    pub fn with_renew_interval(mut self, interval: Duration) -> Self {
        self.config.lock.renew_interval = interval;
        self
    }

    /// Set the time between two warming cycles
    pub fn with_warm_period(mut self, period: Duration) -> Self {
        self.config.warmer.period = period;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.config.warmer.pacing = pacing;
        self
    }

    pub fn with_warming_backoff(mut self, schedule: BackoffSchedule) -> Self {
        self.config.warmer.backoff = schedule;
        self
    }

    /// Also refresh present keys that expire within `threshold`
    pub fn with_refresh_ahead(mut self, threshold: Duration) -> Self {
        self.config.warmer.refresh_ahead = Some(threshold);
        self
    }

    /// Build the configuration, rejecting invalid combinations
    pub fn build(self) -> Result<CacheLayerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for CacheLayerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
