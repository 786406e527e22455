use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::backoff::BackoffSchedule;
use crate::error::ConfigError;

const DEFAULT_USER_AGENT: &str = concat!("upstream-cache/", env!("CARGO_PKG_VERSION"));

/// Default lock key shared by every warmer instance
pub const DEFAULT_LOCK_KEY: &str = "cache-warmer-lock";

/// Options for the upstream HTTP client
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Deadline for one upstream call, including reading the body
    pub timeout: Duration,

    /// Time allowed to establish the connection
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Headers sent with every request
    pub headers: HeaderMap,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: FetcherConfig::get_default_headers(),
        }
    }
}

impl FetcherConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json, */*;q=0.8"),
        );
        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );
        default_headers
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Lifetime of every entry written by a successful fetch
    pub ttl: Duration,

    /// Backoff used by cache-first refills
    pub refill_backoff: BackoffSchedule,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            refill_backoff: BackoffSchedule::background_refill(),
        }
    }
}

/// Distributed lock lease settings
#[derive(Debug, Clone)]
pub struct LockConfig {
    pub key: String,

    /// Lifetime of the lease; bounds how long a crashed holder blocks others
    pub lease_ttl: Duration,

    /// How often the holder extends its lease. At most half of `lease_ttl`,
    /// so one late or slow renewal does not let the lease lapse.
    pub renew_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_LOCK_KEY.to_owned(),
            lease_ttl: Duration::from_secs(15 * 60),
            renew_interval: Duration::from_secs(2 * 60),
        }
    }
}

impl LockConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key.is_empty() {
            return Err(ConfigError::EmptyLockKey);
        }
        if self.renew_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "lock.renew_interval",
            });
        }
        if self.renew_interval.saturating_mul(2) > self.lease_ttl {
            return Err(ConfigError::RenewalNotBeforeExpiry {
                renew_interval: self.renew_interval,
                lease_ttl: self.lease_ttl,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WarmerConfig {
    /// Time between the start of two warming cycles
    pub period: Duration,

    /// Pause between two entities within a cycle, taken only when both
    /// needed an upstream fetch
    pub pacing: Duration,

    /// Backoff applied when a warming fetch is throttled
    pub backoff: BackoffSchedule,

    /// Re-fetch present keys whose remaining TTL dropped below this threshold.
    /// `None` only fills missing keys.
    pub refresh_ahead: Option<Duration>,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10 * 60),
            pacing: Duration::from_secs(5),
            backoff: BackoffSchedule::warming(),
            refresh_ahead: None,
        }
    }
}

/// Settings for a Redis-backed store
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub connect_timeout: Duration,
    /// Deadline for every single store command
    pub operation_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_owned(),
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(2),
        }
    }
}

/// Complete configuration of the cache-aside layer
#[derive(Debug, Clone, Default)]
pub struct CacheLayerConfig {
    pub fetcher: FetcherConfig,
    pub resolver: ResolverConfig,
    pub lock: LockConfig,
    pub warmer: WarmerConfig,
}

impl CacheLayerConfig {
    pub fn builder() -> crate::builder::CacheLayerConfigBuilder {
        crate::builder::CacheLayerConfigBuilder::new()
    }

    /// Check the settings for combinations that cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lock.validate()?;

        if self.fetcher.timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "fetcher.timeout",
            });
        }
        if self.resolver.ttl.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "resolver.ttl",
            });
        }
        if self.warmer.period.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "warmer.period",
            });
        }
        Ok(())
    }
}
