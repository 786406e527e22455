use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use upstream_cache::{CacheLayerConfig, ConfigError, KeyTemplate, RedisConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Redis connection URL; `REDIS_URL` or `--redis-url` take precedence
    pub redis_url: Option<String>,

    /// Deadline for a single Redis command in milliseconds
    pub redis_timeout_ms: u64,

    /// Deadline for one upstream call in seconds
    pub fetch_timeout_secs: u64,

    /// User agent string for upstream requests
    pub user_agent: Option<String>,

    /// Lifetime of cached entries in seconds
    pub cache_ttl_secs: u64,

    pub lock_key: String,

    /// Lock lease lifetime in seconds
    pub lease_ttl_secs: u64,

    /// Lease renewal interval in seconds, at most half the lease lifetime
    pub renew_interval_secs: u64,

    /// Time between warming cycles in seconds
    pub warm_period_secs: u64,

    /// Pause between entities in a cycle, in seconds
    pub pacing_secs: u64,

    /// Refresh present keys expiring within this many seconds
    pub refresh_ahead_secs: Option<u64>,

    /// Keys to keep warm
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Key template, e.g. `roster:{entity}-{season}`
    pub key: String,

    /// URL template, e.g. `https://api-web.nhle.com/v1/roster/{entity_lower}/{season}`
    pub url: String,

    /// Entities to expand the templates for; empty for a single key
    #[serde(default)]
    pub entities: Vec<String>,

    /// Accept bodies that are not JSON
    #[serde(default)]
    pub raw: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let defaults = CacheLayerConfig::default();
        Self {
            redis_url: None,
            redis_timeout_ms: RedisConfig::default().operation_timeout.as_millis() as u64,
            fetch_timeout_secs: defaults.fetcher.timeout.as_secs(),
            user_agent: None,
            cache_ttl_secs: defaults.resolver.ttl.as_secs(),
            lock_key: defaults.lock.key,
            lease_ttl_secs: defaults.lock.lease_ttl.as_secs(),
            renew_interval_secs: defaults.lock.renew_interval.as_secs(),
            warm_period_secs: defaults.warmer.period.as_secs(),
            pacing_secs: defaults.warmer.pacing.as_secs(),
            refresh_ahead_secs: None,
            targets: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, or defaults when no path is given
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read configuration file {}", path.display())
                })?;
                Self::parse(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration file")
    }

    /// Settings for the cache-aside layer
    pub fn layer_config(&self) -> Result<CacheLayerConfig, ConfigError> {
        let mut builder = CacheLayerConfig::builder()
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .with_lock_key(self.lock_key.clone())
            .with_lease_ttl(Duration::from_secs(self.lease_ttl_secs))
            .with_renew_interval(Duration::from_secs(self.renew_interval_secs))
            .with_warm_period(Duration::from_secs(self.warm_period_secs))
            .with_pacing(Duration::from_secs(self.pacing_secs));

        if let Some(user_agent) = &self.user_agent {
            builder = builder.with_user_agent(user_agent.clone());
        }
        if let Some(secs) = self.refresh_ahead_secs {
            builder = builder.with_refresh_ahead(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Redis settings, with `url_override` taking precedence over the file
    pub fn redis_config(&self, url_override: Option<&str>) -> RedisConfig {
        let mut config = RedisConfig {
            operation_timeout: Duration::from_millis(self.redis_timeout_ms),
            ..RedisConfig::default()
        };
        if let Some(url) = url_override.or(self.redis_url.as_deref()) {
            config.url = url.to_owned();
        }
        config
    }

    pub fn key_templates(&self) -> Vec<KeyTemplate> {
        self.targets
            .iter()
            .map(|target| {
                let mut template = KeyTemplate::new(target.key.clone(), target.url.clone())
                    .with_entities(target.entities.iter().cloned());
                template.expect_json = !target.raw;
                template
            })
            .collect()
    }

    /// Show current configuration as a formatted string
    pub fn show(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
