use std::time::Duration;

use reqwest::StatusCode;

use crate::store::StoreError;

/// Why a resolve could not produce any bytes.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Resource not found upstream for {key}: {message}")]
    NotFound { key: String, message: String },

    #[error("Upstream throttled and nothing cached for {key}: {reason}")]
    Throttled { key: String, reason: String },

    #[error("Upstream failed for {key}{}: {message}", status_suffix(.status))]
    Upstream {
        key: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed upstream response for {key}: {message}")]
    Malformed { key: String, message: String },

    #[error("Upstream still throttled for {key} after {attempts} attempts")]
    Exhausted { key: String, attempts: u32 },

    #[error("Store error for {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Resolve of {key} cancelled")]
    Cancelled { key: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {code}"))
        .unwrap_or_default()
}

impl ResolveError {
    /// Key the failed resolve was for
    pub fn key(&self) -> &str {
        match self {
            Self::NotFound { key, .. }
            | Self::Throttled { key, .. }
            | Self::Upstream { key, .. }
            | Self::Malformed { key, .. }
            | Self::Exhausted { key, .. }
            | Self::Store { key, .. }
            | Self::Cancelled { key } => key,
        }
    }

    /// HTTP status a serving layer should answer with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Malformed { .. } => StatusCode::BAD_GATEWAY,
            Self::Throttled { .. }
            | Self::Upstream { .. }
            | Self::Exhausted { .. }
            | Self::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Store failure while operating on a lock lease.
#[derive(Debug, thiserror::Error)]
#[error("Lock {operation} on {lock_key} failed: {source}")]
pub struct LockError {
    pub lock_key: String,
    pub operation: &'static str,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Lease renewal interval {renew_interval:?} must be at most half the lease TTL {lease_ttl:?}")]
    RenewalNotBeforeExpiry {
        renew_interval: Duration,
        lease_ttl: Duration,
    },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("Lock key must not be empty")]
    EmptyLockKey,

    #[error("Invalid key template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },
}

/// Failure to produce the key set at the start of a warming cycle.
#[derive(Debug, thiserror::Error)]
pub enum WarmError {
    #[error("Key source failed: {0}")]
    KeySource(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
