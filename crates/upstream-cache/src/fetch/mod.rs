//! # Upstream Fetcher
//!
//! One call to the upstream API, classified once at the boundary into a
//! [`FetchOutcome`]. Everything above this module branches on the outcome and
//! never inspects HTTP status codes itself.
//!
//! Fetchers never retry and never touch the cache. Retrying throttled calls is
//! the resolver's job, driven by a [`BackoffSchedule`](crate::BackoffSchedule).

mod client;
mod http;

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;

pub use client::create_client;
pub use http::{FetchTarget, HttpFetcher, UpstreamRequest};

/// Result of exactly one upstream call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 2xx with the raw body
    Success(Bytes),
    /// Upstream asked us to slow down (HTTP 429)
    Throttled(String),
    /// Anything else that went wrong; never masked by cached data
    Failure(FetchFailure),
}

impl FetchOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure(FetchFailure {
            kind,
            message: message.into(),
        })
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Upstream answered 404
    NotFound,
    /// Upstream answered another non-2xx status
    Status(u16),
    /// Connection, timeout or body read error
    Transport,
    /// 2xx body that did not parse
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::NotFound => write!(f, "not found: {}", self.message),
            FailureKind::Status(code) => write!(f, "status {code}: {}", self.message),
            FailureKind::Transport => write!(f, "transport error: {}", self.message),
            FailureKind::Malformed => write!(f, "malformed body: {}", self.message),
        }
    }
}

/// One upstream call for one resource
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self) -> FetchOutcome;
}

/// [`Fetch`] implemented by a closure, see [`from_fn`]
pub struct FetchFn<F>(F);

/// Wrap a closure returning a future of [`FetchOutcome`] as a [`Fetch`]
pub fn from_fn<F, Fut>(f: F) -> FetchFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = FetchOutcome> + Send + 'static,
{
    FetchFn(f)
}

#[async_trait]
impl<F, Fut> Fetch for FetchFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = FetchOutcome> + Send + 'static,
{
    async fn fetch(&self) -> FetchOutcome {
        (self.0)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_fn() {
        let fetch = from_fn(|| async { FetchOutcome::Success(Bytes::from_static(b"{}")) });
        assert_eq!(
            fetch.fetch().await,
            FetchOutcome::Success(Bytes::from_static(b"{}"))
        );
    }

    #[test]
    fn test_failure_display() {
        let failure = FetchFailure {
            kind: FailureKind::Status(500),
            message: "Internal Server Error".into(),
        };
        assert_eq!(failure.to_string(), "status 500: Internal Server Error");
    }
}
