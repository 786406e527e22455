use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use tracing::{debug, warn};
use url::Url;

use crate::config::FetcherConfig;
use crate::fetch::client::create_client;
use crate::fetch::{FailureKind, Fetch, FetchOutcome};

/// Where to fetch one resource from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub url: Url,
    /// Treat a 2xx body that is not valid JSON as malformed
    pub expect_json: bool,
}

impl FetchTarget {
    /// Target whose body must be JSON
    pub fn json(url: Url) -> Self {
        Self {
            url,
            expect_json: true,
        }
    }

    /// Target whose body is passed through untouched
    pub fn raw(url: Url) -> Self {
        Self {
            url,
            expect_json: false,
        }
    }

    pub fn parse_json(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::json(Url::parse(url)?))
    }
}

/// Performs single upstream calls and classifies the response
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: create_client(config)?,
            timeout: config.timeout,
        })
    }

    /// Use an existing client; `timeout` still bounds every call
    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Bind a target to this fetcher so it can be handed to the resolver
    pub fn request(&self, target: FetchTarget) -> UpstreamRequest {
        UpstreamRequest {
            fetcher: self.clone(),
            target,
        }
    }

    /// Perform exactly one GET against `target`
    pub async fn fetch(&self, target: &FetchTarget) -> FetchOutcome {
        let url = &target.url;
        let mut request = self.client.get(url.clone());
        if !self.timeout.is_zero() {
            request = request.timeout(self.timeout);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Upstream request failed");
                return FetchOutcome::failure(FailureKind::Transport, e.to_string());
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let reason = match response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
            {
                Some(retry_after) => format!("{status} (retry-after: {retry_after})"),
                None => status.to_string(),
            };
            warn!(url = %url, reason = %reason, "Upstream throttled");
            return FetchOutcome::Throttled(reason);
        }

        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "Upstream resource not found");
            return FetchOutcome::failure(FailureKind::NotFound, format!("{status} for {url}"));
        }

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Upstream returned an error status");
            return FetchOutcome::failure(
                FailureKind::Status(status.as_u16()),
                format!("{status} for {url}"),
            );
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read upstream body");
                return FetchOutcome::failure(FailureKind::Transport, e.to_string());
            }
        };

        if target.expect_json {
            if let Err(e) = serde_json::from_slice::<serde_json::Value>(&body) {
                warn!(url = %url, error = %e, "Upstream body is not valid JSON");
                return FetchOutcome::failure(FailureKind::Malformed, e.to_string());
            }
        }

        debug!(url = %url, bytes = body.len(), "Fetched upstream resource");
        FetchOutcome::Success(body)
    }
}

/// A target bound to a fetcher, usable wherever a [`Fetch`] is expected
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    fetcher: HttpFetcher,
    target: FetchTarget,
}

impl UpstreamRequest {
    pub fn target(&self) -> &FetchTarget {
        &self.target
    }
}

#[async_trait]
impl Fetch for UpstreamRequest {
    async fn fetch(&self) -> FetchOutcome {
        self.fetcher.fetch(&self.target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetcherConfig::default()).unwrap()
    }

    fn target(server: &MockServer, route: &str) -> FetchTarget {
        FetchTarget::parse_json(&format!("{}{route}", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/standings/2025-11-23"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"standings":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher()
            .fetch(&target(&server, "/v1/standings/2025-11-23"))
            .await;

        assert_eq!(
            outcome,
            FetchOutcome::Success(Bytes::from_static(br#"{"standings":[]}"#))
        );
    }

    #[tokio::test]
    async fn test_429_is_throttled_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher().fetch(&target(&server, "/v1/roster/TOR")).await;

        match outcome {
            FetchOutcome::Throttled(reason) => assert!(reason.contains("retry-after: 30")),
            other => panic!("expected throttled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = fetcher().fetch(&target(&server, "/v1/club/XYZ")).await;
        assert!(matches!(
            outcome,
            FetchOutcome::Failure(ref f) if f.kind == FailureKind::NotFound
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher().fetch(&target(&server, "/v1/schedule")).await;
        assert!(matches!(
            outcome,
            FetchOutcome::Failure(ref f) if f.kind == FailureKind::Status(503)
        ));
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let outcome = fetcher().fetch(&target(&server, "/v1/prospects/TOR")).await;
        assert!(matches!(
            outcome,
            FetchOutcome::Failure(ref f) if f.kind == FailureKind::Malformed
        ));
    }

    #[tokio::test]
    async fn test_raw_target_skips_json_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/news.xml", server.uri())).unwrap();
        let outcome = fetcher().fetch(&FetchTarget::raw(url)).await;
        assert_eq!(outcome, FetchOutcome::Success(Bytes::from_static(b"<rss/>")));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = FetcherConfig {
            timeout: Duration::from_millis(100),
            ..FetcherConfig::default()
        };
        let outcome = HttpFetcher::new(&config)
            .unwrap()
            .fetch(&target(&server, "/slow"))
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failure(ref f) if f.kind == FailureKind::Transport
        ));
    }

    #[tokio::test]
    async fn test_upstream_request_implements_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/club-stats/TOR"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let request = fetcher().request(target(&server, "/v1/club-stats/TOR"));
        let fetch: &dyn Fetch = &request;
        assert_eq!(fetch.fetch().await, FetchOutcome::Success(Bytes::from_static(b"[]")));
    }
}
