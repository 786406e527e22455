use reqwest::Client;
use tracing::debug;

use crate::config::FetcherConfig;

/// Create the HTTP client shared by every upstream call
pub fn create_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(reqwest::redirect::Policy::limited(10));

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    debug!(
        timeout = ?config.timeout,
        connect_timeout = ?config.connect_timeout,
        "Upstream HTTP client created"
    );

    client_builder.build()
}
