pub mod airports;
pub mod detail;
pub mod feed;
pub mod flights;

use std::time::Duration;

use reqwest::Client;

/// Upper bound for any single upstream request
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

const USER_AGENT: &str = concat!("avinor-backend/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client used by the feed and detail clients.
pub fn build_http_client(timeout: Duration) -> crate::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| crate::Error::Connection {
            url: String::new(),
            cause: e,
        })
}
