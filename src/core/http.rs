use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_LENGTH};
use reqwest::Client;
use tracing::debug;

const APP_USER_AGENT: &str = concat!("loader-installer/", env!("CARGO_PKG_VERSION"));
const NETWORK_PROBE_URL: &str = "https://google.com";

/// Shared client. `identity` encoding keeps `Content-Length` equal to the
/// number of bytes streamed to disk, which progress math relies on.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .build()
}

/// `Content-Length` read from the raw headers.
///
/// `Response::content_length` reports the body size hint, which is zero for
/// `HEAD` responses, so probes read the header instead.
pub fn header_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Top-level reachability check run before an install starts.
pub async fn check_network(client: &Client, timeout: Duration) -> bool {
    check_network_at(client, NETWORK_PROBE_URL, timeout).await
}

pub async fn check_network_at(client: &Client, url: &str, timeout: Duration) -> bool {
    match client.get(url).timeout(timeout).send().await {
        Ok(_) => true,
        Err(e) => {
            debug!("Network probe to {} failed: {}", url, e);
            false
        }
    }
}
