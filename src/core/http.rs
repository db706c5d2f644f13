use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;

pub const APP_USER_AGENT: &str = "AutoUpdater";
pub const REGISTRY_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared client for registry queries and asset downloads.
///
/// The registry media type goes in the default headers; asset hosts ignore it.
pub fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static(REGISTRY_MEDIA_TYPE));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
}
