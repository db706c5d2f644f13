use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::model::Release;
use crate::core::error::{UpdaterError, UpdaterResult};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Anything that can answer "what is the newest published release?".
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn get_latest(&self, owner: &str, repo: &str) -> UpdaterResult<Release>;
}

/// Release registry client. Every call is a fresh round trip.
pub struct GitHubReleaseResolver {
    client: Client,
    api_base: String,
}

impl GitHubReleaseResolver {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { client, api_base }
    }

    pub fn latest_release_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}/releases/latest", self.api_base)
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleaseResolver {
    async fn get_latest(&self, owner: &str, repo: &str) -> UpdaterResult<Release> {
        let url = self.latest_release_url(owner, repo);
        info!("Fetching latest release for {}/{}", owner, repo);

        let response = self.client.get(&url).send().await?;
        check_status(&url, response.status())?;

        let body = response.bytes().await?;
        let release: Release =
            serde_json::from_slice(&body).map_err(|source| UpdaterError::Parse {
                url: url.clone(),
                source,
            })?;

        debug!(
            "Latest release {} has {} asset(s)",
            release.tag,
            release.assets.len()
        );
        Ok(release)
    }
}

/// 4xx means nothing is published there; any other failure status is a
/// network-class problem.
pub(crate) fn check_status(url: &str, status: reqwest::StatusCode) -> UpdaterResult<()> {
    if status.is_success() {
        return Ok(());
    }
    if status.is_client_error() {
        return Err(UpdaterError::NotFound {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Err(UpdaterError::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::http::{build_http_client, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(base: &str) -> GitHubReleaseResolver {
        let client = build_http_client(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT).unwrap();
        GitHubReleaseResolver::new(client, base)
    }

    #[test]
    fn latest_url_trims_trailing_slash() {
        let r = resolver("https://api.example.com/");
        assert_eq!(
            r.latest_release_url("DarickBrokaw", "DTO_ML_RevitAddin"),
            "https://api.example.com/repos/DarickBrokaw/DTO_ML_RevitAddin/releases/latest"
        );
    }

    #[tokio::test]
    async fn get_latest_sends_identity_headers_and_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/addin/releases/latest"))
            .and(header("user-agent", "AutoUpdater"))
            .and(header("accept", "application/vnd.github.v3+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v3",
                "assets": [{"name": "a.zip", "browser_download_url": "https://x/a.zip"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let release = resolver(&server.uri()).get_latest("owner", "addin").await.unwrap();
        assert_eq!(release.tag, "v3");
        assert_eq!(release.assets[0].name, "a.zip");
    }

    #[tokio::test]
    async fn missing_release_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = resolver(&server.uri())
            .get_latest("owner", "addin")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn server_error_is_network_class() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = resolver(&server.uri())
            .get_latest("owner", "addin")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"assets\": 12"))
            .mount(&server)
            .await;

        let err = resolver(&server.uri())
            .get_latest("owner", "addin")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
