//! HTTP client for image downloads
//!
//! A thin wrapper over `reqwest` that sends a desktop browser user agent and
//! treats every non-2xx status as a failure.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

use super::asset_downloader::DownloadError;
use super::config::DownloadConfig;

/// HTTP client configuration
#[derive(Debug, Clone, serde::Serialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for HttpClientConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout_seconds: config.timeout_secs,
            follow_redirects: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/avif,image/webp,image/apng,image/*,*/*;q=0.8"),
        );

        // The timeout covers the whole exchange, body included
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()?;

        Ok(Self { client, config })
    }

    /// GET a URL, failing on transport errors and non-success statuses
    pub async fn get(&self, url: &str) -> Result<Response, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| DownloadError::request(url, self.timeout(), source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!("Fetched {} ({})", url, status);
        Ok(response)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_sends_configured_user_agent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/a.jpg").header("user-agent", "test-agent/1.0");
                then.status(200).body("ok");
            })
            .await;

        let client = HttpClient::new(HttpClientConfig {
            user_agent: "test-agent/1.0".to_string(),
            ..Default::default()
        })
        .unwrap();

        let response = client.get(&server.url("/a.jpg")).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/missing.jpg");
                then.status(404);
            })
            .await;

        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        let err = client.get(&server.url("/missing.jpg")).await.unwrap_err();
        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
    }

    #[test]
    fn test_config_follows_download_settings() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout_seconds, 10);
        assert!(config.follow_redirects);
    }
}
