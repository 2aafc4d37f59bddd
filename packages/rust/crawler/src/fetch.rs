//! Page download.
//!
//! Fetch failures are never errors for the caller: any non-2xx status, network
//! fault, or timeout is logged and yields an empty body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use citesync_shared::{CitesyncError, FetchConfig, Result};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Source of page HTML for the pipeline.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Download `url`, returning `""` on any failure.
    async fn fetch(&self, url: &str) -> String;
}

/// HTTP page fetcher with a browser-like user agent and a fixed timeout.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher from the `[fetch]` config section.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CitesyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn try_fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CitesyncError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CitesyncError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| CitesyncError::Network(format!("{url}: failed to read body: {e}")))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> String {
        match self.try_fetch(url).await {
            Ok(body) => {
                debug!(bytes = body.len(), "page downloaded");
                body
            }
            Err(e) => {
                warn!(error = %e, "failed to download page");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetchConfig::default()).expect("build fetcher")
    }

    #[tokio::test]
    async fn fetch_returns_body_and_sends_browser_user_agent() {
        let server = MockServer::start().await;
        let ua = FetchConfig::default().user_agent;

        Mock::given(method("GET"))
            .and(path("/p/post"))
            .and(header("user-agent", ua.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetcher().fetch(&format!("{}/p/post", server.uri())).await;
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn fetch_yields_empty_on_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;

        let body = fetcher().fetch(&format!("{}/missing", server.uri())).await;
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn fetch_yields_empty_on_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = FetchConfig {
            timeout_secs: 1,
            ..FetchConfig::default()
        };
        let body = HttpFetcher::new(&config)
            .unwrap()
            .fetch(&format!("{}/slow", server.uri()))
            .await;
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn fetch_yields_empty_on_connection_failure() {
        // Port 9 (discard) on localhost is essentially never listening.
        let body = fetcher().fetch("http://127.0.0.1:9/").await;
        assert!(body.is_empty());
    }
}
