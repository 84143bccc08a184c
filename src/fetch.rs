//! HTTP fetching with a browser-like header set, timeout, and retry.
//!
//! The [`Fetcher`] owns the shared `reqwest` client. Any non-2xx status
//! or transport error is an error; failed requests are re-attempted with
//! a linearly growing delay, up to the configured retry count.

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

use crate::config::NetworkConfig;
use crate::error::ScrapeError;

/// HTTP fetcher shared by all pipeline stages.
pub struct Fetcher {
    client: reqwest::Client,
    retries: u32,
    retry_delay: Duration,
}

impl Fetcher {
    /// Builds a client with the default desktop-browser header set.
    ///
    /// Per-request headers (e.g. Referer on image downloads) override
    /// these defaults on key collision.
    pub fn new(config: &NetworkConfig) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()?;

        Ok(Self {
            client,
            retries: config.retries,
            retry_delay: Duration::from_secs(config.retry_delay_sec),
        })
    }

    /// Fetches a page and returns its body as text.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.get_with_retry(url, None).await?;
        Ok(response.text().await?)
    }

    /// Fetches a binary resource, returning its bytes and declared
    /// content type. The referer, when given, is sent with the request.
    pub async fn fetch_bytes(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<(Bytes, Option<String>), ScrapeError> {
        let response = self.get_with_retry(url, referer).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok((response.bytes().await?, content_type))
    }

    async fn get_with_retry(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<reqwest::Response, ScrapeError> {
        let mut attempt = 0u32;
        loop {
            match self.try_get(url, referer).await {
                Ok(response) => return Ok(response),
                Err(_) if attempt < self.retries => {
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<reqwest::Response, ScrapeError> {
        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(header::REFERER, referer);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ScrapeError::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> NetworkConfig {
        NetworkConfig {
            retry_delay_sec: 0,
            ..NetworkConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config()).unwrap();
        let body = fetcher
            .fetch_html(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>hi</html>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config()).unwrap();
        let result = fetcher
            .fetch_html(&format!("{}/missing", server.uri()))
            .await;
        assert!(matches!(result, Err(ScrapeError::Status { .. })));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let server = MockServer::start().await;
        // First attempt fails, the retry succeeds.
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config()).unwrap();
        let body = fetcher
            .fetch_html(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_referer_sent_with_image_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.jpg"))
            .and(header("referer", "https://example.com/chapter-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"imagedata".to_vec())
                    .insert_header("content-type", "image/jpeg"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config()).unwrap();
        let (bytes, content_type) = fetcher
            .fetch_bytes(
                &format!("{}/img.jpg", server.uri()),
                Some("https://example.com/chapter-1"),
            )
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"imagedata");
        assert_eq!(content_type.as_deref(), Some("image/jpeg"));
    }
}
