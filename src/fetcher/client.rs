//! Shared HTTP client with optional global rate limiting.

use crate::types::{FireprobeError, HttpConfig, ResourceBody, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A fetched HTTP response, fully buffered.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    pub body: String,
}

/// HTTP client used for page and script downloads.
///
/// The optional rate limit applies to script downloads only.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limiter: Option<Arc<DirectLimiter>>,
}

impl HttpClient {
    /// Create a new client from the HTTP configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .http1_only() // Force HTTP/1.1 to avoid HTTP/2 stream limit issues
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        let rate_limiter = config
            .rate_limit
            .and_then(NonZeroU32::new)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// GET `url` and buffer the body, whatever the status code.
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        trace!("GET {} (timeout {}ms)", url, timeout.as_millis());
        let request = async {
            let response = self.client.get(url).timeout(timeout).send().await?;
            let status = response.status().as_u16();
            let final_url = response.url().to_string();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(FetchedPage {
                status,
                final_url,
                body,
            })
        };

        // reqwest's own timeout covers the body, the outer one is a hard stop.
        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e)) if e.is_timeout() => Err(timeout_error(url, timeout)),
            Ok(Err(e)) => Err(FireprobeError::HttpError(e)),
            Err(_) => Err(timeout_error(url, timeout)),
        }
    }

    /// Fetch a script body. Any non-2xx status is a failure.
    ///
    /// With a rate limit configured, waits for a permit first. That wait is
    /// not counted against `timeout`, which bounds only the request itself.
    pub async fn fetch_resource(&self, url: &str, timeout: Duration) -> Result<ResourceBody> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.until_ready().await;
        }

        let page = self.get(url, timeout).await?;
        if !(200..300).contains(&page.status) {
            debug!("Resource {} returned HTTP {}", url, page.status);
            return Err(FireprobeError::HttpStatus {
                url: url.to_string(),
                status: page.status,
            });
        }
        Ok(ResourceBody { body: page.body })
    }
}

fn timeout_error(url: &str, after: Duration) -> FireprobeError {
    FireprobeError::Timeout {
        url: url.to_string(),
        after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn test_fetch_resource_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
            .mount(&server)
            .await;

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let body = client
            .fetch_resource(&format!("{}/app.js", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body.body, "console.log(1)");
    }

    #[tokio::test]
    async fn test_fetch_resource_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let result = client
            .fetch_resource(&format!("{}/missing.js", server.uri()), Duration::from_secs(5))
            .await;
        assert!(matches!(
            result,
            Err(FireprobeError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_get_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let result = client
            .get(&server.uri(), Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(FireprobeError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_rate_limit_gates_scripts_not_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let config = HttpConfig {
            rate_limit: Some(1),
            ..Default::default()
        };
        let client = HttpClient::new(&config).unwrap();
        let url = format!("{}/app.js", server.uri());
        let timeout = Duration::from_millis(200);

        let started = std::time::Instant::now();
        for _ in 0..3 {
            client.get(&server.uri(), timeout).await.unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(500));

        // One permit per second: the second script waits past `timeout`
        // and still succeeds.
        let started = std::time::Instant::now();
        client.fetch_resource(&url, timeout).await.unwrap();
        client.fetch_resource(&url, timeout).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_get_keeps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let page = client.get(&server.uri(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(page.status, 503);
        assert_eq!(page.body, "down");
    }
}
