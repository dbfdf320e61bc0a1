//! Browserless fetcher: plain HTTP GET and static `<script src>` extraction.

use crate::fetcher::client::HttpClient;
use crate::fetcher::ResourceFetcher;
use crate::types::{FireprobeError, HttpConfig, PageLoad, ResourceBody, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Fetcher that never executes JavaScript.
///
/// Faster and lighter than [`ChromiumFetcher`](crate::fetcher::ChromiumFetcher),
/// but misses scripts injected at runtime.
#[derive(Clone)]
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn load_page(&self, url: &str, timeout: Duration) -> Result<PageLoad> {
        let page = self.client.get(url, timeout).await?;

        let resources = if page.status == 200 {
            extract_script_urls(&page.body, &page.final_url)?
        } else {
            Vec::new()
        };

        debug!(
            "Loaded {} (HTTP {}, {} scripts)",
            page.final_url,
            page.status,
            resources.len()
        );

        Ok(PageLoad {
            status: page.status,
            resources,
        })
    }

    async fn fetch_resource(&self, url: &str, timeout: Duration) -> Result<ResourceBody> {
        self.client.fetch_resource(url, timeout).await
    }
}

/// Extract absolute script URLs from an HTML document in document order.
///
/// Inline scripts and blank `src` attributes are skipped; relative URLs are
/// resolved against `base_url`. Values that cannot be resolved are dropped.
pub fn extract_script_urls(html: &str, base_url: &str) -> Result<Vec<String>> {
    let base = Url::parse(base_url)?;
    let selector = Selector::parse("script[src]")
        .map_err(|e| FireprobeError::ConfigError(format!("Invalid selector: {}", e)))?;

    let document = Html::parse_document(html);
    let urls = document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .filter_map(|src| base.join(src).ok())
        .map(|url| url.to_string())
        .collect();

    Ok(urls)
}
