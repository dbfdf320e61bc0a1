//! Page and resource fetching backends.
//!
//! The probe only talks to the [`ResourceFetcher`] trait, so the scan engine
//! can run against:
//! - headless Chromium (default, renders the page and reads the live DOM)
//! - plain HTTP with static `<script src>` extraction (`--no-browser`)
//! - scripted fakes in tests

pub mod chromium;
pub mod client;
pub mod http;

#[cfg(test)]
pub(crate) mod scripted;

pub use chromium::ChromiumFetcher;
pub use client::HttpClient;
pub use http::HttpFetcher;

use crate::types::{PageLoad, ResourceBody, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Capability to load a page and fetch the script resources it references.
///
/// Implementations enforce `timeout` themselves and release any browsing
/// context they open before returning, on success and on failure.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Load `url`, returning the final document status and the script URLs it references.
    async fn load_page(&self, url: &str, timeout: Duration) -> Result<PageLoad>;

    /// Fetch the body of a single script resource.
    async fn fetch_resource(&self, url: &str, timeout: Duration) -> Result<ResourceBody>;
}
