//! Scripted in-memory fetcher for engine tests.

use crate::fetcher::ResourceFetcher;
use crate::types::{FireprobeError, PageLoad, ResourceBody, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Serves canned pages and scripts, and records how many calls overlap.
///
/// Pages are keyed by full URL (`http://host`). Unknown pages and scripts
/// fail with a timeout error straight away; a call whose delay exceeds the
/// caller's timeout fails with one once the timeout has elapsed.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    pages: HashMap<String, u16>,
    page_resources: HashMap<String, Vec<String>>,
    scripts: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    page_loads: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serve `http://{host}` with `status` and the given script URLs.
    pub(crate) fn page(mut self, host: &str, status: u16, resources: &[&str]) -> Self {
        let url = format!("http://{}", host);
        self.page_resources
            .insert(url.clone(), resources.iter().map(|r| r.to_string()).collect());
        self.pages.insert(url, status);
        self
    }

    pub(crate) fn script(mut self, url: &str, body: &str) -> Self {
        self.scripts.insert(url.to_string(), body.to_string());
        self
    }

    /// Delay every call against `url` (page or script).
    pub(crate) fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub(crate) fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn page_loads(&self) -> usize {
        self.page_loads.load(Ordering::SeqCst)
    }

    async fn enter(&self, url: &str, timeout: Duration) -> Result<InFlight<'_>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        let delay = self.delays.get(url).copied().unwrap_or(self.default_delay);
        if delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(timed_out(url, timeout));
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(guard)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn timed_out(url: &str, timeout: Duration) -> FireprobeError {
    FireprobeError::Timeout {
        url: url.to_string(),
        after: timeout,
    }
}

#[async_trait]
impl ResourceFetcher for ScriptedFetcher {
    async fn load_page(&self, url: &str, timeout: Duration) -> Result<PageLoad> {
        self.page_loads.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(url, timeout).await?;

        let status = *self.pages.get(url).ok_or_else(|| timed_out(url, timeout))?;
        Ok(PageLoad {
            status,
            resources: self.page_resources.get(url).cloned().unwrap_or_default(),
        })
    }

    async fn fetch_resource(&self, url: &str, timeout: Duration) -> Result<ResourceBody> {
        let _guard = self.enter(url, timeout).await?;

        self.scripts
            .get(url)
            .map(|body| ResourceBody { body: body.clone() })
            .ok_or_else(|| timed_out(url, timeout))
    }
}
