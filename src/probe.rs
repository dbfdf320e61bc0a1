//! Single-hostname probe: load the page, inspect its scripts, classify.

use crate::fetcher::ResourceFetcher;
use crate::inspector::SignatureInspector;
use crate::types::{ProbeOutcome, Verdict};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Checks one hostname for the signature.
///
/// All failures are folded into the returned outcome; a probe never errors.
pub struct DomainProbe<F: ?Sized> {
    fetcher: Arc<F>,
    inspector: Arc<SignatureInspector>,
    resource_concurrency: usize,
}

impl<F: ?Sized> Clone for DomainProbe<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            inspector: self.inspector.clone(),
            resource_concurrency: self.resource_concurrency,
        }
    }
}

impl<F: ResourceFetcher + ?Sized> DomainProbe<F> {
    pub fn new(fetcher: Arc<F>, inspector: Arc<SignatureInspector>) -> Self {
        Self {
            fetcher,
            inspector,
            resource_concurrency: 1,
        }
    }

    /// Number of scripts fetched at once within one probe (default 1, sequential).
    pub fn with_resource_concurrency(mut self, n: usize) -> Self {
        self.resource_concurrency = n.max(1);
        self
    }

    /// Probe `http://{hostname}`.
    pub async fn probe(&self, hostname: &str, timeout: Duration) -> ProbeOutcome {
        let url = format!("http://{}", hostname);

        let page = match self.fetcher.load_page(&url, timeout).await {
            Ok(page) => page,
            Err(e) => {
                debug!("{} unreachable: {}", hostname, e);
                return ProbeOutcome::unreachable(hostname, e.to_string());
            }
        };

        // Only an exact 200 counts as a successful load.
        if page.status != 200 {
            debug!("{} unreachable: HTTP {}", hostname, page.status);
            return ProbeOutcome::unreachable(hostname, format!("HTTP {}", page.status));
        }

        let resources = dedup_in_order(page.resources);
        debug!("{}: inspecting {} scripts", hostname, resources.len());

        // `buffered` yields in input order, so matches keep discovery order
        // even when several fetches overlap.
        let fetcher = self.fetcher.clone();
        let inspector = self.inspector.clone();
        let inspected: Vec<(String, bool)> = stream::iter(resources)
            .map(move |resource| {
                let fetcher = fetcher.clone();
                let inspector = inspector.clone();
                async move {
                    let hit = inspect(&*fetcher, &inspector, &resource, timeout).await;
                    (resource, hit)
                }
            })
            .buffered(self.resource_concurrency)
            .collect()
            .await;

        let matched: Vec<String> = inspected
            .into_iter()
            .filter_map(|(resource, hit)| hit.then_some(resource))
            .collect();

        if matched.is_empty() {
            ProbeOutcome::new(hostname, Verdict::NoSignature)
        } else {
            info!("{}: signature in {} script(s)", hostname, matched.len());
            ProbeOutcome::new(hostname, Verdict::Signature { resources: matched })
        }
    }
}

/// Fetch and inspect one script. A failed fetch is not a match.
async fn inspect<F: ResourceFetcher + ?Sized>(
    fetcher: &F,
    inspector: &SignatureInspector,
    url: &str,
    timeout: Duration,
) -> bool {
    match fetcher.fetch_resource(url, timeout).await {
        Ok(resource) => inspector.matches(&resource.body),
        Err(e) => {
            debug!("Skipping script {}: {}", url, e);
            false
        }
    }
}

fn dedup_in_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| !url.is_empty() && seen.insert(url.clone()))
        .collect()
}
