//! Scan engine: runs one probe per hostname under a concurrency limit.

use crate::fetcher::ResourceFetcher;
use crate::inspector::SignatureInspector;
use crate::probe::DomainProbe;
use crate::types::{FireprobeError, ProbeOutcome, Result, ScanResult};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Knobs for a single scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum number of hostnames probed at once. Must be at least 1.
    pub max_concurrency: usize,
    /// Bound applied to every individual network operation.
    pub request_timeout: Duration,
    /// Scripts fetched at once inside a single probe.
    pub resource_concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            request_timeout: Duration::from_millis(10_000),
            resource_concurrency: 1,
        }
    }
}

/// Orchestrates probes over a list of hostnames.
pub struct Scanner<F: ?Sized> {
    probe: DomainProbe<F>,
}

impl<F: ResourceFetcher + ?Sized + 'static> Scanner<F> {
    /// Create a new scanner over the given fetcher and inspector.
    pub fn new(fetcher: Arc<F>, inspector: SignatureInspector) -> Self {
        Self {
            probe: DomainProbe::new(fetcher, Arc::new(inspector)),
        }
    }

    /// Probe every hostname and return one outcome per input, in input order.
    ///
    /// At most `options.max_concurrency` probes are in flight; as soon as one
    /// finishes the next hostname is admitted. `on_progress` is called once per
    /// finished probe with the running count of completed probes.
    ///
    /// Per-hostname failures never fail the scan. Only caller mistakes do: a
    /// zero concurrency limit or an empty hostname.
    pub async fn scan(
        &self,
        hostnames: &[String],
        options: &ScanOptions,
        on_progress: impl Fn(usize),
    ) -> Result<ScanResult> {
        if options.max_concurrency == 0 {
            return Err(FireprobeError::InvalidConcurrency);
        }
        if let Some(index) = hostnames.iter().position(|h| h.trim().is_empty()) {
            return Err(FireprobeError::EmptyHostname(index));
        }

        let start_time = Instant::now();
        let total = hostnames.len();
        let timeout = options.request_timeout;
        let probe = self
            .probe
            .clone()
            .with_resource_concurrency(options.resource_concurrency);

        info!(
            "Scanning {} hosts ({} at a time, {}ms per request)",
            total,
            options.max_concurrency,
            timeout.as_millis()
        );

        let mut slots: Vec<Option<ProbeOutcome>> = vec![None; total];
        let mut completed = 0;

        // Each probe runs in its own task so a panic stays with its hostname.
        let mut finished = stream::iter(hostnames.iter().cloned().enumerate())
            .map(|(index, hostname)| {
                let probe = probe.clone();
                async move {
                    let task = tokio::spawn({
                        let hostname = hostname.clone();
                        async move { probe.probe(&hostname, timeout).await }
                    });

                    let outcome = match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!("Probe for {} aborted: {}", hostname, e);
                            ProbeOutcome::unreachable(hostname, format!("probe aborted: {}", e))
                        }
                    };
                    (index, outcome)
                }
            })
            .buffer_unordered(options.max_concurrency);

        while let Some((index, outcome)) = finished.next().await {
            completed += 1;
            debug!(
                "[{}/{}] {} -> {}",
                completed,
                total,
                outcome.hostname,
                outcome.kind()
            );
            slots[index] = Some(outcome);
            on_progress(completed);
        }

        let outcomes = slots
            .into_iter()
            .zip(hostnames)
            .map(|(slot, hostname)| {
                slot.unwrap_or_else(|| ProbeOutcome::unreachable(hostname, "probe did not complete"))
            })
            .collect();

        Ok(ScanResult {
            outcomes,
            duration_secs: start_time.elapsed().as_secs_f64(),
        })
    }
}
