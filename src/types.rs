//! Core types and errors for the signature scanner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while setting up or running a scan.
#[derive(Error, Debug)]
pub enum FireprobeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Timed out after {}ms: {url}", .after.as_millis())]
    Timeout { url: String, after: Duration },

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Concurrency limit must be at least 1")]
    InvalidConcurrency,

    #[error("Hostname at position {0} is empty")]
    EmptyHostname(usize),
}

impl From<chromiumoxide::error::CdpError> for FireprobeError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        FireprobeError::BrowserError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FireprobeError>;

/// Classification of a single hostname.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// At least one script carried both signature tokens.
    Signature {
        /// Matching script URLs, in discovery order.
        resources: Vec<String>,
    },
    /// The page loaded but no script matched.
    NoSignature,
    /// Page load failed, timed out or returned a status other than 200.
    Unreachable {
        /// Diagnostic text only (e.g. "HTTP 503").
        reason: String,
    },
}

/// Verdict without its payload, for filtering and display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Signature,
    NoSignature,
    Unreachable,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeKind::Signature => "signature",
            OutcomeKind::NoSignature => "no signature",
            OutcomeKind::Unreachable => "unreachable",
        };
        f.write_str(label)
    }
}

impl Verdict {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Verdict::Signature { .. } => OutcomeKind::Signature,
            Verdict::NoSignature => OutcomeKind::NoSignature,
            Verdict::Unreachable { .. } => OutcomeKind::Unreachable,
        }
    }

    /// Matched resource URLs; empty for anything but `Signature`.
    pub fn resources(&self) -> &[String] {
        match self {
            Verdict::Signature { resources } => resources,
            _ => &[],
        }
    }
}

/// Outcome of probing one hostname. Built once by the probe and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Hostname exactly as supplied by the caller.
    pub hostname: String,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl ProbeOutcome {
    pub fn new(hostname: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            hostname: hostname.into(),
            verdict,
        }
    }

    pub fn unreachable(hostname: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            hostname,
            Verdict::Unreachable {
                reason: reason.into(),
            },
        )
    }

    pub fn kind(&self) -> OutcomeKind {
        self.verdict.kind()
    }
}

/// Complete scan result, one outcome per input hostname in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    pub outcomes: Vec<ProbeOutcome>,
    /// Wall-clock duration of the scan in seconds.
    pub duration_secs: f64,
}

impl ScanResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind() == kind).count()
    }

    /// Outcomes that carry the signature.
    pub fn hits(&self) -> impl Iterator<Item = &ProbeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.kind() == OutcomeKind::Signature)
    }
}

/// What a page load reports back to the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLoad {
    /// Final HTTP status of the document.
    pub status: u16,
    /// Absolute script URLs referenced by the document, inline scripts excluded.
    pub resources: Vec<String>,
}

/// Body of a fetched script resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBody {
    pub body: String,
}

/// Configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Global requests per second; `None` disables limiting.
    pub rate_limit: Option<u32>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; fireprobe/0.1)".to_string(),
            rate_limit: None,
        }
    }
}
