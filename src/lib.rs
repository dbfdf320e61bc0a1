//! fireprobe - concurrent scanner for exposed Firebase Realtime Database config.
//!
//! Given a list of hostnames, this library:
//! - Loads each `http://{hostname}` page (headless Chromium or plain HTTP)
//! - Collects the script URLs the page references
//! - Fetches every script and looks for the integration signature
//! - Classifies each host as signature / no signature / unreachable
//!
//! # Example
//!
//! ```no_run
//! use fireprobe::{HttpConfig, HttpFetcher, ScanOptions, Scanner, SignatureInspector};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> fireprobe::Result<()> {
//!     let fetcher = Arc::new(HttpFetcher::new(&HttpConfig::default())?);
//!     let scanner = Scanner::new(fetcher, SignatureInspector::firebase()?);
//!     let hosts = vec!["example.com".to_string()];
//!     let result = scanner.scan(&hosts, &ScanOptions::default(), |_| {}).await?;
//!     println!("{} hosts carry the signature", result.hits().count());
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod config;
pub mod fetcher;
pub mod inspector;
pub mod notify;
pub mod probe;
pub mod scanner;
pub mod types;

pub use config::{Commands, Config, ScanConfig, SetupConfig};
pub use fetcher::{ChromiumFetcher, HttpFetcher, ResourceFetcher};
pub use inspector::SignatureInspector;
pub use probe::DomainProbe;
pub use scanner::{ScanOptions, Scanner};
pub use types::{
    FireprobeError, HttpConfig, OutcomeKind, PageLoad, ProbeOutcome, ResourceBody, Result,
    ScanResult, Verdict,
};
