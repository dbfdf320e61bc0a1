//! Configuration handling for the scanner.

use crate::inspector::{SignatureInspector, DEFAULT_CONFIG_KEY_TOKEN, DEFAULT_PLATFORM_TOKEN};
use crate::scanner::ScanOptions;
use crate::types::{HttpConfig, Result};
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

/// Scan hostnames for pages that ship Firebase Realtime Database config in their scripts.
#[derive(Parser, Debug, Clone)]
#[command(name = "fireprobe")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scan hostnames for the script signature
    Scan(ScanConfig),
    /// Download and set up a managed Chromium browser
    Setup(SetupConfig),
}

/// Configuration for the setup command.
#[derive(Parser, Debug, Clone)]
pub struct SetupConfig {
    /// Force re-download even if Chromium is already installed
    #[arg(long)]
    pub force: bool,
}

/// Configuration for the scan command.
#[derive(Parser, Debug, Clone)]
pub struct ScanConfig {
    /// Hostname(s) to scan; read from stdin when omitted and input is piped
    pub targets: Vec<String>,

    /// File containing hostnames to scan (one per line)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Number of hostnames probed in parallel
    #[arg(short = 'c', long, default_value = "10")]
    pub concurrency: usize,

    /// Timeout for each page load and script fetch, in milliseconds
    #[arg(short, long, default_value = "10000")]
    pub timeout: u64,

    /// Number of scripts fetched in parallel within one hostname
    #[arg(long, default_value = "1")]
    pub resource_concurrency: usize,

    /// Global rate limit for script downloads, in requests per second (waiting for a slot does not count toward --timeout)
    #[arg(long)]
    pub rate_limit: Option<u32>,

    /// Also list hostnames without the signature and unreachable ones
    #[arg(short, long)]
    pub all: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Write JSON results to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip the browser: fetch pages over plain HTTP and read <script src> statically
    #[arg(long)]
    pub no_browser: bool,

    /// Path to Chrome/Chromium executable (overrides auto-detection)
    #[arg(long, env = "FIREPROBE_CHROME")]
    pub chrome_path: Option<PathBuf>,

    /// Custom User-Agent string
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Platform-name token a matching script must contain
    #[arg(long, default_value = DEFAULT_PLATFORM_TOKEN)]
    pub platform_token: String,

    /// Configuration-key token a matching script must contain
    #[arg(long, default_value = DEFAULT_CONFIG_KEY_TOKEN)]
    pub config_key_token: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            file: None,
            concurrency: 10,
            timeout: 10_000,
            resource_concurrency: 1,
            rate_limit: None,
            all: false,
            json: false,
            output: None,
            no_browser: false,
            chrome_path: None,
            user_agent: None,
            platform_token: DEFAULT_PLATFORM_TOKEN.to_string(),
            config_key_token: DEFAULT_CONFIG_KEY_TOKEN.to_string(),
        }
    }
}

impl ScanConfig {
    /// Get HTTP configuration from scan config.
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            user_agent: self.user_agent.clone().unwrap_or_else(|| {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
            }),
            rate_limit: self.rate_limit,
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_concurrency: self.concurrency,
            request_timeout: Duration::from_millis(self.timeout),
            resource_concurrency: self.resource_concurrency,
        }
    }

    pub fn inspector(&self) -> Result<SignatureInspector> {
        SignatureInspector::new(&self.platform_token, &self.config_key_token)
    }

    /// Load hostnames from arguments and the target file, falling back to piped stdin.
    pub fn load_targets(&self) -> Result<Vec<String>> {
        let mut targets: Vec<String> = self
            .targets
            .iter()
            .filter_map(|t| normalize_hostname(t))
            .collect();

        if let Some(ref file_path) = self.file {
            let content = std::fs::read_to_string(file_path)?;
            targets.extend(parse_targets(&content));
        }

        if targets.is_empty() && self.file.is_none() && !std::io::stdin().is_terminal() {
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content)?;
            targets.extend(parse_targets(&content));
        }

        Ok(targets)
    }
}

/// Parse one hostname per line, skipping blanks and `#` comments.
pub fn parse_targets(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(normalize_hostname)
        .collect()
}

/// Trim a target and strip a leading URL scheme and trailing slashes.
/// Returns `None` when nothing is left.
pub fn normalize_hostname(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
    let host = without_scheme.trim_end_matches('/');

    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
