//! fireprobe - concurrent scanner for exposed Firebase Realtime Database config.
//!
//! CLI entry point.

use clap::Parser;
use fireprobe::notify::ConsoleOutput;
use fireprobe::{
    ChromiumFetcher, Commands, Config, HttpFetcher, ResourceFetcher, ScanConfig, ScanResult,
    Scanner, SetupConfig,
};
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit code used when the scan is interrupted by a signal.
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Set up logging on stderr; stdout is reserved for results
    let filter = if config.verbose {
        EnvFilter::new("fireprobe=debug,info")
    } else {
        EnvFilter::new("fireprobe=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match config.command {
        Commands::Scan(scan_config) => run_scan(scan_config).await,
        Commands::Setup(setup_config) => run_setup(setup_config).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    }
}

/// Page-loading backend selected on the command line.
enum Backend {
    Browser(Arc<ChromiumFetcher>),
    Http(Arc<HttpFetcher>),
}

impl Backend {
    async fn start(scan_config: &ScanConfig) -> fireprobe::Result<Self> {
        let http_config = scan_config.http_config();
        if scan_config.no_browser {
            return Ok(Backend::Http(Arc::new(HttpFetcher::new(&http_config)?)));
        }
        let fetcher = ChromiumFetcher::launch(&http_config, scan_config.chrome_path.clone()).await?;
        Ok(Backend::Browser(Arc::new(fetcher)))
    }

    fn fetcher(&self) -> Arc<dyn ResourceFetcher> {
        match self {
            Backend::Browser(f) => Arc::clone(f) as Arc<dyn ResourceFetcher>,
            Backend::Http(f) => Arc::clone(f) as Arc<dyn ResourceFetcher>,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Backend::Browser(_) => "headless Chromium",
            Backend::Http(_) => "plain HTTP",
        }
    }

    /// Make sure no Chrome process outlives the scan.
    async fn shutdown(&self) {
        if let Backend::Browser(f) = self {
            f.shutdown().await;
        }
    }
}

async fn run_scan(scan_config: ScanConfig) -> Result<(), ExitCode> {
    let targets = scan_config.load_targets().map_err(|e| {
        error!("Failed to load targets: {}", e);
        ExitCode::FAILURE
    })?;

    if targets.is_empty() {
        error!("No targets specified. Use positional arguments, -f <file> or pipe hostnames on stdin.");
        return Err(ExitCode::FAILURE);
    }

    let inspector = scan_config.inspector().map_err(|e| {
        error!("{}", e);
        ExitCode::FAILURE
    })?;

    let backend = Backend::start(&scan_config).await.map_err(|e| {
        error!("Failed to start fetcher: {}", e);
        ExitCode::FAILURE
    })?;

    let console = ConsoleOutput::new(scan_config.json, scan_config.all);
    console.print_scan_start(targets.len(), backend.label());

    let scanner = Scanner::new(backend.fetcher(), inspector);
    let options = scan_config.scan_options();
    let pb = console.create_progress_bar(targets.len() as u64);

    let scan = scanner.scan(&targets, &options, |completed| {
        if let Some(ref pb) = pb {
            pb.set_position(completed as u64);
        }
    });

    let scanned = tokio::select! {
        result = scan => result,
        _ = shutdown_signal() => {
            eprintln!("\nSignal received, shutting down browser...");
            backend.shutdown().await;
            return Err(ExitCode::from(INTERRUPTED));
        }
    };

    backend.shutdown().await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let result = scanned.map_err(|e| {
        error!("Scan failed: {}", e);
        ExitCode::FAILURE
    })?;

    write_output(&scan_config, &result)?;
    console.print_results(&result);
    console.print_summary(&result);

    Ok(())
}

/// Emit JSON to stdout and/or the output file, as configured.
fn write_output(scan_config: &ScanConfig, result: &ScanResult) -> Result<(), ExitCode> {
    if !scan_config.json && scan_config.output.is_none() {
        return Ok(());
    }

    let json = serde_json::to_string_pretty(result).map_err(|e| {
        error!("Failed to serialize results: {}", e);
        ExitCode::FAILURE
    })?;

    if let Some(ref output_path) = scan_config.output {
        fs::write(output_path, &json).map_err(|e| {
            error!("Failed to write output file: {}", e);
            ExitCode::FAILURE
        })?;
        info!("Results written to: {:?}", output_path);
    } else {
        println!("{}", json);
    }

    Ok(())
}

async fn run_setup(setup_config: SetupConfig) -> Result<(), ExitCode> {
    eprintln!("Setting up Chromium browser...");
    match fireprobe::browser::download_chrome(setup_config.force).await {
        Ok(path) => {
            eprintln!("Chromium ready at: {}", path.display());
            Ok(())
        }
        Err(e) => {
            error!("Setup failed: {}", e);
            Err(ExitCode::FAILURE)
        }
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl-C elsewhere).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
            }
            _ => {
                error!("Failed to register signal handlers");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
