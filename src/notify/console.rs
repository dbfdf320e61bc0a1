//! Colored console output for scan results.

use crate::types::{OutcomeKind, ProbeOutcome, ScanResult, Verdict};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Console output handler with colors and formatting.
pub struct ConsoleOutput {
    json_mode: bool,
    show_all: bool,
}

impl ConsoleOutput {
    /// Create a new console output handler.
    pub fn new(json_mode: bool, show_all: bool) -> Self {
        Self { json_mode, show_all }
    }

    /// Print scan start message.
    pub fn print_scan_start(&self, total: usize, backend: &str) {
        if self.json_mode {
            return;
        }

        eprintln!(
            "{} Scanning {} hosts ({})",
            "[*]".bright_blue(),
            total.to_string().bright_white(),
            backend
        );
    }

    /// Whether an outcome is shown under the current display flag.
    pub fn is_shown(&self, outcome: &ProbeOutcome) -> bool {
        self.show_all || outcome.kind() == OutcomeKind::Signature
    }

    /// Print every shown outcome in input order.
    pub fn print_results(&self, result: &ScanResult) {
        if self.json_mode {
            return;
        }

        for outcome in result.outcomes.iter().filter(|o| self.is_shown(o)) {
            println!("{}", format_outcome(outcome));
        }
    }

    /// Print scan summary.
    pub fn print_summary(&self, result: &ScanResult) {
        if self.json_mode {
            return;
        }

        let hits = result.count(OutcomeKind::Signature);

        eprintln!();
        eprintln!("{}", "=== Scan Summary ===".bright_cyan());
        eprintln!("  Hosts:        {}", result.len());
        eprintln!("  Duration:     {:.2}s", result.duration_secs);
        eprintln!("  No signature: {}", result.count(OutcomeKind::NoSignature));
        eprintln!("  Unreachable:  {}", result.count(OutcomeKind::Unreachable));

        if hits > 0 {
            eprintln!(
                "  {}",
                format!("SIGNATURE FOUND ON {} HOSTS", hits).red().bold()
            );
        } else {
            eprintln!("  {}", "No host carries the signature.".green());
        }
        eprintln!();
    }

    /// Create a progress bar.
    pub fn create_progress_bar(&self, total: u64) -> Option<ProgressBar> {
        if self.json_mode || total == 0 {
            return None;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message("hosts");
        Some(pb)
    }
}

/// One line per outcome; signature hits get their matching scripts underneath.
fn format_outcome(outcome: &ProbeOutcome) -> String {
    match &outcome.verdict {
        Verdict::Signature { resources } => {
            let mut lines = vec![format!(
                "{} {} [{}]",
                "[+]".green().bold(),
                outcome.hostname.bright_white().bold(),
                "SIGNATURE".red().bold()
            )];
            let last = resources.len().saturating_sub(1);
            for (i, url) in resources.iter().enumerate() {
                let branch = if i == last { "+--" } else { "|--" };
                lines.push(format!("    {} {}", branch, url.dimmed()));
            }
            lines.join("\n")
        }
        Verdict::NoSignature => format!(
            "{} {} [{}]",
            "[-]".dimmed(),
            outcome.hostname,
            "no signature".dimmed()
        ),
        Verdict::Unreachable { reason } => format!(
            "{} {} [{}] {}",
            "[!]".yellow(),
            outcome.hostname,
            "unreachable".yellow(),
            reason.dimmed()
        ),
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(false, false)
    }
}
