//! Managed Chromium install: locate or download a browser for page rendering.

use crate::types::{FireprobeError, Result};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use std::path::{Path, PathBuf};
use tracing::info;

/// Names a Chrome/Chromium executable can have inside the managed directory.
const CHROME_NAMES: &[&str] = &[
    "chrome",
    "chromium",
    "Chromium",
    "Google Chrome",
    "chrome.exe",
    "chromium.exe",
];

/// Returns the managed Chrome installation directory: `~/.fireprobe/chrome/`
pub fn managed_chrome_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        FireprobeError::ConfigError("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".fireprobe").join("chrome"))
}

/// Checks the managed directory for a previously-downloaded Chrome executable.
pub fn resolve_chrome_executable() -> Option<PathBuf> {
    let chrome_dir = managed_chrome_dir().ok()?;
    find_chrome_in_dir(&chrome_dir)
}

/// Download Chromium to the managed directory using `BrowserFetcher`.
/// Returns the path to the downloaded executable.
pub async fn download_chrome(force: bool) -> Result<PathBuf> {
    let chrome_dir = managed_chrome_dir()?;

    if !force {
        if let Some(exe) = find_chrome_in_dir(&chrome_dir) {
            info!("Chrome already installed at {:?}", exe);
            return Ok(exe);
        }
    }

    if force && chrome_dir.exists() {
        info!("Removing existing Chrome installation for re-download...");
        tokio::fs::remove_dir_all(&chrome_dir).await?;
    }

    tokio::fs::create_dir_all(&chrome_dir).await?;

    info!("Downloading Chromium to {:?}...", chrome_dir);

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&chrome_dir)
            .build()
            .map_err(|e| {
                FireprobeError::ConfigError(format!("Failed to configure browser fetcher: {}", e))
            })?,
    );

    let installed = fetcher.fetch().await.map_err(|e| {
        FireprobeError::ConfigError(format!("Failed to download Chromium: {}", e))
    })?;

    info!("Chromium downloaded to {:?}", installed.executable_path);
    Ok(installed.executable_path)
}

/// Search a directory tree for a Chrome/Chromium executable.
fn find_chrome_in_dir(dir: &Path) -> Option<PathBuf> {
    if !dir.exists() {
        return None;
    }

    let mut entries = Vec::new();
    walk_recursive(dir, &mut entries);

    for path in entries {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        // macOS app bundle: the binary lives inside
        if name == "Chromium.app" {
            let inner = path.join("Contents/MacOS/Chromium");
            if inner.is_file() {
                return Some(inner);
            }
            continue;
        }

        if CHROME_NAMES.contains(&name.as_str()) && path.is_file() {
            return Some(path);
        }
    }
    None
}

fn walk_recursive(dir: &Path, results: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_dir = path.is_dir();
            results.push(path.clone());
            if is_dir {
                walk_recursive(&path, results);
            }
        }
    }
}
