//! Headless Chromium fetcher using the Chrome DevTools Protocol.
//!
//! One browser process is shared by the whole scan. Every page load opens its
//! own tab, which is the probe's browsing context, and closes it before
//! returning whatever the outcome. A page counts as loaded once its document
//! is parsed (DOMContentLoaded), not when every subresource has finished.
//! Script bodies are downloaded over plain
//! HTTP so no tab is held open while resources are inspected.
//!
//! Requires: Chrome or Chromium (auto-downloaded when missing)

use crate::fetcher::client::HttpClient;
use crate::fetcher::ResourceFetcher;
use crate::types::{FireprobeError, HttpConfig, PageLoad, ResourceBody, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{EventDomContentEventFired, NavigateParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::Handler;
use chromiumoxide::Page;
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Counter for generating unique browser profile directories
static BROWSER_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Script URLs referenced by the rendered DOM, inline scripts excluded.
const SCRIPT_SOURCES_JS: &str = "Array.prototype.map.call(document.scripts, function (s) { return s.src; })\
    .filter(function (src) { return /^https?:/i.test(src); })";

/// Page loader backed by a shared headless Chromium.
pub struct ChromiumFetcher {
    browser: RwLock<Option<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    profile_dir: PathBuf,
    client: HttpClient,
}

impl ChromiumFetcher {
    /// Launch the browser.
    ///
    /// Executable resolution: `chrome_executable` > managed install > system
    /// Chrome > automatic download into the managed directory.
    pub async fn launch(http_config: &HttpConfig, chrome_executable: Option<PathBuf>) -> Result<Self> {
        let client = HttpClient::new(http_config)?;

        // Unique profile directory so several scans can run side by side
        let instance_id = BROWSER_INSTANCE_COUNTER.fetch_add(1, Ordering::SeqCst);
        let profile_dir = std::env::temp_dir().join(format!(
            "fireprobe-browser-{}-{}",
            std::process::id(),
            instance_id
        ));
        std::fs::create_dir_all(&profile_dir)?;

        let chrome_exe = chrome_executable.or_else(crate::browser::resolve_chrome_executable);
        let (browser, mut handler) =
            launch_browser(&profile_dir, chrome_exe, &http_config.user_agent).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!("Headless browser ready (profile {:?})", profile_dir);

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            profile_dir,
            client,
        })
    }

    /// Close the browser and remove its profile directory. Safe to call twice.
    pub async fn shutdown(&self) {
        if let Some(mut browser) = self.browser.write().await.take() {
            if let Err(e) = browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Waiting for browser exit failed: {}", e);
            }
        }

        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }

        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            debug!("Failed to cleanup profile dir {:?}: {}", self.profile_dir, e);
        }
    }

    async fn open_page(&self, url: &str, deadline: Instant, timeout: Duration) -> Result<Page> {
        let guard = self.browser.read().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| FireprobeError::BrowserError("browser has been shut down".to_string()))?;

        match tokio::time::timeout_at(deadline, browser.new_page("about:blank")).await {
            Ok(page) => Ok(page?),
            Err(_) => Err(FireprobeError::Timeout {
                url: url.to_string(),
                after: timeout,
            }),
        }
    }

    /// Navigate the tab and read the document status and script URLs.
    async fn render(&self, page: &Page, url: &str, deadline: Instant, timeout: Duration) -> Result<PageLoad> {
        let main_frame = page.mainframe().await?;
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let mut dom_events = page.event_listener::<EventDomContentEventFired>().await?;

        // Redirect hops never show up as responses, so the first main-frame
        // document response carries the final status.
        let (status_tx, status_rx) = oneshot::channel::<i64>();
        let status_task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let is_document = matches!(event.r#type, ResourceType::Document);
                let in_main_frame = main_frame.is_none() || event.frame_id == main_frame;
                if is_document && in_main_frame {
                    let _ = status_tx.send(event.response.status);
                    break;
                }
            }
        });

        debug!("Navigating to: {}", url);
        // A raw Page.navigate returns once the navigation commits; `goto`
        // would also wait for the load event.
        let navigate = async {
            let response = page.execute(NavigateParams::new(url)).await?;
            Ok::<_, FireprobeError>(response.result.error_text)
        };
        let dom_ready = async move { dom_events.next().await.is_some() };

        let status = wait_for_document(url, navigate, dom_ready, status_rx, deadline, timeout).await;
        status_task.abort();
        let status = status?;

        if status != 200 {
            return Ok(PageLoad {
                status,
                resources: Vec::new(),
            });
        }

        let params = EvaluateParams::builder()
            .expression(SCRIPT_SOURCES_JS)
            .return_by_value(true)
            .build()
            .map_err(FireprobeError::BrowserError)?;

        let evaluation = tokio::time::timeout_at(deadline, page.evaluate_expression(params))
            .await
            .map_err(|_| FireprobeError::Timeout {
                url: url.to_string(),
                after: timeout,
            })??;
        let resources: Vec<String> = evaluation.into_value()?;

        debug!("{} references {} scripts", url, resources.len());
        Ok(PageLoad { status, resources })
    }
}

/// Wait until a navigation has committed and its document has been parsed.
///
/// `navigate` yields the navigation's error text, `dom_ready` resolves on
/// DOMContentLoaded (false if the event stream ended first). The `load` event
/// plays no part, so a hanging image or tracker does not stall the probe.
/// A non-200 document returns as soon as its status is known.
async fn wait_for_document<N, D>(
    url: &str,
    navigate: N,
    dom_ready: D,
    status_rx: oneshot::Receiver<i64>,
    deadline: Instant,
    timeout: Duration,
) -> Result<u16>
where
    N: Future<Output = Result<Option<String>>>,
    D: Future<Output = bool>,
{
    let timed_out = || FireprobeError::Timeout {
        url: url.to_string(),
        after: timeout,
    };

    let error_text = tokio::time::timeout_at(deadline, navigate)
        .await
        .map_err(|_| timed_out())??;
    if let Some(error) = error_text.filter(|e| !e.is_empty()) {
        return Err(FireprobeError::BrowserError(format!(
            "navigation to {} failed: {}",
            url, error
        )));
    }

    let code = match tokio::time::timeout_at(deadline, status_rx).await {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => {
            return Err(FireprobeError::BrowserError(
                "no document response received".to_string(),
            ))
        }
        Err(_) => return Err(timed_out()),
    };
    let status = u16::try_from(code)
        .map_err(|_| FireprobeError::BrowserError(format!("invalid status code {}", code)))?;

    if status != 200 {
        return Ok(status);
    }

    match tokio::time::timeout_at(deadline, dom_ready).await {
        Ok(true) => Ok(status),
        Ok(false) => Err(FireprobeError::BrowserError(
            "tab closed before the document was parsed".to_string(),
        )),
        Err(_) => Err(timed_out()),
    }
}

#[async_trait]
impl ResourceFetcher for ChromiumFetcher {
    async fn load_page(&self, url: &str, timeout: Duration) -> Result<PageLoad> {
        let deadline = Instant::now() + timeout;
        let page = self.open_page(url, deadline, timeout).await?;

        let result = self.render(&page, url, deadline, timeout).await;

        // The tab is released on every path, including timeouts inside render.
        if let Err(e) = page.close().await {
            debug!("Failed to close tab for {}: {}", url, e);
        }

        result
    }

    async fn fetch_resource(&self, url: &str, timeout: Duration) -> Result<ResourceBody> {
        self.client.fetch_resource(url, timeout).await
    }
}

fn build_browser_config(
    profile_dir: &Path,
    chrome_exe: Option<&Path>,
    user_agent: &str,
) -> Result<BrowserConfig> {
    let mut config_builder = BrowserConfig::builder()
        .user_data_dir(profile_dir)
        .arg(format!("--user-agent={}", user_agent));

    if let Some(exe) = chrome_exe {
        config_builder = config_builder.chrome_executable(exe);
    }

    config_builder
        .no_sandbox()
        .viewport(None)
        .build()
        .map_err(|e| FireprobeError::ConfigError(format!("Failed to build browser config: {}", e)))
}

/// Launch a browser, with auto-download fallback if no Chrome is found.
async fn launch_browser(
    profile_dir: &Path,
    chrome_exe: Option<PathBuf>,
    user_agent: &str,
) -> Result<(Browser, Handler)> {
    // Config build fails when no Chrome can be located
    let launch_result = match build_browser_config(profile_dir, chrome_exe.as_deref(), user_agent) {
        Ok(config) => Browser::launch(config).await.map_err(FireprobeError::from),
        Err(e) => Err(e),
    };

    match (launch_result, chrome_exe) {
        (Ok(pair), _) => Ok(pair),
        // An explicit or managed Chrome that fails to start is not retried
        (Err(e), Some(exe)) => Err(FireprobeError::ConfigError(format!(
            "Failed to launch browser with Chrome at {:?}: {}",
            exe, e
        ))),
        (Err(_), None) => {
            warn!("Chrome not found, downloading Chromium automatically... (run `fireprobe setup` to pre-install)");
            let exe = crate::browser::download_chrome(false).await?;

            let config = build_browser_config(profile_dir, Some(&exe), user_agent)?;
            Browser::launch(config).await.map_err(|e| {
                FireprobeError::ConfigError(format!(
                    "Failed to launch browser even after downloading Chromium: {}",
                    e
                ))
            })
        }
    }
}
