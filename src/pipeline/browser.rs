//! Shared headless-browser session for the last-resort download strategy.
//!
//! ## Why spawn_blocking?
//!
//! The `headless_chrome` crate drives Chrome over a blocking websocket;
//! every call can stall for seconds. `tokio::task::spawn_blocking` moves the
//! work onto the blocking thread pool so the Tokio workers never stall,
//! the same way the CPU-bound engine work is handled elsewhere in the
//! pipeline.
//!
//! ## Shared-session policy
//!
//! The session is a single shared resource: launched lazily at most once per
//! run (launching Chrome per asset would dominate the run's cost), shared by
//! every fallback attempt, dropped once at the end of the run. Each attempt
//! opens its own tab inside the session and closes it on every exit path, so
//! concurrent attempts never interleave on one page and tabs never leak.

use crate::error::FetchError;
use headless_chrome::protocol::cdp::Browser::{
    SetDownloadBehavior, SetDownloadBehaviorBehaviorOption,
};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Candidate selectors for the interstitial page's download control, in
/// priority order. The first two are the Drive confirmation page's own
/// controls; the rest are generic fallbacks.
const DOWNLOAD_CONTROL_SELECTORS: [&str; 5] = [
    "#uc-download-link",
    "form#download-form [type='submit']",
    "form#download-form button",
    "a[href*='confirm=']",
    "a[download]",
];

/// How long a navigated page gets to trigger a download on its own before
/// we start looking for a confirmation control to click.
const SPONTANEOUS_DOWNLOAD_GRACE: Duration = Duration::from_secs(4);

/// A lazily-launched, shareable handle to one headless-browser session.
///
/// Cloning is cheap; all clones share the same underlying session. The
/// browser process exits when the last clone is dropped.
#[derive(Clone)]
pub struct BrowserSession {
    browser: Arc<OnceCell<Result<Browser, String>>>,
    download_timeout: Duration,
}

impl BrowserSession {
    /// Create an unlaunched session handle.
    ///
    /// Chrome is not started here — only on the first [`Self::download`]
    /// call, so runs whose every asset resolves over plain HTTP never pay
    /// for a browser launch.
    pub fn new(download_timeout: Duration) -> Self {
        Self {
            browser: Arc::new(OnceCell::new()),
            download_timeout,
        }
    }

    async fn browser(&self) -> Result<Browser, FetchError> {
        let result = self
            .browser
            .get_or_init(|| async {
                tokio::task::spawn_blocking(launch_blocking)
                    .await
                    .unwrap_or_else(|e| Err(format!("launch task panicked: {e}")))
            })
            .await;
        result.clone().map_err(FetchError::Browser)
    }

    /// Navigate to `url`, capture the file it downloads, and persist it at
    /// `dest`.
    ///
    /// Waits first for a spontaneously-triggered download; if none appears,
    /// looks for a confirmation page's download control and activates it.
    /// The attempt's tab is closed on success, failure, and panic-free error
    /// paths alike.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, FetchError> {
        let browser = self.browser().await?;
        let url = url.to_string();
        let dest = dest.to_path_buf();
        let timeout = self.download_timeout;

        tokio::task::spawn_blocking(move || download_blocking(&browser, &url, &dest, timeout))
            .await
            .map_err(|e| FetchError::Browser(format!("download task panicked: {e}")))?
    }
}

// ── Blocking implementation ──────────────────────────────────────────────

fn launch_blocking() -> Result<Browser, String> {
    info!("Launching shared headless-browser session");
    let options = LaunchOptions::default_builder()
        .headless(true)
        .idle_browser_timeout(Duration::from_secs(600))
        .build()
        .map_err(|e| format!("bad launch options: {e}"))?;
    Browser::new(options).map_err(|e| format!("could not launch browser: {e}"))
}

fn download_blocking(
    browser: &Browser,
    url: &str,
    dest: &Path,
    timeout: Duration,
) -> Result<PathBuf, FetchError> {
    // Scratch dir next to the destination so the final move stays on one
    // filesystem; cleaned up on drop.
    let scratch_parent = dest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    let scratch = tempfile::Builder::new()
        .prefix(".slideforge-dl-")
        .tempdir_in(&scratch_parent)?;

    let tab = browser
        .new_tab()
        .map_err(|e| FetchError::Browser(format!("new tab: {e}")))?;
    tab.set_default_timeout(timeout);

    // Tab must be closed on every exit path.
    let result = drive_tab(&tab, url, scratch.path(), timeout);
    if let Err(e) = tab.close(true) {
        debug!("tab close failed (already gone?): {e}");
    }

    let downloaded = result?;
    move_file(&downloaded, dest)?;
    debug!("browser download captured: {}", dest.display());
    Ok(dest.to_path_buf())
}

fn drive_tab(tab: &Arc<Tab>, url: &str, scratch: &Path, timeout: Duration) -> Result<PathBuf, FetchError> {
    tab.call_method(SetDownloadBehavior {
        behavior: SetDownloadBehaviorBehaviorOption::Allow,
        browser_context_id: None,
        download_path: Some(scratch.to_string_lossy().into_owned()),
        events_enabled: Some(true),
    })
    .map_err(|e| FetchError::Browser(format!("set download behavior: {e}")))?;

    tab.navigate_to(url)
        .map_err(|e| FetchError::Browser(format!("navigate: {e}")))?;
    // Navigation may itself be aborted by a triggered download; that is the
    // good case, so the error is only logged.
    if let Err(e) = tab.wait_until_navigated() {
        debug!("wait_until_navigated: {e} (may be a triggered download)");
    }

    // The URL may trigger a download directly, or load a confirmation page.
    if let Some(file) = wait_for_download(scratch, SPONTANEOUS_DOWNLOAD_GRACE) {
        return Ok(file);
    }

    // Confirmation page: locate and activate its download control.
    let mut clicked = false;
    for selector in DOWNLOAD_CONTROL_SELECTORS {
        match tab.wait_for_element_with_custom_timeout(selector, Duration::from_secs(2)) {
            Ok(element) => {
                debug!("clicking download control '{selector}'");
                element
                    .click()
                    .map_err(|e| FetchError::Browser(format!("click {selector}: {e}")))?;
                clicked = true;
                break;
            }
            Err(_) => continue,
        }
    }
    if !clicked {
        return Err(FetchError::Browser(
            "no download triggered and no download control found".into(),
        ));
    }

    wait_for_download(scratch, timeout).ok_or_else(|| {
        FetchError::Browser(format!(
            "no file landed within {}s after clicking",
            timeout.as_secs()
        ))
    })
}

/// Poll `dir` until a completed (non-partial, non-empty, size-stable) file
/// appears or `timeout` elapses.
fn wait_for_download(dir: &Path, timeout: Duration) -> Option<PathBuf> {
    let deadline = Instant::now() + timeout;
    let mut last_size: Option<(PathBuf, u64)> = None;

    while Instant::now() < deadline {
        if let Some((path, size)) = completed_candidate(dir) {
            match &last_size {
                // Two consecutive polls with a stable size: done writing.
                Some((prev_path, prev_size)) if *prev_path == path && *prev_size == size => {
                    return Some(path);
                }
                _ => last_size = Some((path, size)),
            }
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    None
}

fn completed_candidate(dir: &Path) -> Option<(PathBuf, u64)> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".crdownload") || name.ends_with(".tmp") || name.ends_with(".part") {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            if meta.is_file() && meta.len() > 0 {
                return Some((path, meta.len()));
            }
        }
    }
    None
}

fn move_file(from: &Path, to: &Path) -> Result<(), FetchError> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Cross-device fallback.
    std::fs::copy(from, to)?;
    if let Err(e) = std::fs::remove_file(from) {
        warn!("could not remove scratch file {}: {e}", from.display());
    }
    Ok(())
}
