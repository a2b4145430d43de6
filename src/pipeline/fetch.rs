//! Remote asset retrieval: turn an unreliable URL into a validated local
//! file, or a definitive `None`.
//!
//! ## Strategy chain, not nested fallbacks
//!
//! Share links fail in layered ways — redirect chains, export endpoints,
//! confirmation interstitials, and finally pages that only a real browser
//! can get a file out of. Rather than nested conditionals, the fallback
//! sequence is an explicit ordered [`Strategy`] list driven by a single
//! loop: each strategy either produces a file that passes magic-byte
//! validation or reports a [`FetchError`], and the driver logs it and moves
//! on. Exhausting the list yields `None` — never an `Err` — so one bad
//! asset can never abort the run.
//!
//! A rejected download is deleted before the next strategy runs; exhausting
//! every strategy leaves no partial file on disk.

use crate::config::PipelineConfig;
use crate::error::{FetchError, PipelineError};
use crate::pipeline::browser::BrowserSession;
use crate::pipeline::{share, validate};
use crate::slides::MediaKind;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ephemeral description of one asset download, one per eligible slide.
///
/// `dest` is unique per task: it is derived from the slide index, and a
/// slide requests at most one media item.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub slide_index: usize,
    pub kind: MediaKind,
    pub url: String,
    pub dest: PathBuf,
}

/// One rung of the fallback ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Plain GET with manual bounded-redirect following.
    Direct,
    /// Canonical share-link export-download endpoint.
    DriveExport,
    /// Export endpoint again, echoing the interstitial's confirmation token.
    DriveExportConfirmed,
    /// Inline "view" endpoint; images only.
    DriveView,
    /// Headless-browser session as the last resort.
    Browser,
}

/// The ordered strategies applicable to `url`. Plain URLs skip the
/// share-link rungs entirely.
fn strategies_for(url: &str, kind: MediaKind) -> Vec<Strategy> {
    if share::is_share_link(url) {
        let mut chain = vec![
            Strategy::Direct,
            Strategy::DriveExport,
            Strategy::DriveExportConfirmed,
        ];
        if kind == MediaKind::Image {
            chain.push(Strategy::DriveView);
        }
        chain.push(Strategy::Browser);
        chain
    } else {
        vec![Strategy::Direct, Strategy::Browser]
    }
}

/// What a single HTTP retrieval produced.
enum Retrieved {
    /// Binary content written to the destination and validated.
    File(PathBuf),
    /// The server answered with markup — an interstitial or error page.
    /// Nothing was written to disk.
    Markup(String),
}

/// Resilient retriever shared by all download tasks of a run.
pub struct Fetcher {
    client: reqwest::Client,
    browser: Option<BrowserSession>,
    redirect_limit: u32,
}

impl Fetcher {
    /// Build the shared HTTP client. Redirects are disabled on the client —
    /// the bounded manual loop in [`Self::get_with_redirects`] owns them.
    pub fn new(
        config: &PipelineConfig,
        browser: Option<BrowserSession>,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PipelineError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            browser,
            redirect_limit: config.redirect_limit,
        })
    }

    /// Fetch `url` into `dest`, expecting `kind`.
    ///
    /// Tries every applicable strategy in order, stopping at the first one
    /// whose output passes magic-byte validation. Ordinary network and
    /// validation failures are logged, never propagated.
    pub async fn fetch(&self, url: &str, dest: &Path, kind: MediaKind) -> Option<PathBuf> {
        for strategy in strategies_for(url, kind) {
            match self.attempt(strategy, url, dest, kind).await {
                Ok(path) => {
                    info!(
                        "fetched {} via {:?} → {}",
                        url,
                        strategy,
                        path.display()
                    );
                    return Some(path);
                }
                Err(FetchError::NotApplicable) => continue,
                Err(e) => {
                    debug!("strategy {:?} failed for {}: {}", strategy, url, e);
                }
            }
        }
        warn!("all retrieval strategies exhausted for {url}");
        None
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        url: &str,
        dest: &Path,
        kind: MediaKind,
    ) -> Result<PathBuf, FetchError> {
        match strategy {
            Strategy::Direct => match self.retrieve(url, dest, kind).await? {
                Retrieved::File(path) => Ok(path),
                Retrieved::Markup(_) => Err(FetchError::Validation {
                    kind: kind.as_str(),
                }),
            },

            Strategy::DriveExport => {
                let id = share::extract_file_id(url).ok_or(FetchError::NotApplicable)?;
                match self
                    .retrieve(&share::export_download_url(id), dest, kind)
                    .await?
                {
                    Retrieved::File(path) => Ok(path),
                    Retrieved::Markup(_) => Err(FetchError::Validation {
                        kind: kind.as_str(),
                    }),
                }
            }

            Strategy::DriveExportConfirmed => {
                let id = share::extract_file_id(url).ok_or(FetchError::NotApplicable)?;
                // Re-fetch the export page to scrape its confirmation token.
                let export = share::export_download_url(id);
                let token = match self.retrieve(&export, dest, kind).await? {
                    // The plain export URL now serves the file after all —
                    // accept it rather than insisting on the interstitial.
                    Retrieved::File(path) => return Ok(path),
                    Retrieved::Markup(html) => share::extract_confirm_token(&html)
                        .unwrap_or(share::FALLBACK_CONFIRM)
                        .to_string(),
                };
                debug!("retrying export with confirmation token for id {id}");
                match self
                    .retrieve(
                        &share::export_download_url_confirmed(id, &token),
                        dest,
                        kind,
                    )
                    .await?
                {
                    Retrieved::File(path) => Ok(path),
                    Retrieved::Markup(_) => Err(FetchError::Validation {
                        kind: kind.as_str(),
                    }),
                }
            }

            Strategy::DriveView => {
                if kind != MediaKind::Image {
                    return Err(FetchError::NotApplicable);
                }
                let id = share::extract_file_id(url).ok_or(FetchError::NotApplicable)?;
                match self.retrieve(&share::export_view_url(id), dest, kind).await? {
                    Retrieved::File(path) => Ok(path),
                    Retrieved::Markup(_) => Err(FetchError::Validation {
                        kind: kind.as_str(),
                    }),
                }
            }

            Strategy::Browser => {
                let session = self.browser.as_ref().ok_or(FetchError::NotApplicable)?;
                let path = session.download(url, dest).await?;
                if validate::validate(&path, kind) {
                    Ok(path)
                } else {
                    let _ = tokio::fs::remove_file(&path).await;
                    Err(FetchError::Validation {
                        kind: kind.as_str(),
                    })
                }
            }
        }
    }

    /// One HTTP retrieval: follow redirects, sniff markup, otherwise write
    /// to `dest` and gate on magic bytes (deleting on rejection).
    async fn retrieve(
        &self,
        url: &str,
        dest: &Path,
        kind: MediaKind,
    ) -> Result<Retrieved, FetchError> {
        let response = self.get_with_redirects(url).await?;

        let html_content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/html"))
            .unwrap_or(false);

        let bytes = response.bytes().await?;

        if html_content_type || validate::looks_like_html(&bytes) {
            return Ok(Retrieved::Markup(
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }

        tokio::fs::write(dest, &bytes).await?;
        if validate::validate(dest, kind) {
            Ok(Retrieved::File(dest.to_path_buf()))
        } else {
            let _ = tokio::fs::remove_file(dest).await;
            Err(FetchError::Validation {
                kind: kind.as_str(),
            })
        }
    }

    /// GET with manual redirect following.
    ///
    /// Each 3xx response's `Location` is resolved against the current URL
    /// (relative redirects are legal) and the budget decrements; exceeding
    /// it is a terminal failure for the calling strategy.
    async fn get_with_redirects(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut current =
            reqwest::Url::parse(url).map_err(|e| FetchError::BadUrl(e.to_string()))?;

        for hop in 0..=self.redirect_limit {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(FetchError::MissingLocation)?;
                let next = current
                    .join(location)
                    .map_err(|e| FetchError::BadUrl(e.to_string()))?;
                debug!("redirect hop {}: {} → {}", hop + 1, current, next);
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::BadStatus(status));
            }
            return Ok(response);
        }

        Err(FetchError::RedirectLimit(self.redirect_limit))
    }
}

/// Extensions accepted as-is from the URL path; anything else falls back to
/// the kind's default so destinations stay predictable.
const KNOWN_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "mp4", "mov", "m4v", "webm"];

/// Infer the destination extension for `url`, defaulting per `kind`.
pub fn infer_extension(url: &str, kind: MediaKind) -> &'static str {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if let Some((_, ext)) = last.rsplit_once('.') {
                    let ext = ext.to_ascii_lowercase();
                    if let Some(known) = KNOWN_EXTENSIONS.iter().find(|k| **k == ext) {
                        return known;
                    }
                }
            }
        }
    }
    kind.default_extension()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_links_get_the_full_chain() {
        let chain = strategies_for(
            "https://drive.google.com/file/d/1AbCdEfGhIjKlMnOp/view",
            MediaKind::Image,
        );
        assert_eq!(
            chain,
            vec![
                Strategy::Direct,
                Strategy::DriveExport,
                Strategy::DriveExportConfirmed,
                Strategy::DriveView,
                Strategy::Browser,
            ]
        );
    }

    #[test]
    fn video_share_links_skip_the_view_endpoint() {
        let chain = strategies_for(
            "https://drive.google.com/file/d/1AbCdEfGhIjKlMnOp/view",
            MediaKind::Video,
        );
        assert!(!chain.contains(&Strategy::DriveView));
        assert!(chain.contains(&Strategy::DriveExportConfirmed));
    }

    #[test]
    fn plain_urls_go_direct_then_browser() {
        let chain = strategies_for("https://example.com/clip.mp4", MediaKind::Video);
        assert_eq!(chain, vec![Strategy::Direct, Strategy::Browser]);
    }

    #[test]
    fn extension_inferred_from_url_path() {
        assert_eq!(
            infer_extension("https://example.com/media/clip.MP4?x=1", MediaKind::Video),
            "mp4"
        );
        assert_eq!(
            infer_extension("https://example.com/pic.jpeg", MediaKind::Image),
            "jpeg"
        );
    }

    #[test]
    fn extension_defaults_per_kind() {
        assert_eq!(
            infer_extension("https://drive.google.com/file/d/1AbCdEfGhIj/view", MediaKind::Video),
            "mp4"
        );
        assert_eq!(
            infer_extension("https://example.com/download", MediaKind::Image),
            "png"
        );
        assert_eq!(infer_extension("not a url", MediaKind::Image), "png");
    }
}
