//! Configuration types for a pipeline run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::PipelineError;
use crate::progress::PipelineProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Conventional browser user-agent sent with every direct HTTP attempt.
///
/// Share hosts serve interstitial pages (or outright 403s) to clients that
/// identify as a script; a mainstream UA string gets the same responses a
/// person's browser would, which is what the strategy chain is written for.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

/// Configuration for a slide-deck asset-resolution run.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use slideforge::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .assets_dir("out/assets")
///     .max_blocks_per_slide(10)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory receiving fetched media and rendered diagrams. Default: `assets`.
    pub assets_dir: PathBuf,

    /// Density bound `K`: maximum content blocks per aggregated slide. Default: 10.
    ///
    /// Slides above the bound are split during aggregation; at or below it
    /// they pass through with a normalized title. 10 items fill a bulleted
    /// slide comfortably at deck font sizes without overflowing it.
    pub max_blocks_per_slide: usize,

    /// Minimum block count below which an all-trivial slide is dropped. Default: 3.
    pub min_blocks_per_slide: usize,

    /// Category title prefix identifying the slide runs to normalize.
    /// Default: `"System Requirements"`.
    pub aggregate_category: String,

    /// Section vocabulary recognized as header blocks during aggregation.
    pub section_vocabulary: SectionVocabulary,

    /// Number of concurrent download tasks. Default: 8.
    ///
    /// Downloads are network-bound, not CPU-bound; fanning out cuts
    /// wall-clock time roughly linearly until the link saturates. The
    /// browser fallback serializes internally on the shared session, so this
    /// only bounds the HTTP strategies.
    pub concurrency: usize,

    /// Per-request timeout for direct HTTP attempts, in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Maximum redirect hops the direct strategy will follow. Default: 5.
    ///
    /// Exceeding the budget is a terminal failure for that strategy only —
    /// the driver falls through to the next one.
    pub redirect_limit: u32,

    /// User-agent header for direct HTTP attempts.
    pub user_agent: String,

    /// Whether the headless-browser fallback may be used. Default: true.
    ///
    /// Disable in environments without a Chrome/Chromium binary; share links
    /// that need the fallback will then surface as `*_failed` results.
    pub browser_fallback: bool,

    /// Seconds to wait for a browser-triggered download to land. Default: 60.
    pub browser_download_timeout_secs: u64,

    /// What to do when a slide's preferred video reference fails.
    pub media_fallback: MediaFallback,

    /// Command invoked to render diagram source. Default: `mmdc`.
    ///
    /// Only the executable name/path — arguments are fixed by the renderer
    /// (dark theme, transparent background).
    pub mermaid_command: String,

    /// Per-asset progress callback.
    pub progress_callback: Option<Arc<dyn PipelineProgressCallback>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            max_blocks_per_slide: 10,
            min_blocks_per_slide: 3,
            aggregate_category: "System Requirements".to_string(),
            section_vocabulary: SectionVocabulary::default(),
            concurrency: 8,
            request_timeout_secs: 30,
            redirect_limit: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            browser_fallback: true,
            browser_download_timeout_secs: 60,
            media_fallback: MediaFallback::default(),
            mermaid_command: "mmdc".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("assets_dir", &self.assets_dir)
            .field("max_blocks_per_slide", &self.max_blocks_per_slide)
            .field("min_blocks_per_slide", &self.min_blocks_per_slide)
            .field("aggregate_category", &self.aggregate_category)
            .field("concurrency", &self.concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("redirect_limit", &self.redirect_limit)
            .field("browser_fallback", &self.browser_fallback)
            .field("media_fallback", &self.media_fallback)
            .field("mermaid_command", &self.mermaid_command)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.assets_dir = dir.into();
        self
    }

    pub fn max_blocks_per_slide(mut self, k: usize) -> Self {
        self.config.max_blocks_per_slide = k.max(2);
        self
    }

    pub fn min_blocks_per_slide(mut self, n: usize) -> Self {
        self.config.min_blocks_per_slide = n;
        self
    }

    pub fn aggregate_category(mut self, category: impl Into<String>) -> Self {
        self.config.aggregate_category = category.into();
        self
    }

    pub fn section_vocabulary(mut self, vocab: SectionVocabulary) -> Self {
        self.config.section_vocabulary = vocab;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn redirect_limit(mut self, n: u32) -> Self {
        self.config.redirect_limit = n;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn browser_fallback(mut self, enabled: bool) -> Self {
        self.config.browser_fallback = enabled;
        self
    }

    pub fn browser_download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.browser_download_timeout_secs = secs.max(1);
        self
    }

    pub fn media_fallback(mut self, policy: MediaFallback) -> Self {
        self.config.media_fallback = policy;
        self
    }

    pub fn mermaid_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.mermaid_command = cmd.into();
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn PipelineProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.max_blocks_per_slide < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "max_blocks_per_slide must be ≥ 2, got {}",
                c.max_blocks_per_slide
            )));
        }
        if c.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        if c.aggregate_category.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "aggregate_category must not be empty".into(),
            ));
        }
        if c.mermaid_command.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "mermaid_command must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums & vocabulary ───────────────────────────────────────────────────

/// Policy for a slide whose preferred video reference failed every strategy.
///
/// The upstream mapper emits both a video and an image URL for many module
/// slides, with video implicitly preferred. What happens when the video is
/// unreachable is an explicit, testable rule here rather than an accident
/// of fallthrough order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFallback {
    /// Retry the slide's image reference after a failed video; only if that
    /// also fails does the slide record `video_failed`. (default)
    #[default]
    ImageOnVideoFailure,
    /// Never substitute: a failed video is recorded as `video_failed` even
    /// when an image reference exists.
    Never,
}

/// The set of block texts recognized as section headers during aggregation.
///
/// A membership test injected as configuration, so new section categories
/// can be added without touching the aggregation algorithm. Matching is
/// exact after whitespace trimming; header candidates are level-0 blocks
/// with no `key: value` separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionVocabulary {
    sections: BTreeSet<String>,
}

impl Default for SectionVocabulary {
    /// The subsection names the upstream requirement sections actually use.
    fn default() -> Self {
        Self::new([
            "Network",
            "Camera",
            "AI Training",
            "AI Training Workstation",
            "AI Inference",
            "AI Inference Workstation",
            "Dashboard",
            "Dashboard Workstation",
            "Storage",
            "Server",
        ])
    }
}

impl SectionVocabulary {
    /// Build a vocabulary from any iterable of names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sections: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `text` (trimmed) names a known section.
    pub fn contains(&self, text: &str) -> bool {
        self.sections.contains(text.trim())
    }

    /// Add a section name.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.sections.insert(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.max_blocks_per_slide, 10);
        assert_eq!(config.redirect_limit, 5);
        assert_eq!(config.media_fallback, MediaFallback::ImageOnVideoFailure);
    }

    #[test]
    fn builder_clamps_degenerate_values() {
        let config = PipelineConfig::builder()
            .concurrency(0)
            .max_blocks_per_slide(0)
            .build()
            .unwrap();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_blocks_per_slide, 2);
    }

    #[test]
    fn empty_category_rejected() {
        let err = PipelineConfig::builder()
            .aggregate_category("  ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("aggregate_category"));
    }

    #[test]
    fn vocabulary_trims_before_lookup() {
        let vocab = SectionVocabulary::default();
        assert!(vocab.contains("Network"));
        assert!(vocab.contains("  Camera  "));
        assert!(!vocab.contains("Networking"));
    }

    #[test]
    fn vocabulary_is_extensible() {
        let mut vocab = SectionVocabulary::new(["Edge"]);
        vocab.insert("Gateway");
        assert!(vocab.contains("Gateway"));
        assert!(!vocab.contains("Network"));
    }
}
