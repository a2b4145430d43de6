//! Output types: per-slide asset results, run statistics, and the resolved
//! deck handed to the external rendering stage.
//!
//! A failed asset is *data*, not an error: the [`AssetResult`] keeps the
//! original source URL so the rendering stage can surface a manual-insertion
//! hint instead of silently dropping the reference.

use crate::slides::SlideDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What a resolved (or failed) asset is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Video,
    Diagram,
    ImageFailed,
    VideoFailed,
}

impl AssetKind {
    /// Whether this kind marks a failed resolution.
    pub fn is_failure(self) -> bool {
        matches!(self, AssetKind::ImageFailed | AssetKind::VideoFailed)
    }
}

/// The outcome of resolving one slide's asset.
///
/// `path` is `Some` exactly when `kind` is a success kind. For failures the
/// original `source_url` is retained for manual follow-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetResult {
    pub slide_index: usize,
    pub kind: AssetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl AssetResult {
    /// A successful resolution.
    pub fn resolved(slide_index: usize, kind: AssetKind, path: PathBuf) -> Self {
        debug_assert!(!kind.is_failure());
        Self {
            slide_index,
            kind,
            path: Some(path),
            source_url: None,
        }
    }

    /// A definitive failure, retaining the URL for a manual-insertion hint.
    pub fn failed(slide_index: usize, kind: AssetKind, source_url: impl Into<String>) -> Self {
        debug_assert!(kind.is_failure());
        Self {
            slide_index,
            kind,
            path: None,
            source_url: Some(source_url.into()),
        }
    }
}

/// The pipeline's result: normalized slides plus the per-slide asset lookup.
///
/// Both halves are inputs to the external HTML-layout stage. The lookup is
/// keyed by index into `slides` and holds at most one entry per slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedDeck {
    pub project_name: String,
    pub slides: Vec<SlideDescriptor>,
    pub assets: HashMap<usize, AssetResult>,
    pub stats: RunStats,
}

/// Statistics about a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Slide count before aggregation.
    pub input_slides: usize,
    /// Slide count after aggregation.
    pub output_slides: usize,
    /// Download tasks attempted.
    pub download_tasks: usize,
    /// Download tasks that produced a validated file.
    pub downloads_succeeded: usize,
    /// Download tasks that exhausted every strategy.
    pub downloads_failed: usize,
    /// Diagram renders attempted (empty sources are not counted).
    pub diagrams_rendered: usize,
    /// Diagram renders that fell back to a placeholder image.
    pub diagram_placeholders: usize,
    /// Wall-clock duration of the whole run.
    pub total_duration_ms: u64,
    /// Wall-clock duration of the concurrent download phase.
    pub download_duration_ms: u64,
    /// Wall-clock duration of the sequential diagram phase.
    pub diagram_duration_ms: u64,
}
