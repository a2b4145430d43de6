//! Eager (full-deck) resolution entry points.
//!
//! ## Why eager?
//!
//! A deck is small — tens of slides, a handful of remote assets — so the
//! simple API is the right one: normalize the whole deck, settle every
//! download, render every diagram, then return one [`ResolvedDeck`]. The
//! run never aborts on a per-asset failure; failures surface as
//! [`AssetKind::ImageFailed`] / [`AssetKind::VideoFailed`] entries so the
//! layout stage downstream can show what is missing.

use crate::config::{MediaFallback, PipelineConfig};
use crate::error::PipelineError;
use crate::output::{AssetKind, AssetResult, ResolvedDeck, RunStats};
use crate::pipeline::browser::BrowserSession;
use crate::pipeline::fetch::{self, DownloadTask, Fetcher};
use crate::pipeline::{aggregate, diagram};
use crate::slides::{MediaKind, MediaReference, SlideDeck, SlideDescriptor};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Resolve a slide deck: normalize its slides and materialise every remote
/// asset and diagram under `config.assets_dir`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ResolvedDeck)` on success, even if some assets failed (check
/// `output.stats.downloads_failed` or the failure entries in `assets`).
///
/// # Errors
/// Returns `Err(PipelineError)` only for fatal errors: the asset directory
/// cannot be created, the HTTP client cannot be built, or a placeholder
/// image cannot be written.
pub async fn resolve_deck(
    deck: SlideDeck,
    config: &PipelineConfig,
) -> Result<ResolvedDeck, PipelineError> {
    let total_start = Instant::now();
    info!(
        "Starting resolution: {} ({} slides)",
        deck.project_name,
        deck.slides.len()
    );

    // ── Step 1: Normalize slide content ──────────────────────────────────
    let input_slides = deck.slides.len();
    let slides = aggregate::aggregate(deck.slides, config);
    let output_slides = slides.len();
    debug!("Aggregation: {input_slides} slides in, {output_slides} out");

    // ── Step 2: Prepare the asset directory ──────────────────────────────
    tokio::fs::create_dir_all(&config.assets_dir)
        .await
        .map_err(|e| PipelineError::AssetDirFailed {
            path: config.assets_dir.clone(),
            source: e,
        })?;

    // ── Step 3: Collect the work ─────────────────────────────────────────
    let tasks = download_tasks(&slides, config);
    let diagrams: Vec<(usize, String)> = slides
        .iter()
        .enumerate()
        .filter_map(|(idx, slide)| slide.diagram().map(|d| (idx, d.code.clone())))
        .filter(|(_, code)| !code.trim().is_empty())
        .collect();
    let download_task_count = tasks.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(download_task_count + diagrams.len());
    }

    // ── Step 4: Build the fetcher (one HTTP client, one lazy browser) ────
    let browser = config
        .browser_fallback
        .then(|| BrowserSession::new(Duration::from_secs(config.browser_download_timeout_secs)));
    let fetcher = Fetcher::new(config, browser)?;

    // ── Step 5: Settle all downloads concurrently ────────────────────────
    let download_start = Instant::now();
    let download_results: Vec<AssetResult> = stream::iter(tasks.into_iter().map(|task| {
        let fetcher = &fetcher;
        let slides = &slides;
        async move {
            let result = resolve_media(fetcher, task, slides, config).await;
            if let Some(ref cb) = config.progress_callback {
                cb.on_asset_done(result.slide_index, result.kind, !result.kind.is_failure());
            }
            result
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;
    let download_duration_ms = download_start.elapsed().as_millis() as u64;

    let downloads_succeeded = download_results
        .iter()
        .filter(|r| !r.kind.is_failure())
        .count();
    let downloads_failed = download_task_count - downloads_succeeded;
    info!(
        "Downloads settled: {downloads_succeeded}/{download_task_count} in {download_duration_ms}ms"
    );

    // ── Step 6: Render diagrams sequentially ─────────────────────────────
    // One external engine process at a time; diagram renders are CPU/IO
    // heavy and few, so there is nothing to win by overlapping them.
    let diagram_start = Instant::now();
    let mut diagram_results: Vec<AssetResult> = Vec::with_capacity(diagrams.len());
    let mut diagrams_rendered = 0usize;
    let mut diagram_placeholders = 0usize;
    for (idx, code) in diagrams {
        let output = config.assets_dir.join(format!("slide{idx:03}_diagram.png"));
        if let Some(outcome) = diagram::render(&code, &output, config).await? {
            if outcome.is_placeholder() {
                diagram_placeholders += 1;
            } else {
                diagrams_rendered += 1;
            }
            diagram_results.push(AssetResult::resolved(
                idx,
                AssetKind::Diagram,
                outcome.path().to_path_buf(),
            ));
            if let Some(ref cb) = config.progress_callback {
                cb.on_asset_done(idx, AssetKind::Diagram, true);
            }
        }
    }
    let diagram_duration_ms = diagram_start.elapsed().as_millis() as u64;

    // ── Step 7: Merge into the per-slide lookup ──────────────────────────
    // A slide carries either media or a diagram, never both, so each index
    // is written exactly once.
    let mut assets: HashMap<usize, AssetResult> = HashMap::new();
    for result in download_results.into_iter().chain(diagram_results) {
        assets.insert(result.slide_index, result);
    }

    let stats = RunStats {
        input_slides,
        output_slides,
        download_tasks: download_task_count,
        downloads_succeeded,
        downloads_failed,
        diagrams_rendered,
        diagram_placeholders,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        download_duration_ms,
        diagram_duration_ms,
    };

    info!(
        "Resolution complete: {} slides, {} assets, {}ms total",
        output_slides,
        assets.len(),
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(
            downloads_succeeded + diagrams_rendered + diagram_placeholders,
            downloads_failed,
        );
    }

    Ok(ResolvedDeck {
        project_name: deck.project_name,
        slides,
        assets,
        stats,
    })
}

/// Resolve a deck and write `manifest.json` into `output_dir`.
///
/// The manifest (normalized slides + asset lookup + stats) is the input
/// contract of the downstream layout stage. Uses atomic write (temp file +
/// rename) to prevent partial files.
pub async fn resolve_deck_to_dir(
    deck: SlideDeck,
    output_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ResolvedDeck, PipelineError> {
    let resolved = resolve_deck(deck, config).await?;
    let dir = output_dir.as_ref();
    let path = dir.join("manifest.json");

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    let json = serde_json::to_string_pretty(&resolved)
        .map_err(|e| PipelineError::Internal(format!("manifest serialization: {e}")))?;

    // Atomic write: write to temp, then rename
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    info!("Manifest written → {}", path.display());
    Ok(resolved)
}

/// Load a deck document from a JSON file.
pub async fn load_deck(path: impl AsRef<Path>) -> Result<SlideDeck, PipelineError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PipelineError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => PipelineError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PipelineError::Internal(format!("read '{}': {e}", path.display())),
    })?;

    serde_json::from_slice(&bytes).map_err(|e| PipelineError::InvalidStructure {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// One download task per slide that references remote media. Video is
/// preferred when a slide carries both a video and an image URL.
fn download_tasks(slides: &[SlideDescriptor], config: &PipelineConfig) -> Vec<DownloadTask> {
    slides
        .iter()
        .enumerate()
        .filter_map(|(idx, slide)| {
            slide.media_reference().map(|media| DownloadTask {
                slide_index: idx,
                kind: media.kind,
                dest: media_dest(config, idx, &media),
                url: media.url,
            })
        })
        .collect()
}

fn media_dest(config: &PipelineConfig, idx: usize, media: &MediaReference) -> PathBuf {
    let ext = fetch::infer_extension(&media.url, media.kind);
    config.assets_dir.join(format!("slide{idx:03}.{ext}"))
}

fn resolved_kind(kind: MediaKind) -> AssetKind {
    match kind {
        MediaKind::Image => AssetKind::Image,
        MediaKind::Video => AssetKind::Video,
    }
}

fn failed_kind(kind: MediaKind) -> AssetKind {
    match kind {
        MediaKind::Image => AssetKind::ImageFailed,
        MediaKind::Video => AssetKind::VideoFailed,
    }
}

/// Settle one media task. Never errors: an exhausted fetch becomes a
/// failure entry, optionally after the image-on-video-failure fallback.
async fn resolve_media(
    fetcher: &Fetcher,
    task: DownloadTask,
    slides: &[SlideDescriptor],
    config: &PipelineConfig,
) -> AssetResult {
    if let Some(path) = fetcher.fetch(&task.url, &task.dest, task.kind).await {
        return AssetResult::resolved(task.slide_index, resolved_kind(task.kind), path);
    }

    if task.kind == MediaKind::Video && config.media_fallback == MediaFallback::ImageOnVideoFailure
    {
        if let Some(image) = slides
            .get(task.slide_index)
            .and_then(|slide| slide.image_reference())
        {
            warn!(
                "video failed for slide {}; trying image fallback",
                task.slide_index
            );
            let dest = media_dest(config, task.slide_index, &image);
            if let Some(path) = fetcher.fetch(&image.url, &dest, MediaKind::Image).await {
                return AssetResult::resolved(task.slide_index, AssetKind::Image, path);
            }
        }
    }

    AssetResult::failed(task.slide_index, failed_kind(task.kind), task.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slides::ContentBlock;

    fn config_in(dir: &Path) -> PipelineConfig {
        PipelineConfig::builder()
            .assets_dir(dir.join("assets"))
            .browser_fallback(false)
            .build()
            .unwrap()
    }

    fn media_slide(video: Option<&str>, image: Option<&str>) -> SlideDescriptor {
        SlideDescriptor::ModuleDescription {
            title: "Camera Module".into(),
            module_type: "camera".into(),
            content: crate::slides::ModuleContent::default(),
            image_url: image.map(Into::into),
            video_url: video.map(Into::into),
        }
    }

    #[test]
    fn tasks_prefer_video_and_skip_media_free_slides() {
        let slides = vec![
            SlideDescriptor::Title {
                title: "Deck".into(),
                subtitle: None,
                date: None,
            },
            media_slide(Some("https://example.com/clip.mp4"), Some("https://example.com/still.png")),
            media_slide(None, Some("https://example.com/only.jpg")),
        ];
        let config = config_in(Path::new("/tmp"));
        let tasks = download_tasks(&slides, &config);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].slide_index, 1);
        assert_eq!(tasks[0].kind, MediaKind::Video);
        assert!(tasks[0].dest.ends_with("slide001.mp4"));
        assert_eq!(tasks[1].slide_index, 2);
        assert_eq!(tasks[1].kind, MediaKind::Image);
        assert!(tasks[1].dest.ends_with("slide002.jpg"));
    }

    #[tokio::test]
    async fn media_free_deck_resolves_with_empty_assets() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let deck = SlideDeck {
            project_name: "Test Project".into(),
            total_slides: 2,
            slides: vec![
                SlideDescriptor::Title {
                    title: "Test Project".into(),
                    subtitle: Some("Proposal".into()),
                    date: None,
                },
                SlideDescriptor::ContentBullets {
                    title: "Scope".into(),
                    content: vec![ContentBlock::new(0, "One site")],
                },
            ],
        };

        let out = resolve_deck(deck, &config).await.unwrap();
        assert_eq!(out.project_name, "Test Project");
        assert_eq!(out.slides.len(), 2);
        assert!(out.assets.is_empty());
        assert_eq!(out.stats.download_tasks, 0);
        assert_eq!(out.stats.input_slides, 2);
        assert_eq!(out.stats.output_slides, 2);
        assert!(config.assets_dir.is_dir(), "assets dir must be created");
    }

    #[tokio::test]
    async fn empty_diagram_source_yields_no_asset_entry() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let deck = SlideDeck {
            project_name: "Diagrams".into(),
            total_slides: 1,
            slides: vec![SlideDescriptor::Diagram {
                title: "Architecture".into(),
                diagram: crate::slides::DiagramSpec {
                    diagram_type: "mermaid".into(),
                    code: "   ".into(),
                    description: None,
                },
            }],
        };

        let out = resolve_deck(deck, &config).await.unwrap();
        assert!(out.assets.is_empty());
        assert_eq!(out.stats.diagrams_rendered, 0);
        assert_eq!(out.stats.diagram_placeholders, 0);
    }

    #[tokio::test]
    async fn manifest_is_written_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let deck = SlideDeck {
            project_name: "Manifest".into(),
            total_slides: 1,
            slides: vec![SlideDescriptor::Title {
                title: "Manifest".into(),
                subtitle: None,
                date: None,
            }],
        };

        let out_dir = dir.path().join("out");
        resolve_deck_to_dir(deck, &out_dir, &config).await.unwrap();

        let manifest = out_dir.join("manifest.json");
        assert!(manifest.is_file());
        assert!(!out_dir.join("manifest.json.tmp").exists());
        let text = std::fs::read_to_string(&manifest).unwrap();
        let parsed: ResolvedDeck = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.project_name, "Manifest");
    }

    #[tokio::test]
    async fn load_deck_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = load_deck(dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(PipelineError::FileNotFound { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        let malformed = load_deck(&bad).await;
        assert!(matches!(
            malformed,
            Err(PipelineError::InvalidStructure { .. })
        ));
    }
}
