//! # slideforge
//!
//! Resolve the remote assets and diagrams of a generated slide deck, and
//! normalize its content density, ahead of layout.
//!
//! ## Why this crate?
//!
//! Deck generators emit slide documents that reference assets by share
//! link — URLs that answer with redirect chains, confirmation
//! interstitials, or scan warnings instead of bytes. Naive download code
//! happily saves those HTML pages as `video.mp4`. This crate classifies
//! every downloaded file by its magic bytes, escalates through cheaper to
//! heavier retrieval strategies (direct HTTP → export endpoints → a real
//! headless browser), and renders declarative diagrams to rasters, so the
//! layout stage downstream only ever sees genuine media files.
//!
//! ## Pipeline Overview
//!
//! ```text
//! deck JSON
//!  │
//!  ├─ 1. Aggregate  merge/filter/split requirement slides to ≤10 blocks
//!  ├─ 2. Fetch      concurrent multi-strategy downloads (all-settled)
//!  ├─ 3. Validate   magic-byte check on every retrieved file
//!  ├─ 4. Diagram    mermaid CLI renders, placeholder on failure
//!  └─ 5. Output     per-slide asset lookup + run stats (manifest.json)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slideforge::{load_deck, resolve_deck, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let deck = load_deck("slides.json").await?;
//!     let config = PipelineConfig::builder()
//!         .assets_dir("assets")
//!         .build()?;
//!     let resolved = resolve_deck(deck, &config).await?;
//!     eprintln!(
//!         "{} assets resolved, {} failed",
//!         resolved.stats.downloads_succeeded,
//!         resolved.stats.downloads_failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slideforge` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! slideforge = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;
pub mod slides;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    MediaFallback, PipelineConfig, PipelineConfigBuilder, SectionVocabulary, DEFAULT_USER_AGENT,
};
pub use error::PipelineError;
pub use output::{AssetKind, AssetResult, ResolvedDeck, RunStats};
pub use progress::PipelineProgressCallback;
pub use run::{load_deck, resolve_deck, resolve_deck_to_dir};
pub use slides::{
    ContentBlock, DiagramSpec, MediaKind, MediaReference, SlideDeck, SlideDescriptor,
};
