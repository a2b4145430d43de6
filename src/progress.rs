//! Progress-callback trait for per-asset pipeline events.
//!
//! Inject an `Arc<dyn PipelineProgressCallback>` via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! real-time events as assets resolve.
//!
//! # Why callbacks instead of channels?
//!
//! Callbacks are the least-invasive integration point: callers can forward
//! events to a broadcast channel, a WebSocket, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` because download tasks complete concurrently.

use crate::output::AssetKind;

/// Called by the pipeline as it resolves each asset.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_asset_done` may be called concurrently from
/// different tasks; implementations must protect shared mutable state.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once after aggregation, before any asset resolution starts.
    ///
    /// `total_assets` counts download tasks plus non-empty diagrams.
    fn on_run_start(&self, total_assets: usize) {
        let _ = total_assets;
    }

    /// Called when one asset settles, successfully or not.
    fn on_asset_done(&self, slide_index: usize, kind: AssetKind, ok: bool) {
        let _ = (slide_index, kind, ok);
    }

    /// Called once after every asset has settled.
    fn on_run_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}
