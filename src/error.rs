//! Error types for the slideforge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the run cannot proceed at all (missing
//!   input document, malformed slide structure, output directory not
//!   writable). Returned as `Err(PipelineError)` from the top-level
//!   `resolve_deck*` functions.
//!
//! * [`FetchError`] — **Non-fatal**: a single retrieval strategy failed for
//!   a single asset (timeout, redirect budget exhausted, magic-byte
//!   mismatch). Never crosses the library boundary: the strategy driver in
//!   [`crate::pipeline::fetch`] logs it and falls through to the next
//!   strategy, and an asset whose every strategy failed surfaces as a
//!   `*_failed` [`crate::output::AssetResult`], as data.
//!
//! The separation is what makes partial-failure tolerance a first-class
//! property: one unreachable share link degrades one slide, never the run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slideforge library.
///
/// Per-asset failures use [`FetchError`] internally and are reported through
/// [`crate::output::AssetResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Slide-structure document was not found at the given path.
    #[error("Slide structure not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the input document.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The slide-structure document could not be deserialized.
    #[error("Invalid slide structure in '{path}': {detail}\nThe document must be the JSON emitted by the content-mapping stage.")]
    InvalidStructure { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the asset output directory.
    #[error("Failed to create asset directory '{path}': {source}")]
    AssetDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write an on-disk artifact (manifest, placeholder image).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of one retrieval strategy for one asset.
///
/// Produced and consumed inside [`crate::pipeline::fetch`]; the driver loop
/// logs the variant and moves on to the next strategy. Exhausting every
/// strategy yields `None` from `fetch`, not an `Err`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP request itself failed (connect, TLS, timeout).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success, non-redirect status.
    #[error("HTTP status {0}")]
    BadStatus(reqwest::StatusCode),

    /// More redirects than the configured budget allows.
    #[error("redirect budget exhausted after {0} hops")]
    RedirectLimit(u32),

    /// A redirect response carried no usable `Location` header.
    #[error("redirect without a Location header")]
    MissingLocation,

    /// The URL could not be parsed or joined.
    #[error("bad URL: {0}")]
    BadUrl(String),

    /// The strategy does not apply to this URL (e.g. Drive export on a
    /// plain URL); the driver skips it silently.
    #[error("strategy not applicable")]
    NotApplicable,

    /// Downloaded bytes failed magic-byte validation; the file was deleted.
    #[error("downloaded file failed {kind} validation")]
    Validation { kind: &'static str },

    /// The browser fallback could not produce a file.
    #[error("browser fallback failed: {0}")]
    Browser(String),

    /// Local file I/O failed while persisting the download.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
