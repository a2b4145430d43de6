//! Pipeline stages for slide-deck asset resolution.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch the diagram engine) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! aggregate ──▶ fetch ──▶ validate ──▶ diagram
//! (merge/split)  (HTTP +    (magic      (mermaid +
//!                 browser)    bytes)      placeholder)
//! ```
//!
//! 1. [`aggregate`] — merge, filter, and split requirement slides to the
//!    configured per-slide density bound; pure, runs before any I/O
//! 2. [`share`]     — recognise share links and derive their export /
//!    confirmation / view URL forms
//! 3. [`fetch`]     — ordered multi-strategy retrieval of one remote asset;
//!    the only stage with network I/O
//! 4. [`browser`]   — headless-browser download fallback for assets no
//!    direct HTTP strategy can reach; runs in `spawn_blocking` because the
//!    browser handle is not async-safe
//! 5. [`validate`]  — magic-byte prefix classification of downloaded files;
//!    the gate every retrieval strategy must pass
//! 6. [`diagram`]   — render diagram source to a raster via the external
//!    CLI, with a generated placeholder on failure

pub mod aggregate;
pub mod browser;
pub mod diagram;
pub mod fetch;
pub mod share;
pub mod validate;
