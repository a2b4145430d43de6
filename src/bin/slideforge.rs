//! CLI binary for slideforge.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slideforge::{
    load_deck, resolve_deck_to_dir, AssetKind, PipelineConfig, PipelineProgressCallback,
    ResolvedDeck,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-asset log
/// lines using [indicatif]. Works correctly when assets settle out-of-order
/// (the download fan-out is concurrent).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_run_start` (called once the deck has been normalized).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading deck…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} assets  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Resolving");
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_assets: usize) {
        self.activate_bar(total_assets);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Resolving {total_assets} assets…"))
        ));
    }

    fn on_asset_done(&self, slide_index: usize, kind: AssetKind, ok: bool) {
        let label = match kind {
            AssetKind::Image | AssetKind::ImageFailed => "image",
            AssetKind::Video | AssetKind::VideoFailed => "video",
            AssetKind::Diagram => "diagram",
        };
        if ok {
            self.bar.println(format!(
                "  {} Slide {:>3}  {}",
                green("✓"),
                slide_index,
                dim(label)
            ));
        } else {
            self.bar.println(format!(
                "  {} Slide {:>3}  {}",
                red("✗"),
                slide_index,
                red(&format!("{label} failed"))
            ));
        }
        self.bar.inc(1);
    }

    fn on_run_complete(&self, succeeded: usize, failed: usize) {
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} assets resolved successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} assets resolved  ({} failed)",
                cyan("⚠"),
                bold(&succeeded.to_string()),
                succeeded + failed,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Resolve a deck into ./out (assets under ./out/assets)
  slideforge slides.json -o out

  # Lower concurrency, longer HTTP timeout for slow share hosts
  slideforge slides.json -o out --concurrency 3 --timeout 90

  # Environments without Chrome: skip the browser fallback
  slideforge slides.json -o out --no-browser

  # Custom mermaid CLI location
  slideforge slides.json -o out --mermaid-cmd ./node_modules/.bin/mmdc

  # Print the manifest to stdout instead of writing it
  slideforge slides.json --json

RETRIEVAL STRATEGY CHAIN (per asset, cheapest first):
  1. direct HTTP GET (bounded manual redirects)
  2. share-host export endpoint
  3. export endpoint with scan-warning confirmation token
  4. share-host view endpoint (images only)
  5. headless browser download (disable with --no-browser)

Every downloaded file is classified by its magic bytes; an HTML
interstitial saved as media is rejected and the next strategy runs.

DIAGRAMS:
  Diagram slides are rendered with the mermaid CLI (mmdc). When the
  engine is missing or fails, a labeled placeholder image is written so
  the deck still lays out. Install: npm install -g @mermaid-js/mermaid-cli

ENVIRONMENT VARIABLES:
  SLIDEFORGE_OUTPUT       Default output directory
  SLIDEFORGE_CONCURRENCY  Concurrent downloads (default 8)
  SLIDEFORGE_TIMEOUT      Per-request HTTP timeout in seconds
  SLIDEFORGE_MERMAID_CMD  Mermaid CLI executable
  RUST_LOG                Tracing filter (overrides -v / -q)
"#;

/// Resolve slide-deck media assets and diagrams ahead of layout.
#[derive(Parser, Debug)]
#[command(
    name = "slideforge",
    version,
    about = "Resolve slide-deck media assets and diagrams ahead of layout",
    long_about = "Normalize a generated slide deck (merge/filter/split dense requirement \
slides), download its remote media through a chain of retrieval strategies that survives \
redirect-heavy share links, render its diagrams, and write a manifest for the layout stage.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Deck document (JSON) emitted by the slide mapper.
    input: PathBuf,

    /// Output directory for manifest.json (default: current directory).
    #[arg(short, long, env = "SLIDEFORGE_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Asset directory (default: <output>/assets).
    #[arg(long, env = "SLIDEFORGE_ASSETS_DIR")]
    assets_dir: Option<PathBuf>,

    /// Number of concurrent asset downloads.
    #[arg(short, long, env = "SLIDEFORGE_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "SLIDEFORGE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Disable the headless-browser retrieval fallback.
    #[arg(long, env = "SLIDEFORGE_NO_BROWSER")]
    no_browser: bool,

    /// Mermaid CLI executable used for diagram rendering.
    #[arg(long, env = "SLIDEFORGE_MERMAID_CMD", default_value = "mmdc")]
    mermaid_cmd: String,

    /// Maximum content blocks per slide after aggregation.
    #[arg(long, env = "SLIDEFORGE_MAX_BLOCKS", default_value_t = 10,
          value_parser = clap::value_parser!(usize))]
    max_blocks: usize,

    /// Slide-title category whose runs are merged and re-split.
    #[arg(long, env = "SLIDEFORGE_CATEGORY", default_value = "System Requirements")]
    category: String,

    /// Print the manifest JSON to stdout instead of writing files.
    #[arg(long, env = "SLIDEFORGE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SLIDEFORGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIDEFORGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SLIDEFORGE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let assets_dir = cli
        .assets_dir
        .clone()
        .unwrap_or_else(|| cli.output.join("assets"));

    let mut builder = PipelineConfig::builder()
        .assets_dir(assets_dir)
        .concurrency(cli.concurrency)
        .request_timeout_secs(cli.timeout)
        .browser_fallback(!cli.no_browser)
        .mermaid_command(&cli.mermaid_cmd)
        .max_blocks_per_slide(cli.max_blocks)
        .aggregate_category(&cli.category);

    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new_dynamic());
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run resolution ───────────────────────────────────────────────────
    let deck = load_deck(&cli.input)
        .await
        .with_context(|| format!("Failed to load deck '{}'", cli.input.display()))?;

    let resolved = resolve_deck_to_dir(deck, &cli.output, &config)
        .await
        .context("Resolution failed")?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&resolved).context("Failed to serialise manifest")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        print_summary(&resolved, &cli.output);
    }
    Ok(())
}

/// Summary line plus manual-insertion hints for anything that failed.
fn print_summary(resolved: &ResolvedDeck, output: &std::path::Path) {
    let stats = &resolved.stats;
    eprintln!(
        "{}  {} slides ({} in)  {} downloads  {} diagrams  {}ms  →  {}",
        if stats.downloads_failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.output_slides,
        stats.input_slides,
        stats.downloads_succeeded,
        stats.diagrams_rendered + stats.diagram_placeholders,
        stats.total_duration_ms,
        bold(&output.join("manifest.json").display().to_string()),
    );
    if stats.diagram_placeholders > 0 {
        eprintln!(
            "   {} {} diagram placeholder(s) written (mermaid CLI unavailable)",
            cyan("⚠"),
            stats.diagram_placeholders
        );
    }

    let mut failures: Vec<_> = resolved
        .assets
        .values()
        .filter(|a| a.kind.is_failure())
        .collect();
    failures.sort_by_key(|a| a.slide_index);
    if !failures.is_empty() {
        eprintln!("   {}", red("Unresolved assets (insert manually):"));
        for failure in failures {
            eprintln!(
                "     slide {:>3}  {}",
                failure.slide_index,
                dim(failure.source_url.as_deref().unwrap_or("<no url>")),
            );
        }
    }
}
