//! Diagram rendering: declarative diagram source → raster image.
//!
//! The real work is delegated to the mermaid CLI (`mmdc`), invoked as an
//! external process with the deck's theme settings (dark theme, transparent
//! background). The engine is an *optional* dependency of the environment,
//! not of this crate: when it is missing or fails, the renderer falls back
//! to a clearly-labeled placeholder image so the pipeline never stalls on a
//! missing tool. Empty diagram source is a recognized input state — the
//! slide simply has no diagram — and renders nothing at all.
//!
//! The placeholder is drawn with the `image` crate and a small built-in
//! bitmap font; bundling a TTF (and a text-shaping dependency) for two
//! fixed uppercase labels would be far heavier than the problem deserves.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use image::{Rgba, RgbaImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// What one render call produced. The orchestrator's run statistics count
/// real renders and placeholders separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The engine produced a real raster at this path.
    Rendered(PathBuf),
    /// The engine was missing or failed; a labeled placeholder was written
    /// at this path instead.
    Placeholder(PathBuf),
}

impl RenderOutcome {
    pub fn path(&self) -> &Path {
        match self {
            RenderOutcome::Rendered(p) | RenderOutcome::Placeholder(p) => p,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, RenderOutcome::Placeholder(_))
    }
}

/// Render `source` to a raster image at `output`.
///
/// * empty/whitespace source → `Ok(None)`, nothing is written;
/// * engine succeeds → `Ok(Some(Rendered))`;
/// * engine missing or failing → labeled placeholder at `output`,
///   `Ok(Some(Placeholder))` — recovered locally, logged as a warning.
///
/// Only I/O failures while writing the placeholder itself are fatal.
pub async fn render(
    source: &str,
    output: &Path,
    config: &PipelineConfig,
) -> Result<Option<RenderOutcome>, PipelineError> {
    if source.trim().is_empty() {
        debug!("diagram source is empty — nothing to render");
        return Ok(None);
    }

    match invoke_engine(source, output, &config.mermaid_command).await {
        Ok(()) => {
            info!("diagram rendered → {}", output.display());
            Ok(Some(RenderOutcome::Rendered(output.to_path_buf())))
        }
        Err(reason) => {
            warn!(
                "diagram engine '{}' unavailable ({reason}); writing placeholder",
                config.mermaid_command
            );
            write_placeholder(output)?;
            Ok(Some(RenderOutcome::Placeholder(output.to_path_buf())))
        }
    }
}

/// Whether an image's dimensions match the engine-unavailable placeholder.
pub fn is_placeholder_size(width: u32, height: u32) -> bool {
    width == PLACEHOLDER_W && height == PLACEHOLDER_H
}

/// Run the external engine. Any failure is reported as a string reason —
/// the caller recovers with a placeholder, so no error type is needed.
async fn invoke_engine(source: &str, output: &Path, command: &str) -> Result<(), String> {
    // The engine reads from a file, not stdin.
    let mut input = tempfile::Builder::new()
        .prefix("diagram-")
        .suffix(".mmd")
        .tempfile()
        .map_err(|e| format!("temp file: {e}"))?;
    input
        .write_all(source.as_bytes())
        .map_err(|e| format!("temp write: {e}"))?;
    input.flush().map_err(|e| format!("temp flush: {e}"))?;

    let result = Command::new(command)
        .arg("-i")
        .arg(input.path())
        .arg("-o")
        .arg(output)
        .args(["-t", "dark", "-b", "transparent"])
        .output()
        .await
        .map_err(|e| format!("spawn failed: {e}"))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(format!(
            "exit {}: {}",
            result.status,
            stderr.lines().next().unwrap_or("")
        ));
    }
    if !output.exists() {
        return Err("engine reported success but wrote no file".into());
    }
    Ok(())
}

// ── Placeholder generation ───────────────────────────────────────────────

const PLACEHOLDER_W: u32 = 960;
const PLACEHOLDER_H: u32 = 540;

const BG: Rgba<u8> = Rgba([30, 33, 40, 255]);
const BORDER: Rgba<u8> = Rgba([75, 85, 99, 255]);
const TEXT: Rgba<u8> = Rgba([229, 231, 235, 255]);
const SUBTEXT: Rgba<u8> = Rgba([156, 163, 175, 255]);

fn write_placeholder(output: &Path) -> Result<(), PipelineError> {
    let mut img = RgbaImage::from_pixel(PLACEHOLDER_W, PLACEHOLDER_H, BG);

    // Border frame, 2 px.
    for x in 0..PLACEHOLDER_W {
        for y in [0, 1, PLACEHOLDER_H - 2, PLACEHOLDER_H - 1] {
            img.put_pixel(x, y, BORDER);
        }
    }
    for y in 0..PLACEHOLDER_H {
        for x in [0, 1, PLACEHOLDER_W - 2, PLACEHOLDER_W - 1] {
            img.put_pixel(x, y, BORDER);
        }
    }

    let title = "DIAGRAM UNAVAILABLE";
    let hint = "INSTALL MERMAID CLI";
    let title_scale = 6;
    let hint_scale = 3;

    let tx = (PLACEHOLDER_W.saturating_sub(text_width(title, title_scale))) / 2;
    let hx = (PLACEHOLDER_W.saturating_sub(text_width(hint, hint_scale))) / 2;
    draw_text(&mut img, title, tx, 210, title_scale, TEXT);
    draw_text(&mut img, hint, hx, 290, hint_scale, SUBTEXT);

    img.save(output).map_err(|e| PipelineError::Internal(format!(
        "placeholder write to '{}' failed: {e}",
        output.display()
    )))?;
    Ok(())
}

/// Pixel width of `text` at `scale` (glyph cell is 5 wide + 1 gap).
fn text_width(text: &str, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        0
    } else {
        n * 6 * scale - scale
    }
}

fn draw_text(img: &mut RgbaImage, text: &str, x: u32, y: u32, scale: u32, color: Rgba<u8>) {
    let mut cursor = x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..5u32 {
                    if bits & (1 << (4 - col)) != 0 {
                        fill_square(img, cursor + col * scale, y + row as u32 * scale, scale, color);
                    }
                }
            }
        }
        cursor += 6 * scale;
    }
}

fn fill_square(img: &mut RgbaImage, x: u32, y: u32, size: u32, color: Rgba<u8>) {
    for dy in 0..size {
        for dx in 0..size {
            let (px, py) = (x + dx, y + dy);
            if px < img.width() && py < img.height() {
                img.put_pixel(px, py, color);
            }
        }
    }
}

/// 5×7 bitmap rows, MSB-left. Only the glyphs the placeholder labels need;
/// unknown characters render as a space.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_engine(cmd: &str) -> PipelineConfig {
        PipelineConfig::builder()
            .mermaid_command(cmd)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn empty_source_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("diagram.png");
        let config = config_with_engine("mmdc");
        let rendered = render("   \n\t  ", &out, &config).await.unwrap();
        assert!(rendered.is_none());
        assert!(!out.exists(), "nothing must be written for empty source");
    }

    #[tokio::test]
    async fn missing_engine_yields_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("diagram.png");
        let config = config_with_engine("definitely-not-a-real-mermaid-binary");
        let rendered = render("graph TD; A-->B;", &out, &config)
            .await
            .unwrap()
            .expect("placeholder outcome");
        assert!(rendered.is_placeholder());
        assert_eq!(rendered.path(), out);
        let meta = std::fs::metadata(&out).unwrap();
        assert!(meta.len() > 0, "placeholder must be a non-empty file");

        let decoded = image::open(&out).expect("placeholder must be a valid image");
        assert!(is_placeholder_size(decoded.width(), decoded.height()));
    }

    #[test]
    fn glyphs_cover_the_labels() {
        for ch in "DIAGRAM UNAVAILABLE INSTALL MERMAID CLI".chars() {
            if ch != ' ' {
                assert!(glyph(ch).is_some(), "missing glyph for {ch:?}");
            }
        }
    }

    #[test]
    fn text_width_is_monotonic() {
        assert_eq!(text_width("", 4), 0);
        assert!(text_width("AB", 4) > text_width("A", 4));
    }
}
