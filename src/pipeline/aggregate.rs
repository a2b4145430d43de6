//! Content aggregation: normalize requirement-style slide runs to a hard
//! per-slide density bound.
//!
//! The upstream mapper splits requirement sections into many small adjacent
//! slides of the same category. This stage merges, filters, and splits
//! those runs so every surviving slide is well-filled but never exceeds
//! `max_blocks_per_slide` items:
//!
//! 1. **Filter** — slides that carry only trivial phrasing ("not
//!    applicable", "as standard") below a minimum block count are dropped
//!    whole; an all-trivial run vanishes.
//! 2. **Segment** — level-0 blocks with no `key: value` separator whose
//!    text is in the configured [`SectionVocabulary`] partition a slide's
//!    blocks into labeled segments.
//! 3. **Split** — oversized multi-section slides become one slide per
//!    section; an oversized single-section slide is halved with `(1/2)` /
//!    `(2/2)` title suffixes; everything else passes through with a
//!    normalized title.
//!
//! Filtering removes whole slides, never partial content: section-header
//! blocks stay inside the derived content, so the total block count across
//! a run's output equals the total across its non-trivial input slides.
//! Slides outside the category pass through untouched, and relative order
//! is always preserved — the list order *is* the final deck order.

use crate::config::{PipelineConfig, SectionVocabulary};
use crate::slides::{ContentBlock, SlideDescriptor};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

/// Phrasings that convey no actionable information on their own.
static RE_TRIVIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:not\s+applicable|n/?a|as\s+(?:per\s+)?standard|nil|none\s+required)\b")
        .unwrap()
});

/// Normalize the slide list per the rules above. Pure and synchronous —
/// the orchestrator calls it exactly once, before any I/O.
pub fn aggregate(slides: Vec<SlideDescriptor>, config: &PipelineConfig) -> Vec<SlideDescriptor> {
    let mut out = Vec::with_capacity(slides.len());
    let mut run: Vec<Vec<ContentBlock>> = Vec::new();

    for slide in slides {
        if let SlideDescriptor::ContentBullets { title, content } = &slide {
            if title.trim().starts_with(config.aggregate_category.as_str()) {
                run.push(content.clone());
                continue;
            }
        }
        flush_run(&mut run, config, &mut out);
        out.push(slide);
    }
    flush_run(&mut run, config, &mut out);
    out
}

/// Emit the normalized form of one maximal category run.
fn flush_run(
    run: &mut Vec<Vec<ContentBlock>>,
    config: &PipelineConfig,
    out: &mut Vec<SlideDescriptor>,
) {
    if run.is_empty() {
        return;
    }
    let slides = std::mem::take(run);
    let total = slides.len();
    let mut dropped = 0usize;

    for content in slides {
        if is_trivial_slide(&content, config.min_blocks_per_slide) {
            dropped += 1;
            continue;
        }
        normalize_slide(content, config, out);
    }

    if dropped > 0 {
        info!(
            "aggregation dropped {dropped}/{total} trivial '{}' slides",
            config.aggregate_category
        );
    }
}

/// A slide is trivial when it is short AND every block reads as filler.
fn is_trivial_slide(blocks: &[ContentBlock], min_blocks: usize) -> bool {
    blocks.len() < min_blocks && blocks.iter().all(|b| RE_TRIVIAL.is_match(&b.text))
}

/// One labeled partition of a slide's blocks. The label is the section
/// name; blocks before the first header form an unlabeled segment.
struct Segment {
    label: Option<String>,
    blocks: Vec<ContentBlock>,
}

fn is_section_header(block: &ContentBlock, vocab: &SectionVocabulary) -> bool {
    block.level == 0 && !block.text.contains(':') && vocab.contains(&block.text)
}

/// Partition `blocks` at its section headers. Header blocks stay inside
/// their segment so splitting never loses content.
fn segment_blocks(blocks: Vec<ContentBlock>, vocab: &SectionVocabulary) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for block in blocks {
        if is_section_header(&block, vocab) {
            segments.push(Segment {
                label: Some(block.text.trim().to_string()),
                blocks: vec![block],
            });
        } else {
            match segments.last_mut() {
                Some(seg) => seg.blocks.push(block),
                None => segments.push(Segment {
                    label: None,
                    blocks: vec![block],
                }),
            }
        }
    }
    segments
}

/// Apply the split decision to one surviving slide, appending derived
/// slides to `out`.
fn normalize_slide(content: Vec<ContentBlock>, config: &PipelineConfig, out: &mut Vec<SlideDescriptor>) {
    let category = config.aggregate_category.as_str();
    let k = config.max_blocks_per_slide;
    let total: usize = content.len();
    let mut segments = segment_blocks(content, &config.section_vocabulary);

    let titled = |label: Option<&str>| match label {
        Some(name) => format!("{category}: {name}"),
        None => category.to_string(),
    };

    if segments.len() > 1 && total > k {
        // One derived slide per section segment.
        debug!("splitting oversized slide into {} sections", segments.len());
        for seg in segments {
            out.push(SlideDescriptor::ContentBullets {
                title: titled(seg.label.as_deref()),
                content: seg.blocks,
            });
        }
    } else if segments.len() == 1 && total > k {
        // Single oversized section: halve by block count.
        let Some(seg) = segments.pop() else { return };
        let base = titled(seg.label.as_deref());
        let mut blocks = seg.blocks;
        let second = blocks.split_off(blocks.len().div_ceil(2));
        debug!("halving oversized single-section slide '{base}'");
        out.push(SlideDescriptor::ContentBullets {
            title: format!("{base} (1/2)"),
            content: blocks,
        });
        out.push(SlideDescriptor::ContentBullets {
            title: format!("{base} (2/2)"),
            content: second,
        });
    } else {
        // Fits the bound: pass through with a normalized title. The
        // sectioned form is reserved for slides with exactly one header.
        let label = match &segments[..] {
            [only] => only.label.clone(),
            _ => None,
        };
        let title = titled(label.as_deref());
        let content: Vec<ContentBlock> =
            segments.into_iter().flat_map(|s| s.blocks).collect();
        out.push(SlideDescriptor::ContentBullets { title, content });
    }
}
