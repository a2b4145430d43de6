//! Slide-deck data model.
//!
//! These types mirror the JSON document emitted by the upstream
//! content-mapping stage: an ordered list of slide descriptors discriminated
//! by a `"type"` tag. The pipeline owns the list for the duration of a run;
//! it may merge, split, or drop whole slides during aggregation, but it
//! never rewrites the fields of a slide it passes through.
//!
//! # Design choice: closed enum over dynamic dispatch
//!
//! `SlideDescriptor` is a tagged union rather than a `type: String` bag of
//! fields. Adding a slide type is a compile-time-checked exercise: every
//! `match` at the rendering boundary stops compiling until the new variant
//! is handled.
//!
//! Field spellings follow the upstream document exactly; the module media
//! URLs additionally accept the mapper's historical `_image_url` /
//! `_video_url` spellings via serde aliases.

use serde::{Deserialize, Serialize};

/// The deserialized slide-structure document: the run's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideDeck {
    /// Project name, used for output naming by downstream stages.
    #[serde(default)]
    pub project_name: String,

    /// Slide count as reported by the mapper. Informational only — the
    /// authoritative count is `slides.len()`, and aggregation changes it.
    #[serde(default)]
    pub total_slides: usize,

    /// Ordered slide list. Order is the final deck order.
    pub slides: Vec<SlideDescriptor>,
}

/// One slide, discriminated by its `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlideDescriptor {
    /// Deck cover.
    Title {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
    },

    /// Bulleted content slide.
    ContentBullets {
        title: String,
        content: Vec<ContentBlock>,
    },

    /// Two side-by-side bulleted columns (e.g. scope-of-work split).
    TwoColumn {
        title: String,
        left_column: Column,
        right_column: Column,
    },

    /// Declarative diagram rendered to a raster image by the pipeline.
    Diagram {
        title: String,
        diagram: DiagramSpec,
    },

    /// Milestone timeline.
    Timeline {
        title: String,
        timeline: Timeline,
    },

    /// Functional module description, optionally carrying remote media.
    ModuleDescription {
        title: String,
        #[serde(default)]
        module_type: String,
        content: ModuleContent,
        /// Remote image reference resolved by the fetcher.
        #[serde(
            default,
            alias = "_image_url",
            skip_serializing_if = "Option::is_none"
        )]
        image_url: Option<String>,
        /// Remote video reference; preferred over `image_url` when both are
        /// present (see [`crate::config::MediaFallback`]).
        #[serde(
            default,
            alias = "_video_url",
            skip_serializing_if = "Option::is_none"
        )]
        video_url: Option<String>,
    },
}

impl SlideDescriptor {
    /// The slide's display title.
    pub fn title(&self) -> &str {
        match self {
            SlideDescriptor::Title { title, .. }
            | SlideDescriptor::ContentBullets { title, .. }
            | SlideDescriptor::TwoColumn { title, .. }
            | SlideDescriptor::Diagram { title, .. }
            | SlideDescriptor::Timeline { title, .. }
            | SlideDescriptor::ModuleDescription { title, .. } => title,
        }
    }

    /// The single media reference this slide wants fetched, if any.
    ///
    /// A slide requests at most one media item: video preferred over image.
    /// The image reference (when also present) is kept in the descriptor so
    /// the orchestrator can apply its fallback policy after a failed video.
    pub fn media_reference(&self) -> Option<MediaReference> {
        match self {
            SlideDescriptor::ModuleDescription {
                image_url,
                video_url,
                ..
            } => {
                if let Some(url) = non_empty(video_url) {
                    Some(MediaReference {
                        url: url.to_string(),
                        kind: MediaKind::Video,
                    })
                } else {
                    non_empty(image_url).map(|url| MediaReference {
                        url: url.to_string(),
                        kind: MediaKind::Image,
                    })
                }
            }
            _ => None,
        }
    }

    /// The slide's image reference regardless of media preference, used for
    /// the video→image fallback.
    pub fn image_reference(&self) -> Option<MediaReference> {
        match self {
            SlideDescriptor::ModuleDescription { image_url, .. } => {
                non_empty(image_url).map(|url| MediaReference {
                    url: url.to_string(),
                    kind: MediaKind::Image,
                })
            }
            _ => None,
        }
    }

    /// The slide's diagram source, if it is a diagram slide.
    pub fn diagram(&self) -> Option<&DiagramSpec> {
        match self {
            SlideDescriptor::Diagram { diagram, .. } => Some(diagram),
            _ => None,
        }
    }
}

fn non_empty(opt: &Option<String>) -> Option<&str> {
    opt.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// One item inside a slide's bulleted content.
///
/// `level` drives indentation and visual weight. Level-0 blocks whose text
/// has no `key: value` separator act as section headers during aggregation
/// when they match the configured section vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub level: u32,
    pub text: String,
}

impl ContentBlock {
    pub fn new(level: u32, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// One column of a two-column slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub title: String,
    #[serde(default)]
    pub content: Vec<String>,
}

/// Declarative diagram source carried by a diagram slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramSpec {
    /// Diagram language, e.g. `"mermaid"`.
    #[serde(rename = "type")]
    pub diagram_type: String,
    /// Diagram source text. Empty source means "no diagram on this slide".
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Milestone timeline carried by a timeline slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

/// One timeline milestone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub phase: String,
    /// Kept for compatibility with the mapper, which duplicates the phase
    /// name under both keys.
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub date: String,
}

/// Structured fields of a module-description slide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleContent {
    pub purpose: String,
    #[serde(default)]
    pub alert_logic: String,
    #[serde(default)]
    pub preconditions: String,
    #[serde(default)]
    pub data_requirements: String,
}

/// A remote media reference attached to a slide.
///
/// Created when the descriptor is parsed, consumed once by the fetcher,
/// never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    pub url: String,
    pub kind: MediaKind,
}

/// Expected media kind of a fetched asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Default file extension when the URL path gives no usable hint.
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_module_slide_with_underscore_aliases() {
        let json = r#"{
            "type": "module_description",
            "title": "PPE Detection",
            "module_type": "Standard",
            "content": {
                "purpose": "Detect missing helmets",
                "alert_logic": "Person without helmet in zone",
                "preconditions": "Camera at 3-5m height",
                "data_requirements": ""
            },
            "_image_url": "https://drive.google.com/file/d/abc123/view",
            "_video_url": "https://drive.google.com/file/d/xyz789/view"
        }"#;
        let slide: SlideDescriptor = serde_json::from_str(json).unwrap();
        let media = slide.media_reference().expect("media reference");
        assert_eq!(media.kind, MediaKind::Video);
        assert!(media.url.contains("xyz789"));
        let img = slide.image_reference().expect("image reference");
        assert!(img.url.contains("abc123"));
    }

    #[test]
    fn video_preferred_over_image() {
        let slide = SlideDescriptor::ModuleDescription {
            title: "M".into(),
            module_type: String::new(),
            content: ModuleContent {
                purpose: "p".into(),
                alert_logic: String::new(),
                preconditions: String::new(),
                data_requirements: String::new(),
            },
            image_url: Some("https://example.com/a.jpg".into()),
            video_url: Some("https://example.com/a.mp4".into()),
        };
        assert_eq!(slide.media_reference().unwrap().kind, MediaKind::Video);
    }

    #[test]
    fn empty_urls_are_no_reference() {
        let slide = SlideDescriptor::ModuleDescription {
            title: "M".into(),
            module_type: String::new(),
            content: ModuleContent {
                purpose: "p".into(),
                alert_logic: String::new(),
                preconditions: String::new(),
                data_requirements: String::new(),
            },
            image_url: Some("  ".into()),
            video_url: Some(String::new()),
        };
        assert!(slide.media_reference().is_none());
    }

    #[test]
    fn deck_roundtrip_preserves_tag() {
        let json = r#"{
            "project_name": "Acme",
            "total_slides": 2,
            "slides": [
                {"type": "title", "title": "Proposal", "date": "2026-01-01"},
                {"type": "content_bullets", "title": "Scope",
                 "content": [{"level": 0, "text": "Network"}]}
            ]
        }"#;
        let deck: SlideDeck = serde_json::from_str(json).unwrap();
        assert_eq!(deck.slides.len(), 2);
        let back = serde_json::to_string(&deck).unwrap();
        assert!(back.contains(r#""type":"content_bullets""#));
    }

    #[test]
    fn timeline_slide_deserializes() {
        let json = r#"{
            "type": "timeline",
            "title": "Implementation Plan",
            "timeline": {
                "format": "milestones",
                "milestones": [
                    {"phase": "Hardware Deployment", "event": "Hardware Deployment", "date": "T0 + 2 weeks"}
                ]
            }
        }"#;
        let slide: SlideDescriptor = serde_json::from_str(json).unwrap();
        match slide {
            SlideDescriptor::Timeline { timeline, .. } => {
                assert_eq!(timeline.milestones.len(), 1);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
