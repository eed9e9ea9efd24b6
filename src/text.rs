//! Text segments: styled captions with optional border and background.

use serde::{Deserialize, Serialize};

use crate::builder::{check_non_empty, optional_duration, reject, settle, Created, SegmentScope};
use crate::catalog::CatalogKind;
use crate::draft::DraftStore;
use crate::error::{DraftError, DraftResult};
use crate::journal::{JournalKind, JournalOp};
use crate::timerange::TimeRange;
use crate::types::{ClipSettings, MutationStatus, SegmentClass, TrackKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TextStyle {
    pub(crate) size: f64,
    pub(crate) bold: bool,
    pub(crate) italic: bool,
    pub(crate) underline: bool,
    /// RGB, each in [0, 1].
    pub(crate) color: [f64; 3],
    pub(crate) alpha: f64,
    /// 0 left, 1 center, 2 right.
    pub(crate) align: u8,
    pub(crate) vertical: bool,
    pub(crate) letter_spacing: i32,
    pub(crate) line_spacing: i32,
    pub(crate) auto_wrapping: bool,
    pub(crate) max_line_width: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 6.0,
            bold: false,
            italic: false,
            underline: false,
            color: [1.0, 1.0, 1.0],
            alpha: 1.0,
            align: 0,
            vertical: false,
            letter_spacing: 0,
            line_spacing: 0,
            auto_wrapping: false,
            max_line_width: 0.82,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TextBorder {
    pub(crate) alpha: f64,
    pub(crate) color: [f64; 3],
    pub(crate) width: f64,
}

impl Default for TextBorder {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            color: [0.0, 0.0, 0.0],
            width: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TextBackground {
    /// `#RRGGBB`.
    pub(crate) color: String,
    pub(crate) style: u8,
    pub(crate) alpha: f64,
    pub(crate) round_radius: f64,
    pub(crate) height: f64,
    pub(crate) width: f64,
    pub(crate) horizontal_offset: f64,
    pub(crate) vertical_offset: f64,
}

impl Default for TextBackground {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            style: 1,
            alpha: 1.0,
            round_radius: 0.0,
            height: 0.14,
            width: 0.14,
            horizontal_offset: 0.5,
            vertical_offset: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TextSegmentParams {
    pub(crate) text: String,
    pub(crate) target: TimeRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) font: Option<String>,
    #[serde(default)]
    pub(crate) style: TextStyle,
    #[serde(default)]
    pub(crate) clip: ClipSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) border: Option<TextBorder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) background: Option<TextBackground>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "snake_case")]
pub(crate) enum TextOp {
    AddTextSegment(TextSegmentParams),
    AddAnimation {
        animation_type: CatalogKind,
        name: String,
        #[serde(default)]
        duration: Option<i64>,
    },
    AddBubble {
        effect_id: String,
        resource_id: String,
    },
    AddEffect {
        effect_id: String,
    },
}

impl JournalOp for TextOp {
    const KIND: JournalKind = JournalKind::Text;

    fn tag(&self) -> &'static str {
        match self {
            Self::AddTextSegment(_) => "add_text_segment",
            Self::AddAnimation { .. } => "add_animation",
            Self::AddBubble { .. } => "add_bubble",
            Self::AddEffect { .. } => "add_effect",
        }
    }

    fn is_creation(&self) -> bool {
        matches!(self, Self::AddTextSegment(_))
    }

    fn target_range(&self) -> Option<TimeRange> {
        match self {
            Self::AddTextSegment(p) => Some(p.target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TextSegmentRequest {
    pub(crate) text: String,
    pub(crate) timerange: String,
    #[serde(default)]
    pub(crate) font: Option<String>,
    #[serde(default)]
    pub(crate) style: Option<TextStyle>,
    #[serde(default)]
    pub(crate) clip_settings: Option<ClipSettings>,
    #[serde(default)]
    pub(crate) border: Option<TextBorder>,
    #[serde(default)]
    pub(crate) background: Option<TextBackground>,
    #[serde(default)]
    pub(crate) track_name: Option<String>,
}

fn unit_range(name: &str, value: f64) -> DraftResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DraftError::Range(format!("{name} must be within [0, 1], got {value}")))
    }
}

fn validate_style(style: &TextStyle) -> DraftResult<()> {
    if !(style.size > 0.0) {
        return Err(DraftError::Range(format!("text size must be positive, got {}", style.size)));
    }
    if style.align > 2 {
        return Err(DraftError::Range(format!("align must be 0, 1 or 2, got {}", style.align)));
    }
    unit_range("style alpha", style.alpha)?;
    unit_range("max_line_width", style.max_line_width)?;
    style.color.iter().try_for_each(|c| unit_range("style color", *c))
}

fn validate_border(border: &TextBorder) -> DraftResult<()> {
    unit_range("border alpha", border.alpha)?;
    border.color.iter().try_for_each(|c| unit_range("border color", *c))?;
    if !(0.0..=100.0).contains(&border.width) {
        return Err(DraftError::Range(format!("border width must be within [0, 100], got {}", border.width)));
    }
    Ok(())
}

fn validate_background(bg: &TextBackground) -> DraftResult<()> {
    let hex = bg.color.strip_prefix('#').unwrap_or("");
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DraftError::Format(format!("background color must be #RRGGBB, got '{}'", bg.color)));
    }
    if !matches!(bg.style, 1 | 2) {
        return Err(DraftError::Range(format!("background style must be 1 or 2, got {}", bg.style)));
    }
    unit_range("background alpha", bg.alpha)?;
    unit_range("round_radius", bg.round_radius)?;
    unit_range("background height", bg.height)?;
    unit_range("background width", bg.width)?;
    unit_range("horizontal_offset", bg.horizontal_offset)?;
    unit_range("vertical_offset", bg.vertical_offset)
}

pub(crate) struct TextBuilder<'a> {
    scope: SegmentScope<'a>,
}

impl<'a> TextBuilder<'a> {
    pub(crate) fn new(store: &'a DraftStore, draft_id: impl Into<String>) -> Self {
        Self {
            scope: SegmentScope::new(store, draft_id),
        }
    }

    pub(crate) fn with_track(mut self, track_name: impl Into<String>) -> Self {
        self.scope.track_name = Some(track_name.into());
        self
    }

    pub(crate) fn with_segment(mut self, segment_id: impl Into<String>) -> Self {
        self.scope.current = Some(segment_id.into());
        self
    }

    pub(crate) fn current(&self) -> Option<&str> {
        self.scope.current.as_deref()
    }

    pub(crate) fn add_text_segment(&mut self, req: &TextSegmentRequest) -> DraftResult<Created<TextSegmentParams>> {
        let target = TimeRange::parse_start_end(&req.timerange)?;
        if req.text.is_empty() {
            return Err(DraftError::Format("text must not be empty".into()));
        }
        let style = req.style.unwrap_or_default();
        validate_style(&style)?;
        let clip = req.clip_settings.unwrap_or_default();
        clip.validate()?;
        if let Some(border) = &req.border {
            validate_border(border)?;
        }
        if let Some(background) = &req.background {
            validate_background(background)?;
        }

        let track = self
            .scope
            .place::<TextOp>(TrackKind::Text, req.track_name.as_deref(), &target)?;
        let payload = TextSegmentParams {
            text: req.text.clone(),
            target,
            font: req.font.as_deref().map(str::trim).filter(|f| !f.is_empty()).map(String::from),
            style,
            clip,
            border: req.border,
            background: req.background.clone(),
        };
        let id = self
            .scope
            .commit(&track, &[SegmentClass::Text], TextOp::AddTextSegment(payload.clone()))?;
        Ok(Created { id, payload })
    }

    pub(crate) fn add_animation(
        &self,
        animation_type: &str,
        name: &str,
        duration: Option<&str>,
        segment_id: Option<&str>,
    ) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Text)?;
            let kind = match CatalogKind::parse(animation_type) {
                Ok(k @ (CatalogKind::TextIntro | CatalogKind::TextOutro | CatalogKind::TextLoopAnim)) => k,
                _ => {
                    return Err(reject(format!(
                        "animation_type must be TextIntro, TextOutro or TextLoopAnim, got '{animation_type}'"
                    )));
                }
            };
            check_non_empty("animation_name", name)?;
            let duration = optional_duration("duration", duration)?;
            Ok(self.scope.mutate(
                &id,
                TextOp::AddAnimation {
                    animation_type: kind,
                    name: name.trim().to_string(),
                    duration,
                },
            ))
        })())
    }

    pub(crate) fn add_bubble(&self, effect_id: &str, resource_id: &str, segment_id: Option<&str>) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Text)?;
            check_non_empty("effect_id", effect_id)?;
            check_non_empty("resource_id", resource_id)?;
            Ok(self.scope.mutate(
                &id,
                TextOp::AddBubble {
                    effect_id: effect_id.trim().to_string(),
                    resource_id: resource_id.trim().to_string(),
                },
            ))
        })())
    }

    pub(crate) fn add_effect(&self, effect_id: &str, segment_id: Option<&str>) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Text)?;
            check_non_empty("effect_id", effect_id)?;
            Ok(self.scope.mutate(
                &id,
                TextOp::AddEffect {
                    effect_id: effect_id.trim().to_string(),
                },
            ))
        })())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::testing::temp_store;
    use crate::journal;
    use crate::track::TrackBuilder;

    fn caption(text: &str, range: &str) -> TextSegmentRequest {
        TextSegmentRequest {
            text: text.to_string(),
            timerange: range.to_string(),
            ..TextSegmentRequest::default()
        }
    }

    #[test]
    fn test_partial_style_json_keeps_defaults() {
        let req: TextSegmentRequest = serde_json::from_value(serde_json::json!({
            "text": "Hello",
            "timerange": "0s-2s",
            "style": {"size": 8.0, "bold": true},
            "border": {"width": 20.0}
        }))
        .unwrap();
        let style = req.style.unwrap();
        assert_eq!(style.size, 8.0);
        assert_eq!(style.max_line_width, 0.82);
        assert_eq!(req.border.unwrap().alpha, 1.0);
    }

    #[test]
    fn test_add_text_segment_validates() {
        let (_dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        TrackBuilder::new(&store, &draft.id).add_track(TrackKind::Text, Some("subs")).unwrap();
        let mut text = TextBuilder::new(&store, &draft.id).with_track("subs");

        let created = text.add_text_segment(&caption("Hello", "0s-2s")).unwrap();
        assert_eq!(created.payload.target, TimeRange::new(0, 2_000_000));
        assert_eq!(text.current(), Some(created.id.as_str()));

        let mut bad_align = caption("x", "3s-4s");
        bad_align.style = Some(TextStyle { align: 3, ..TextStyle::default() });
        assert!(matches!(text.add_text_segment(&bad_align), Err(DraftError::Range(_))));

        let mut bad_bg = caption("x", "3s-4s");
        bad_bg.background = Some(TextBackground {
            color: "black".into(),
            ..TextBackground::default()
        });
        assert!(matches!(text.add_text_segment(&bad_bg), Err(DraftError::Format(_))));

        let mut thick = caption("x", "3s-4s");
        thick.border = Some(TextBorder { width: 120.0, ..TextBorder::default() });
        assert!(matches!(text.add_text_segment(&thick), Err(DraftError::Range(_))));

        assert!(matches!(
            text.add_text_segment(&caption("x", "1s-3s")),
            Err(DraftError::Overlap { .. })
        ));
        let records = journal::load::<TextOp>(&store.draft_dir(&draft.id)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].track_name.as_deref(), Some("subs"));
    }

    #[test]
    fn test_mutations() {
        let (_dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        TrackBuilder::new(&store, &draft.id).add_track(TrackKind::Text, None).unwrap();
        let mut text = TextBuilder::new(&store, &draft.id);

        assert!(!text.add_effect("7296357486490144036", None).success);
        text.add_text_segment(&caption("Hi", "0s-1s")).unwrap();

        assert!(text.add_animation("TextIntro", "Typewriter", Some("0.5s"), None).success);
        assert!(!text.add_animation("IntroType", "Fade In", None, None).success);
        assert!(text.add_bubble("361595", "6742029398926430728", None).success);
        assert!(!text.add_bubble("", "6742029398926430728", None).success);
        assert!(text.add_effect("7296357486490144036", None).success);
        assert!(!text.add_effect(" ", None).success);

        let tags: Vec<_> = journal::load::<TextOp>(&store.draft_dir(&draft.id))
            .unwrap()
            .iter()
            .map(|r| r.op.tag())
            .collect();
        assert_eq!(tags, vec!["add_text_segment", "add_animation", "add_bubble", "add_effect"]);
    }
}
