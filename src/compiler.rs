//! Compiled timeline model and the writer that turns it into a project folder.
//!
//! Replay builds `Segment`s through the typed `add_*` calls below. Those calls
//! enforce the per-segment rules that journaling cannot see, such as one
//! transition per clip or group animations excluding intro/outro.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::catalog::{CatalogEntry, CatalogKind, RECTANGLE_MASK};
use crate::error::{DraftError, DraftResult};
use crate::localizer::MaterialKind;
use crate::text::{TextBackground, TextBorder, TextStyle};
use crate::timerange::TimeRange;
use crate::types::{ClipSettings, DraftMeta, TrackKind};
use crate::util::now_millis;
use crate::video::{BackgroundFilling, KeyframeProperty, MaskParams};

pub(crate) const CONTENT_FILE: &str = "draft_content.json";
pub(crate) const META_FILE: &str = "draft_meta_info.json";

/// Starts a compiled draft inside `dir`.
pub(crate) trait DraftCompiler {
    type Script: DraftScript;

    fn create_draft(&self, dir: &Path, meta: &DraftMeta) -> DraftResult<Self::Script>;
}

pub(crate) trait DraftScript {
    fn add_track(&mut self, kind: TrackKind, name: Option<&str>) -> DraftResult<()>;

    /// Named track, else the first track of the segment's kind.
    fn add_segment(&mut self, segment: Segment, track_name: Option<&str>) -> DraftResult<()>;

    fn save(&mut self) -> DraftResult<()>;
}

fn invalid(message: impl Into<String>) -> DraftError {
    DraftError::Format(message.into())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AppliedResource {
    pub(crate) kind: CatalogKind,
    pub(crate) resource: CatalogEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AppliedEffect {
    pub(crate) kind: CatalogKind,
    pub(crate) resource: CatalogEntry,
    pub(crate) params: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AppliedMask {
    pub(crate) resource: CatalogEntry,
    #[serde(flatten)]
    pub(crate) params: MaskParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct Keyframe {
    pub(crate) property: KeyframeProperty,
    pub(crate) time_offset: i64,
    pub(crate) value: f64,
}

fn check_effect_params(entry: &CatalogEntry, params: &[Option<f64>]) -> DraftResult<()> {
    if params.len() > entry.params.len() {
        return Err(invalid(format!(
            "{} takes {} params, got {}",
            entry.name,
            entry.params.len(),
            params.len()
        )));
    }
    Ok(())
}

fn check_offset(target: &TimeRange, offset: i64) -> DraftResult<()> {
    if offset < 0 || offset > target.duration {
        return Err(DraftError::Range(format!(
            "keyframe offset {offset}us outside segment of {}us",
            target.duration
        )));
    }
    Ok(())
}

// ── Video ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct VideoSegment {
    pub(crate) id: String,
    /// Absolute path inside the exported folder.
    pub(crate) material_path: String,
    pub(crate) material_type: MaterialKind,
    pub(crate) target_timerange: TimeRange,
    pub(crate) source_timerange: TimeRange,
    pub(crate) speed: f64,
    pub(crate) volume: f64,
    pub(crate) change_pitch: bool,
    pub(crate) clip: ClipSettings,
    pub(crate) animations: Vec<AppliedResource>,
    pub(crate) transition: Option<AppliedResource>,
    pub(crate) filters: Vec<(CatalogEntry, f64)>,
    pub(crate) mask: Option<AppliedMask>,
    pub(crate) background_filling: Option<BackgroundFilling>,
    pub(crate) keyframes: Vec<Keyframe>,
    pub(crate) effects: Vec<AppliedEffect>,
}

impl VideoSegment {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: impl Into<String>,
        material_path: impl Into<String>,
        material_type: MaterialKind,
        target: TimeRange,
        source: TimeRange,
        speed: f64,
        volume: f64,
        change_pitch: bool,
        clip: ClipSettings,
    ) -> Self {
        Self {
            id: id.into(),
            material_path: material_path.into(),
            material_type,
            target_timerange: target,
            source_timerange: source,
            speed,
            volume,
            change_pitch,
            clip,
            animations: Vec::new(),
            transition: None,
            filters: Vec::new(),
            mask: None,
            background_filling: None,
            keyframes: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub(crate) fn add_animation(&mut self, kind: CatalogKind, entry: CatalogEntry, duration: Option<i64>) -> DraftResult<()> {
        let is_group = kind == CatalogKind::GroupAnimationType;
        for existing in &self.animations {
            if existing.kind == kind {
                return Err(invalid(format!("segment already has a {} animation", kind.as_str())));
            }
            if is_group != (existing.kind == CatalogKind::GroupAnimationType) {
                return Err(invalid("group animations cannot be combined with intro/outro animations"));
            }
        }
        let duration = duration.or(entry.duration);
        if let Some(d) = duration {
            if d <= 0 || d > self.target_timerange.duration {
                return Err(DraftError::Range(format!("animation duration {d}us does not fit the segment")));
            }
        }
        self.animations.push(AppliedResource {
            kind,
            resource: entry,
            duration,
        });
        Ok(())
    }

    pub(crate) fn add_transition(&mut self, entry: CatalogEntry, duration: Option<i64>) -> DraftResult<()> {
        if self.transition.is_some() {
            return Err(invalid("segment already has a transition"));
        }
        self.transition = Some(AppliedResource {
            kind: CatalogKind::TransitionType,
            resource: entry,
            duration: duration.or(entry.duration),
        });
        Ok(())
    }

    pub(crate) fn add_filter(&mut self, entry: CatalogEntry, intensity: f64) -> DraftResult<()> {
        self.filters.push((entry, intensity));
        Ok(())
    }

    pub(crate) fn add_mask(&mut self, entry: CatalogEntry, params: MaskParams) -> DraftResult<()> {
        if self.mask.is_some() {
            return Err(invalid("segment already has a mask"));
        }
        let rectangular = entry.name == RECTANGLE_MASK;
        if !rectangular && (params.rect_width.is_some() || params.round_corner.is_some()) {
            return Err(invalid(format!(
                "rect_width and round_corner only apply to the {RECTANGLE_MASK} mask, not {}",
                entry.name
            )));
        }
        self.mask = Some(AppliedMask { resource: entry, params });
        Ok(())
    }

    pub(crate) fn add_background_filling(&mut self, filling: BackgroundFilling) -> DraftResult<()> {
        if self.background_filling.is_some() {
            return Err(invalid("segment already has a background filling"));
        }
        self.background_filling = Some(filling);
        Ok(())
    }

    pub(crate) fn add_keyframe(&mut self, property: KeyframeProperty, time_offset: i64, value: f64) -> DraftResult<()> {
        check_offset(&self.target_timerange, time_offset)?;
        let mixes_scale = self.keyframes.iter().any(|k| {
            (property == KeyframeProperty::UniformScale && k.property.is_axis_scale())
                || (property.is_axis_scale() && k.property == KeyframeProperty::UniformScale)
        });
        if mixes_scale {
            return Err(invalid("uniform_scale cannot be combined with scale_x/scale_y"));
        }
        self.keyframes.push(Keyframe {
            property,
            time_offset,
            value,
        });
        Ok(())
    }

    pub(crate) fn add_effect(&mut self, kind: CatalogKind, entry: CatalogEntry, params: Vec<Option<f64>>) -> DraftResult<()> {
        check_effect_params(&entry, &params)?;
        self.effects.push(AppliedEffect {
            kind,
            resource: entry,
            params,
        });
        Ok(())
    }
}

// ── Audio ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct Fade {
    pub(crate) in_duration: i64,
    pub(crate) out_duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AudioSegment {
    pub(crate) id: String,
    pub(crate) material_path: String,
    pub(crate) target_timerange: TimeRange,
    pub(crate) source_timerange: TimeRange,
    pub(crate) speed: f64,
    pub(crate) volume: f64,
    pub(crate) change_pitch: bool,
    pub(crate) fade: Option<Fade>,
    pub(crate) keyframes: Vec<Keyframe>,
    pub(crate) effects: Vec<AppliedEffect>,
}

impl AudioSegment {
    pub(crate) fn new(
        id: impl Into<String>,
        material_path: impl Into<String>,
        target: TimeRange,
        source: TimeRange,
        speed: f64,
        volume: f64,
        change_pitch: bool,
    ) -> Self {
        Self {
            id: id.into(),
            material_path: material_path.into(),
            target_timerange: target,
            source_timerange: source,
            speed,
            volume,
            change_pitch,
            fade: None,
            keyframes: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub(crate) fn add_effect(&mut self, kind: CatalogKind, entry: CatalogEntry, params: Vec<Option<f64>>) -> DraftResult<()> {
        check_effect_params(&entry, &params)?;
        if self.effects.iter().any(|e| e.kind == kind) {
            return Err(invalid(format!("segment already has a {} effect", kind.as_str())));
        }
        self.effects.push(AppliedEffect {
            kind,
            resource: entry,
            params,
        });
        Ok(())
    }

    pub(crate) fn add_fade(&mut self, in_duration: i64, out_duration: i64) -> DraftResult<()> {
        if self.fade.is_some() {
            return Err(invalid("segment already has a fade"));
        }
        if in_duration + out_duration > self.target_timerange.duration {
            return Err(DraftError::Range("fade in and out exceed the segment length".into()));
        }
        self.fade = Some(Fade {
            in_duration,
            out_duration,
        });
        Ok(())
    }

    pub(crate) fn add_keyframe(&mut self, time_offset: i64, volume: f64) -> DraftResult<()> {
        check_offset(&self.target_timerange, time_offset)?;
        self.keyframes.push(Keyframe {
            property: KeyframeProperty::Volume,
            time_offset,
            value: volume,
        });
        Ok(())
    }
}

// ── Text ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Bubble {
    pub(crate) effect_id: String,
    pub(crate) resource_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TextSegment {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) target_timerange: TimeRange,
    pub(crate) font: Option<CatalogEntry>,
    pub(crate) style: TextStyle,
    pub(crate) clip: ClipSettings,
    pub(crate) border: Option<TextBorder>,
    pub(crate) background: Option<TextBackground>,
    pub(crate) animations: Vec<AppliedResource>,
    pub(crate) bubble: Option<Bubble>,
    pub(crate) effect_id: Option<String>,
}

impl TextSegment {
    pub(crate) fn new(id: impl Into<String>, text: impl Into<String>, target: TimeRange) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            target_timerange: target,
            font: None,
            style: TextStyle::default(),
            clip: ClipSettings::default(),
            border: None,
            background: None,
            animations: Vec::new(),
            bubble: None,
            effect_id: None,
        }
    }

    pub(crate) fn add_animation(&mut self, kind: CatalogKind, entry: CatalogEntry, duration: Option<i64>) -> DraftResult<()> {
        if self.animations.iter().any(|a| a.kind == kind) {
            return Err(invalid(format!("text already has a {} animation", kind.as_str())));
        }
        self.animations.push(AppliedResource {
            kind,
            resource: entry,
            duration: duration.or(entry.duration),
        });
        Ok(())
    }

    pub(crate) fn add_bubble(&mut self, effect_id: &str, resource_id: &str) -> DraftResult<()> {
        if self.bubble.is_some() {
            return Err(invalid("text already has a bubble"));
        }
        self.bubble = Some(Bubble {
            effect_id: effect_id.to_string(),
            resource_id: resource_id.to_string(),
        });
        Ok(())
    }

    pub(crate) fn add_effect(&mut self, effect_id: &str) -> DraftResult<()> {
        if self.effect_id.is_some() {
            return Err(invalid("text already has an effect"));
        }
        self.effect_id = Some(effect_id.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Segment {
    Video(VideoSegment),
    Audio(AudioSegment),
    Text(TextSegment),
}

impl Segment {
    pub(crate) fn kind(&self) -> TrackKind {
        match self {
            Self::Video(_) => TrackKind::Video,
            Self::Audio(_) => TrackKind::Audio,
            Self::Text(_) => TrackKind::Text,
        }
    }

    pub(crate) fn id(&self) -> &str {
        match self {
            Self::Video(s) => &s.id,
            Self::Audio(s) => &s.id,
            Self::Text(s) => &s.id,
        }
    }

    pub(crate) fn target(&self) -> TimeRange {
        match self {
            Self::Video(s) => s.target_timerange,
            Self::Audio(s) => s.target_timerange,
            Self::Text(s) => s.target_timerange,
        }
    }

    fn material(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::Video(s) => Some((s.material_type.as_str(), s.material_path.as_str())),
            Self::Audio(s) => Some(("audio", s.material_path.as_str())),
            Self::Text(_) => None,
        }
    }
}

// ── JSON folder writer ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CompiledTrack {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) kind: TrackKind,
    pub(crate) name: Option<String>,
    pub(crate) segments: Vec<Segment>,
}

/// Writes `draft_content.json` and `draft_meta_info.json`.
pub(crate) struct JsonDraftFolder;

pub(crate) struct JsonScript {
    dir: PathBuf,
    meta: DraftMeta,
    pub(crate) tracks: Vec<CompiledTrack>,
}

impl DraftCompiler for JsonDraftFolder {
    type Script = JsonScript;

    fn create_draft(&self, dir: &Path, meta: &DraftMeta) -> DraftResult<JsonScript> {
        std::fs::create_dir_all(dir)?;
        Ok(JsonScript {
            dir: dir.to_path_buf(),
            meta: meta.clone(),
            tracks: Vec::new(),
        })
    }
}

impl JsonScript {
    /// End of the last segment on any track.
    pub(crate) fn duration(&self) -> i64 {
        self.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .map(|s| s.target().end())
            .max()
            .unwrap_or(0)
    }
}

impl DraftScript for JsonScript {
    fn add_track(&mut self, kind: TrackKind, name: Option<&str>) -> DraftResult<()> {
        if let Some(name) = name {
            if self.tracks.iter().any(|t| t.name.as_deref() == Some(name)) {
                return Err(DraftError::NameConflict(format!("duplicate track name '{name}'")));
            }
        }
        self.tracks.push(CompiledTrack {
            id: Uuid::new_v4().to_string(),
            kind,
            name: name.map(String::from),
            segments: Vec::new(),
        });
        Ok(())
    }

    fn add_segment(&mut self, segment: Segment, track_name: Option<&str>) -> DraftResult<()> {
        let kind = segment.kind();
        let track = match track_name {
            Some(name) => {
                let track = self
                    .tracks
                    .iter_mut()
                    .find(|t| t.name.as_deref() == Some(name))
                    .ok_or_else(|| DraftError::NotFound(format!("track '{name}'")))?;
                if track.kind != kind {
                    return Err(DraftError::TypeMismatch {
                        track: name.to_string(),
                        expected: kind.to_string(),
                        actual: track.kind.to_string(),
                    });
                }
                track
            }
            None => self
                .tracks
                .iter_mut()
                .find(|t| t.kind == kind)
                .ok_or_else(|| DraftError::NotFound(format!("no {kind} track")))?,
        };
        let candidate = segment.target();
        if let Some(existing) = track.segments.iter().find(|s| s.target().overlaps(&candidate)) {
            return Err(DraftError::Overlap {
                track: track.name.clone().unwrap_or_else(|| "<default>".into()),
                candidate: candidate.to_string(),
                existing: existing.target().to_string(),
            });
        }
        track.segments.push(segment);
        track.segments.sort_by_key(|s| s.target().start);
        Ok(())
    }

    fn save(&mut self) -> DraftResult<()> {
        let duration = self.duration();
        let materials: Vec<_> = self
            .tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .filter_map(|s| s.material().map(|(kind, path)| json!({"id": s.id(), "type": kind, "path": path})))
            .collect();
        let content = json!({
            "id": self.meta.id,
            "name": self.meta.artifact_name(),
            "canvas_config": {"width": self.meta.width, "height": self.meta.height},
            "fps": self.meta.fps,
            "duration": duration,
            "materials": materials,
            "tracks": self.tracks,
        });
        let meta_info = json!({
            "draft_id": self.meta.id,
            "draft_name": self.meta.artifact_name(),
            "draft_root_path": self.dir.to_string_lossy(),
            "tm_draft_create": self.meta.created_at,
            "tm_draft_modified": now_millis(),
            "tm_duration": duration,
            "track_count": self.tracks.len(),
        });
        std::fs::write(self.dir.join(CONTENT_FILE), serde_json::to_string_pretty(&content)?)?;
        std::fs::write(self.dir.join(META_FILE), serde_json::to_string_pretty(&meta_info)?)?;
        Ok(())
    }
}
