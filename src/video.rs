//! Video and image segments.
//!
//! Images share the video journal and video tracks. They are registered under
//! both the image and video index classes so every video mutation accepts them.

use serde::{Deserialize, Serialize};

use crate::builder::{
    check_bounds, check_non_empty, optional_duration, reject, settle, Created, SegmentScope,
};
use crate::catalog::CatalogKind;
use crate::draft::DraftStore;
use crate::error::{DraftError, DraftResult};
use crate::journal::{JournalKind, JournalOp};
use crate::localizer::MaterialKind;
use crate::timerange::{parse_duration, resolve_timing, TimeRange};
use crate::types::{ClipSettings, MutationStatus, SegmentClass, TrackKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct VideoSegmentParams {
    /// Draft-relative, e.g. `material/clip.mp4`.
    pub(crate) material: String,
    pub(crate) material_type: MaterialKind,
    pub(crate) target: TimeRange,
    pub(crate) source: TimeRange,
    pub(crate) speed: f64,
    pub(crate) volume: f64,
    #[serde(default)]
    pub(crate) change_pitch: bool,
    #[serde(default)]
    pub(crate) clip: ClipSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MaskParams {
    pub(crate) name: String,
    pub(crate) center_x: f64,
    pub(crate) center_y: f64,
    pub(crate) size: f64,
    pub(crate) rotation: f64,
    pub(crate) feather: f64,
    pub(crate) invert: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) rect_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) round_corner: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FillType {
    Blur,
    Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BackgroundFilling {
    pub(crate) fill_type: FillType,
    pub(crate) blur: f64,
    pub(crate) color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum KeyframeProperty {
    PositionX,
    PositionY,
    Rotation,
    ScaleX,
    ScaleY,
    UniformScale,
    Alpha,
    Saturation,
    Contrast,
    Brightness,
    Volume,
}

impl KeyframeProperty {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(raw.trim().to_string())).ok()
    }

    pub(crate) fn is_axis_scale(&self) -> bool {
        matches!(self, Self::ScaleX | Self::ScaleY)
    }

    /// Accepted value range for this property.
    fn bounds(&self) -> (f64, f64) {
        match self {
            Self::Alpha => (0.0, 1.0),
            Self::Saturation | Self::Contrast | Self::Brightness => (-1.0, 1.0),
            Self::Volume => (0.0, f64::MAX),
            Self::ScaleX | Self::ScaleY | Self::UniformScale => (f64::MIN_POSITIVE, f64::MAX),
            Self::PositionX | Self::PositionY | Self::Rotation => (f64::MIN, f64::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "snake_case")]
pub(crate) enum VideoOp {
    AddVideoSegment(VideoSegmentParams),
    AddAnimation {
        animation_type: CatalogKind,
        name: String,
        #[serde(default)]
        duration: Option<i64>,
    },
    AddTransition {
        name: String,
        #[serde(default)]
        duration: Option<i64>,
    },
    AddFilter {
        name: String,
        intensity: f64,
    },
    AddMask(MaskParams),
    AddBackgroundFilling(BackgroundFilling),
    AddKeyframe {
        property: KeyframeProperty,
        time_offset: i64,
        value: f64,
    },
    AddEffect {
        effect_type: CatalogKind,
        name: String,
        #[serde(default)]
        params: Vec<Option<f64>>,
    },
}

impl JournalOp for VideoOp {
    const KIND: JournalKind = JournalKind::Video;

    fn tag(&self) -> &'static str {
        match self {
            Self::AddVideoSegment(_) => "add_video_segment",
            Self::AddAnimation { .. } => "add_animation",
            Self::AddTransition { .. } => "add_transition",
            Self::AddFilter { .. } => "add_filter",
            Self::AddMask(_) => "add_mask",
            Self::AddBackgroundFilling(_) => "add_background_filling",
            Self::AddKeyframe { .. } => "add_keyframe",
            Self::AddEffect { .. } => "add_effect",
        }
    }

    fn is_creation(&self) -> bool {
        matches!(self, Self::AddVideoSegment(_))
    }

    fn target_range(&self) -> Option<TimeRange> {
        match self {
            Self::AddVideoSegment(p) => Some(p.target),
            _ => None,
        }
    }
}

/// Arguments of a video placement. Intervals are `start-end` strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VideoSegmentRequest {
    pub(crate) material: String,
    pub(crate) target_timerange: String,
    #[serde(default)]
    pub(crate) source_timerange: Option<String>,
    #[serde(default)]
    pub(crate) speed: Option<f64>,
    #[serde(default)]
    pub(crate) volume: Option<f64>,
    #[serde(default)]
    pub(crate) change_pitch: Option<bool>,
    #[serde(default)]
    pub(crate) clip_settings: Option<ClipSettings>,
    #[serde(default)]
    pub(crate) track_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ImageSegmentRequest {
    pub(crate) material: String,
    pub(crate) target_timerange: String,
    #[serde(default)]
    pub(crate) clip_settings: Option<ClipSettings>,
    #[serde(default)]
    pub(crate) track_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MaskRequest {
    pub(crate) mask_type: String,
    #[serde(default)]
    pub(crate) center_x: Option<f64>,
    #[serde(default)]
    pub(crate) center_y: Option<f64>,
    #[serde(default)]
    pub(crate) size: Option<f64>,
    #[serde(default)]
    pub(crate) rotation: Option<f64>,
    #[serde(default)]
    pub(crate) feather: Option<f64>,
    #[serde(default)]
    pub(crate) invert: Option<bool>,
    #[serde(default)]
    pub(crate) rect_width: Option<f64>,
    #[serde(default)]
    pub(crate) round_corner: Option<f64>,
}

pub(crate) struct VideoBuilder<'a> {
    scope: SegmentScope<'a>,
}

impl<'a> VideoBuilder<'a> {
    pub(crate) fn new(store: &'a DraftStore, draft_id: impl Into<String>) -> Self {
        Self {
            scope: SegmentScope::new(store, draft_id),
        }
    }

    /// Default track for creations that name none.
    pub(crate) fn with_track(mut self, track_name: impl Into<String>) -> Self {
        self.scope.track_name = Some(track_name.into());
        self
    }

    /// Segment mutations apply to when they name none.
    pub(crate) fn with_segment(mut self, segment_id: impl Into<String>) -> Self {
        self.scope.current = Some(segment_id.into());
        self
    }

    pub(crate) fn current(&self) -> Option<&str> {
        self.scope.current.as_deref()
    }

    pub(crate) fn add_video_segment(&mut self, req: &VideoSegmentRequest) -> DraftResult<Created<VideoSegmentParams>> {
        let target = TimeRange::parse_start_end(&req.target_timerange)?;
        let source = req
            .source_timerange
            .as_deref()
            .map(TimeRange::parse_start_end)
            .transpose()?;
        let volume = req.volume.unwrap_or(1.0);
        if !(volume >= 0.0) {
            return Err(DraftError::Range(format!("volume must be >= 0, got {volume}")));
        }
        let clip = req.clip_settings.unwrap_or_default();
        clip.validate()?;
        let timing = resolve_timing(target, source, req.speed)?;

        let track = self
            .scope
            .place::<VideoOp>(TrackKind::Video, req.track_name.as_deref(), &timing.target)?;
        let material = self
            .scope
            .localize_checked(&req.material, MaterialKind::Video, Some(timing.source.end()))?;

        let payload = VideoSegmentParams {
            material: material.relative,
            material_type: MaterialKind::Video,
            target: timing.target,
            source: timing.source,
            speed: timing.speed,
            volume,
            change_pitch: req.change_pitch.unwrap_or(false),
            clip,
        };
        let id = self.scope.commit(
            &track,
            &[SegmentClass::Video],
            VideoOp::AddVideoSegment(payload.clone()),
        )?;
        Ok(Created { id, payload })
    }

    /// Still image on a video track. No duration check.
    pub(crate) fn add_image_segment(&mut self, req: &ImageSegmentRequest) -> DraftResult<Created<VideoSegmentParams>> {
        let target = TimeRange::parse_start_end(&req.target_timerange)?;
        let clip = req.clip_settings.unwrap_or_default();
        clip.validate()?;

        let track = self
            .scope
            .place::<VideoOp>(TrackKind::Video, req.track_name.as_deref(), &target)?;
        let material = self.scope.localize_checked(&req.material, MaterialKind::Image, None)?;

        let payload = VideoSegmentParams {
            material: material.relative,
            material_type: MaterialKind::Image,
            target,
            source: TimeRange::new(0, target.duration),
            speed: 1.0,
            volume: 1.0,
            change_pitch: false,
            clip,
        };
        let id = self.scope.commit(
            &track,
            &[SegmentClass::Image, SegmentClass::Video],
            VideoOp::AddVideoSegment(payload.clone()),
        )?;
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
            let id = self.scope.mutation_target(segment_id, SegmentClass::Video)?;
            let kind = match CatalogKind::parse(animation_type) {
                Ok(k @ (CatalogKind::IntroType | CatalogKind::OutroType | CatalogKind::GroupAnimationType)) => k,
                _ => {
                    return Err(reject(format!(
                        "animation_type must be IntroType, OutroType or GroupAnimationType, got '{animation_type}'"
                    )));
                }
            };
            check_non_empty("animation_name", name)?;
            let duration = optional_duration("duration", duration)?;
            Ok(self.scope.mutate(
                &id,
                VideoOp::AddAnimation {
                    animation_type: kind,
                    name: name.trim().to_string(),
                    duration,
                },
            ))
        })())
    }

    pub(crate) fn add_transition(&self, name: &str, duration: Option<&str>, segment_id: Option<&str>) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Video)?;
            check_non_empty("transition_type", name)?;
            let duration = optional_duration("duration", duration)?;
            Ok(self.scope.mutate(
                &id,
                VideoOp::AddTransition {
                    name: name.trim().to_string(),
                    duration,
                },
            ))
        })())
    }

    pub(crate) fn add_filter(&self, name: &str, intensity: Option<f64>, segment_id: Option<&str>) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Video)?;
            check_non_empty("filter_type", name)?;
            let intensity = intensity.unwrap_or(100.0);
            check_bounds("intensity", intensity, 0.0, 100.0)?;
            Ok(self.scope.mutate(
                &id,
                VideoOp::AddFilter {
                    name: name.trim().to_string(),
                    intensity,
                },
            ))
        })())
    }

    pub(crate) fn add_mask(&self, req: &MaskRequest, segment_id: Option<&str>) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Video)?;
            check_non_empty("mask_type", &req.mask_type)?;
            let feather = req.feather.unwrap_or(0.0);
            check_bounds("feather", feather, 0.0, 100.0)?;
            if let Some(round_corner) = req.round_corner {
                check_bounds("round_corner", round_corner, 0.0, 100.0)?;
            }
            let size = req.size.unwrap_or(0.5);
            if !(size > 0.0) {
                return Err(reject(format!("mask size must be positive, got {size}")));
            }
            Ok(self.scope.mutate(
                &id,
                VideoOp::AddMask(MaskParams {
                    name: req.mask_type.trim().to_string(),
                    center_x: req.center_x.unwrap_or(0.0),
                    center_y: req.center_y.unwrap_or(0.0),
                    size,
                    rotation: req.rotation.unwrap_or(0.0),
                    feather,
                    invert: req.invert.unwrap_or(false),
                    rect_width: req.rect_width,
                    round_corner: req.round_corner,
                }),
            ))
        })())
    }

    pub(crate) fn add_background_filling(
        &self,
        fill_type: &str,
        blur: Option<f64>,
        color: Option<&str>,
        segment_id: Option<&str>,
    ) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Video)?;
            let fill_type = match fill_type.trim() {
                "blur" => FillType::Blur,
                "color" => FillType::Color,
                other => return Err(reject(format!("fill_type must be 'blur' or 'color', got '{other}'"))),
            };
            let blur = blur.unwrap_or(0.0625);
            check_bounds("blur", blur, 0.0, 1.0)?;
            let color = color.unwrap_or("#00000000").trim().to_string();
            if fill_type == FillType::Color && !is_hex_color(&color) {
                return Err(reject(format!("color must be #RRGGBB or #RRGGBBAA, got '{color}'")));
            }
            Ok(self.scope.mutate(
                &id,
                VideoOp::AddBackgroundFilling(BackgroundFilling { fill_type, blur, color }),
            ))
        })())
    }

    pub(crate) fn add_keyframe(
        &self,
        property: &str,
        time_offset: &str,
        value: f64,
        segment_id: Option<&str>,
    ) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Video)?;
            let Some(prop) = KeyframeProperty::parse(property) else {
                return Err(reject(format!("unknown keyframe property '{property}'")));
            };
            let offset = parse_duration(time_offset).map_err(|err| reject(format!("time_offset: {err}")))?;
            let (lo, hi) = prop.bounds();
            check_bounds(property, value, lo, hi)?;

            let conflicting = self.scope.history::<VideoOp>(&id).into_iter().any(|op| match op {
                VideoOp::AddKeyframe { property: earlier, .. } => {
                    (prop == KeyframeProperty::UniformScale && earlier.is_axis_scale())
                        || (prop.is_axis_scale() && earlier == KeyframeProperty::UniformScale)
                }
                _ => false,
            });
            if conflicting {
                return Err(reject(format!(
                    "segment {id} mixes uniform_scale with scale_x/scale_y keyframes"
                )));
            }
            Ok(self.scope.mutate(
                &id,
                VideoOp::AddKeyframe {
                    property: prop,
                    time_offset: offset,
                    value,
                },
            ))
        })())
    }

    pub(crate) fn add_effect(
        &self,
        effect_type: &str,
        name: &str,
        params: &[Option<f64>],
        segment_id: Option<&str>,
    ) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Video)?;
            let kind = match CatalogKind::parse(effect_type) {
                Ok(k @ (CatalogKind::VideoSceneEffectType | CatalogKind::VideoCharacterEffectType)) => k,
                _ => {
                    return Err(reject(format!(
                        "effect_type must be VideoSceneEffectType or VideoCharacterEffectType, got '{effect_type}'"
                    )));
                }
            };
            check_non_empty("effect_name", name)?;
            for value in params.iter().flatten() {
                check_bounds("effect param", *value, 0.0, 100.0)?;
            }
            Ok(self.scope.mutate(
                &id,
                VideoOp::AddEffect {
                    effect_type: kind,
                    name: name.trim().to_string(),
                    params: params.to_vec(),
                },
            ))
        })())
    }
}

fn is_hex_color(raw: &str) -> bool {
    raw.strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
