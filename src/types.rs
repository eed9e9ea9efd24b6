use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DraftError, DraftResult};
use crate::util::is_single_component;

pub(crate) const DEFAULT_WIDTH: u32 = 1920;
pub(crate) const DEFAULT_HEIGHT: u32 = 1080;
pub(crate) const DEFAULT_FPS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DraftMeta {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) fps: u32,
    pub(crate) created_at: i64,
}

impl DraftMeta {
    /// Folder name of the compiled artifact. Anything that is not a plain
    /// single path component falls back to the id-based name.
    pub(crate) fn artifact_name(&self) -> String {
        let name = self.name.trim();
        if !is_single_component(name) {
            format!("Draft_{}", self.id)
        } else {
            name.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TrackKind {
    Video,
    Audio,
    Text,
}

impl TrackKind {
    pub(crate) const ALL: [TrackKind; 3] = [TrackKind::Video, TrackKind::Audio, TrackKind::Text];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }

    pub(crate) fn parse(raw: &str) -> DraftResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "text" => Ok(Self::Text),
            other => Err(DraftError::Format(format!(
                "unknown track type '{other}' (expected video, audio or text)"
            ))),
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index class of a segment id. Image placements live on video tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SegmentClass {
    Video,
    Image,
    Audio,
    Text,
}

impl SegmentClass {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }

    pub(crate) fn track_kind(&self) -> TrackKind {
        match self {
            Self::Video | Self::Image => TrackKind::Video,
            Self::Audio => TrackKind::Audio,
            Self::Text => TrackKind::Text,
        }
    }
}

/// Placement transform of a visual segment. Translation is in half-canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ClipSettings {
    pub(crate) alpha: f64,
    pub(crate) flip_horizontal: bool,
    pub(crate) flip_vertical: bool,
    /// Clockwise, degrees.
    pub(crate) rotation: f64,
    pub(crate) scale_x: f64,
    pub(crate) scale_y: f64,
    pub(crate) transform_x: f64,
    pub(crate) transform_y: f64,
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            flip_horizontal: false,
            flip_vertical: false,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            transform_x: 0.0,
            transform_y: 0.0,
        }
    }
}

impl ClipSettings {
    pub(crate) fn validate(&self) -> DraftResult<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(DraftError::Range(format!("clip alpha must be within [0, 1], got {}", self.alpha)));
        }
        if self.scale_x <= 0.0 || self.scale_y <= 0.0 {
            return Err(DraftError::Range("clip scale must be positive".into()));
        }
        Ok(())
    }
}

/// Outcome of a mutation call. Mutations report failure here instead of erroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MutationStatus {
    pub(crate) success: bool,
    pub(crate) message: String,
}

impl MutationStatus {
    pub(crate) fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
