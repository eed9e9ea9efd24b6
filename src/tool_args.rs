use serde::Deserialize;

use crate::audio::AudioSegmentRequest;
use crate::text::TextSegmentRequest;
use crate::video::{ImageSegmentRequest, MaskRequest, VideoSegmentRequest};

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCreateDraftArgs {
    #[serde(default)]
    pub(crate) draft_name: Option<String>,
    #[serde(default)]
    pub(crate) width: Option<u32>,
    #[serde(default)]
    pub(crate) height: Option<u32>,
    #[serde(default)]
    pub(crate) fps: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolDraftArgs {
    pub(crate) draft_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCreateTrackArgs {
    pub(crate) draft_id: String,
    pub(crate) track_type: String,
    #[serde(default)]
    pub(crate) track_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolDeleteTrackArgs {
    pub(crate) draft_id: String,
    /// Track name or id.
    pub(crate) track: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolVideoSegmentArgs {
    pub(crate) draft_id: String,
    #[serde(flatten)]
    pub(crate) request: VideoSegmentRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolImageSegmentArgs {
    pub(crate) draft_id: String,
    #[serde(flatten)]
    pub(crate) request: ImageSegmentRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolAudioSegmentArgs {
    pub(crate) draft_id: String,
    #[serde(flatten)]
    pub(crate) request: AudioSegmentRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolTextSegmentArgs {
    pub(crate) draft_id: String,
    #[serde(flatten)]
    pub(crate) request: TextSegmentRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolAnimationArgs {
    pub(crate) segment_id: String,
    pub(crate) animation_type: String,
    pub(crate) animation_name: String,
    #[serde(default)]
    pub(crate) duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolTransitionArgs {
    pub(crate) segment_id: String,
    pub(crate) transition_type: String,
    #[serde(default)]
    pub(crate) duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolFilterArgs {
    pub(crate) segment_id: String,
    pub(crate) filter_type: String,
    #[serde(default)]
    pub(crate) intensity: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolMaskArgs {
    pub(crate) segment_id: String,
    #[serde(flatten)]
    pub(crate) mask: MaskRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolBackgroundFillingArgs {
    pub(crate) segment_id: String,
    pub(crate) fill_type: String,
    #[serde(default)]
    pub(crate) blur: Option<f64>,
    #[serde(default)]
    pub(crate) color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolVideoKeyframeArgs {
    pub(crate) segment_id: String,
    pub(crate) property: String,
    pub(crate) time_offset: String,
    pub(crate) value: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolEffectArgs {
    pub(crate) segment_id: String,
    pub(crate) effect_type: String,
    pub(crate) effect_name: String,
    #[serde(default)]
    pub(crate) params: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolFadeArgs {
    pub(crate) segment_id: String,
    pub(crate) in_duration: String,
    pub(crate) out_duration: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolAudioKeyframeArgs {
    pub(crate) segment_id: String,
    pub(crate) time_offset: String,
    pub(crate) volume: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolBubbleArgs {
    pub(crate) segment_id: String,
    pub(crate) effect_id: String,
    pub(crate) resource_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolTextEffectArgs {
    pub(crate) segment_id: String,
    pub(crate) effect_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolFindEffectsArgs {
    pub(crate) effect_type: String,
    #[serde(default)]
    pub(crate) keyword: Option<String>,
    #[serde(default)]
    pub(crate) is_vip: Option<bool>,
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolMediaInfoArgs {
    pub(crate) media_path: String,
}
