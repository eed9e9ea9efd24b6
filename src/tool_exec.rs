use std::path::Path;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::audio::AudioBuilder;
use crate::catalog::{self, CatalogKind};
use crate::draft::DraftStore;
use crate::error::{DraftError, DraftResult};
use crate::export::export_draft;
use crate::localizer::{remote_url, MaterialKind};
use crate::text::TextBuilder;
use crate::timerange::format_micros;
use crate::tool_args::*;
use crate::track::TrackBuilder;
use crate::types::{MutationStatus, SegmentClass, TrackKind};
use crate::video::VideoBuilder;

const RULES: &str = "\
Workflow:
1. create_draft, then create_track for each video, audio and text track you need.
2. add_*_segment to place material. Intervals are \"start-end\" on the track, e.g. \"0s-4.2s\".
3. find_effects_by_type to look up names, then add_* mutations with the segment_id you got back.
4. export_draft.

Timing:
- Placements on one track may touch but not overlap: 0s-4.2s then 4.2s-5s is fine, 4s-5s is not.
- A placement cannot ask for more media than the file has. Check with parse_media_info.
- source_timerange picks the part of the file to use; leave it out to start at 0s.

Tracks:
- One track per kind is usually enough. Extra tracks of a kind need a name.

Captions read best with clip_settings.transform_y around -0.7.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ToolResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub(crate) data: serde_json::Value,
}

impl ToolResponse {
    fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    fn failed(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: false,
            message: message.into(),
            data,
        }
    }

    fn from_error(err: &DraftError) -> Self {
        Self::failed(err.to_string(), json!({ "error_type": err.category() }))
    }

    fn from_status(status: MutationStatus, segment_id: &str, owner: &SegmentOwner) -> Self {
        let data = json!({
            "segment_id": segment_id,
            "draft_id": owner.draft_id,
            "track_name": owner.track_name
        });
        if status.success {
            Self::ok(status.message, data)
        } else {
            Self::failed(status.message, data)
        }
    }
}

/// Runs a tool and folds every failure into the response.
pub(crate) fn call_tool(store: &DraftStore, name: &str, args: serde_json::Value) -> ToolResponse {
    debug!(tool = name, "tool call");
    match execute_tool(store, name, args) {
        Ok(response) => response,
        Err(err) => {
            warn!(tool = name, %err, "tool call failed");
            ToolResponse::failed(err, serde_json::Value::Null)
        }
    }
}

struct SegmentOwner {
    draft_id: String,
    track_name: Option<String>,
}

/// Draft and track owning `segment_id` under `class`.
fn owning_draft(store: &DraftStore, segment_id: &str, class: SegmentClass) -> Result<SegmentOwner, String> {
    let lookup = || -> DraftResult<Option<SegmentOwner>> {
        let Some(draft) = store.index.segment_draft(segment_id, class)? else {
            return Ok(None);
        };
        Ok(Some(SegmentOwner {
            draft_id: draft.id,
            track_name: store.index.segment_track_name(segment_id, class)?,
        }))
    };
    match lookup() {
        Ok(Some(owner)) => Ok(owner),
        Ok(None) => Err(format!("unknown {} segment {segment_id}", class.as_str())),
        Err(err) => Err(format!("index lookup failed: {err}")),
    }
}

/// Failure with close matches when `name` is not an exact catalog entry of `kind`.
fn unknown_catalog_name(kind_raw: &str, name: &str) -> Option<ToolResponse> {
    let kind = CatalogKind::parse(kind_raw).ok()?;
    let ranked = catalog::find(kind, Some(name), None, Some(5));
    if ranked.first().is_some_and(|r| r.score == 100) {
        return None;
    }
    let suggestions: Vec<_> = ranked.iter().map(|r| r.entry.name).collect();
    Some(ToolResponse::failed(
        format!("no {} named '{name}'", kind.as_str()),
        json!({
            "error_type": "not_found",
            "effect_type": kind.as_str(),
            "name": name,
            "suggestions": suggestions
        }),
    ))
}

pub(crate) fn execute_tool(
    store: &DraftStore,
    name: &str,
    args: serde_json::Value,
) -> Result<ToolResponse, String> {
    match name {
        "rules" => Ok(ToolResponse::ok("rules", json!({ "rules": RULES }))),
        "create_draft" => {
            let parsed: ToolCreateDraftArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let name = parsed.draft_name.unwrap_or_default();
            Ok(match store.create_draft(&name, parsed.width, parsed.height, parsed.fps) {
                Ok(meta) => ToolResponse::ok(
                    format!("created draft {}", meta.id),
                    json!({ "draft_id": meta.id, "draft": meta }),
                ),
                Err(err) => ToolResponse::from_error(&err),
            })
        }
        "export_draft" => {
            let parsed: ToolDraftArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let summary = export_draft(store, &parsed.draft_id);
            let message = format!(
                "export {}: {} warning(s), {} error(s)",
                if summary.success { "finished" } else { "failed" },
                summary.warning_count,
                summary.error_count
            );
            let data = serde_json::to_value(&summary).map_err(|e| e.to_string())?;
            Ok(if summary.success {
                ToolResponse::ok(message, data)
            } else {
                ToolResponse::failed(message, data)
            })
        }
        "create_track" => {
            let parsed: ToolCreateTrackArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let kind = match TrackKind::parse(&parsed.track_type) {
                Ok(kind) => kind,
                Err(err) => return Ok(ToolResponse::from_error(&err)),
            };
            let tracks = TrackBuilder::new(store, &parsed.draft_id);
            Ok(match tracks.add_track(kind, parsed.track_name.as_deref()) {
                Ok(track) => ToolResponse::ok(
                    format!("added {kind} track"),
                    json!({ "track_id": track.id, "track_name": track.name, "track_type": kind }),
                ),
                Err(err) => ToolResponse::from_error(&err),
            })
        }
        "delete_track" => {
            let parsed: ToolDeleteTrackArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            Ok(match TrackBuilder::new(store, &parsed.draft_id).delete_track(&parsed.track) {
                Ok(track) => ToolResponse::ok(
                    format!("deleted track {}", track.id),
                    json!({ "track_id": track.id, "track_name": track.name }),
                ),
                Err(err) => ToolResponse::from_error(&err),
            })
        }
        "list_tracks" => {
            let parsed: ToolDraftArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            Ok(match TrackBuilder::new(store, &parsed.draft_id).list_tracks() {
                Ok(tracks) => {
                    let rows: Vec<_> = tracks
                        .iter()
                        .map(|t| json!({ "track_id": t.id, "track_type": t.kind, "track_name": t.name }))
                        .collect();
                    ToolResponse::ok(format!("{} track(s)", rows.len()), json!({ "tracks": rows }))
                }
                Err(err) => ToolResponse::from_error(&err),
            })
        }
        "add_video_segment" => {
            let parsed: ToolVideoSegmentArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let mut video = VideoBuilder::new(store, &parsed.draft_id);
            Ok(match video.add_video_segment(&parsed.request) {
                Ok(created) => ToolResponse::ok(
                    format!("added video segment {}", created.id),
                    json!({
                        "segment_id": created.id,
                        "draft_id": parsed.draft_id,
                        "target_start_duration": created.payload.target.to_start_duration(),
                        "params": created.payload
                    }),
                ),
                Err(err) => ToolResponse::from_error(&err),
            })
        }
        "add_image_segment" => {
            let parsed: ToolImageSegmentArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let mut video = VideoBuilder::new(store, &parsed.draft_id);
            Ok(match video.add_image_segment(&parsed.request) {
                Ok(created) => ToolResponse::ok(
                    format!("added image segment {}", created.id),
                    json!({
                        "segment_id": created.id,
                        "draft_id": parsed.draft_id,
                        "target_start_duration": created.payload.target.to_start_duration(),
                        "params": created.payload
                    }),
                ),
                Err(err) => ToolResponse::from_error(&err),
            })
        }
        "add_video_animation" | "add_image_animation" => {
            let parsed: ToolAnimationArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let class = if name == "add_image_animation" {
                SegmentClass::Image
            } else {
                SegmentClass::Video
            };
            let owner = owning_draft(store, &parsed.segment_id, class)?;
            if let Some(resp) = unknown_catalog_name(&parsed.animation_type, &parsed.animation_name) {
                return Ok(resp);
            }
            let status = VideoBuilder::new(store, &owner.draft_id).add_animation(
                &parsed.animation_type,
                &parsed.animation_name,
                parsed.duration.as_deref(),
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_video_transition" => {
            let parsed: ToolTransitionArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Video)?;
            if let Some(resp) = unknown_catalog_name("TransitionType", &parsed.transition_type) {
                return Ok(resp);
            }
            let status = VideoBuilder::new(store, &owner.draft_id).add_transition(
                &parsed.transition_type,
                parsed.duration.as_deref(),
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_video_filter" => {
            let parsed: ToolFilterArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Video)?;
            if let Some(resp) = unknown_catalog_name("FilterType", &parsed.filter_type) {
                return Ok(resp);
            }
            let status = VideoBuilder::new(store, &owner.draft_id).add_filter(
                &parsed.filter_type,
                parsed.intensity,
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_video_mask" => {
            let parsed: ToolMaskArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Video)?;
            if let Some(resp) = unknown_catalog_name("MaskType", &parsed.mask.mask_type) {
                return Ok(resp);
            }
            let status = VideoBuilder::new(store, &owner.draft_id).add_mask(&parsed.mask, Some(&parsed.segment_id));
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_video_background_filling" => {
            let parsed: ToolBackgroundFillingArgs =
                serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Video)?;
            let status = VideoBuilder::new(store, &owner.draft_id).add_background_filling(
                &parsed.fill_type,
                parsed.blur,
                parsed.color.as_deref(),
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_video_keyframe" => {
            let parsed: ToolVideoKeyframeArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Video)?;
            let status = VideoBuilder::new(store, &owner.draft_id).add_keyframe(
                &parsed.property,
                &parsed.time_offset,
                parsed.value,
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_video_effect" => {
            let parsed: ToolEffectArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Video)?;
            if let Some(resp) = unknown_catalog_name(&parsed.effect_type, &parsed.effect_name) {
                return Ok(resp);
            }
            let status = VideoBuilder::new(store, &owner.draft_id).add_effect(
                &parsed.effect_type,
                &parsed.effect_name,
                &parsed.params,
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_audio_segment" => {
            let parsed: ToolAudioSegmentArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let mut audio = AudioBuilder::new(store, &parsed.draft_id);
            Ok(match audio.add_audio_segment(&parsed.request) {
                Ok(created) => ToolResponse::ok(
                    format!("added audio segment {}", created.id),
                    json!({
                        "segment_id": created.id,
                        "draft_id": parsed.draft_id,
                        "target_start_duration": created.payload.target.to_start_duration(),
                        "params": created.payload
                    }),
                ),
                Err(err) => ToolResponse::from_error(&err),
            })
        }
        "add_audio_effect" => {
            let parsed: ToolEffectArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Audio)?;
            if let Some(resp) = unknown_catalog_name(&parsed.effect_type, &parsed.effect_name) {
                return Ok(resp);
            }
            let status = AudioBuilder::new(store, &owner.draft_id).add_effect(
                &parsed.effect_type,
                &parsed.effect_name,
                &parsed.params,
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_audio_fade" => {
            let parsed: ToolFadeArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Audio)?;
            let status = AudioBuilder::new(store, &owner.draft_id).add_fade(
                &parsed.in_duration,
                &parsed.out_duration,
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_audio_keyframe" => {
            let parsed: ToolAudioKeyframeArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Audio)?;
            let status = AudioBuilder::new(store, &owner.draft_id).add_keyframe(
                &parsed.time_offset,
                parsed.volume,
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_text_segment" => {
            let parsed: ToolTextSegmentArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let mut text = TextBuilder::new(store, &parsed.draft_id);
            Ok(match text.add_text_segment(&parsed.request) {
                Ok(created) => ToolResponse::ok(
                    format!("added text segment {}", created.id),
                    json!({
                        "segment_id": created.id,
                        "draft_id": parsed.draft_id,
                        "target_start_duration": created.payload.target.to_start_duration(),
                        "params": created.payload
                    }),
                ),
                Err(err) => ToolResponse::from_error(&err),
            })
        }
        "add_text_animation" => {
            let parsed: ToolAnimationArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Text)?;
            if let Some(resp) = unknown_catalog_name(&parsed.animation_type, &parsed.animation_name) {
                return Ok(resp);
            }
            let status = TextBuilder::new(store, &owner.draft_id).add_animation(
                &parsed.animation_type,
                &parsed.animation_name,
                parsed.duration.as_deref(),
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_text_bubble" => {
            let parsed: ToolBubbleArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Text)?;
            let status = TextBuilder::new(store, &owner.draft_id).add_bubble(
                &parsed.effect_id,
                &parsed.resource_id,
                Some(&parsed.segment_id),
            );
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "add_text_effect" => {
            let parsed: ToolTextEffectArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let owner = owning_draft(store, &parsed.segment_id, SegmentClass::Text)?;
            let status = TextBuilder::new(store, &owner.draft_id).add_effect(&parsed.effect_id, Some(&parsed.segment_id));
            Ok(ToolResponse::from_status(status, &parsed.segment_id, &owner))
        }
        "find_effects_by_type" => {
            let parsed: ToolFindEffectsArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let kind = match CatalogKind::parse(&parsed.effect_type) {
                Ok(kind) => kind,
                Err(err) => return Ok(ToolResponse::from_error(&err)),
            };
            let effects = catalog::find(kind, parsed.keyword.as_deref(), parsed.is_vip, parsed.limit);
            Ok(ToolResponse::ok(
                format!("found {} {} entries", effects.len(), kind.as_str()),
                json!({
                    "effect_type": kind.as_str(),
                    "description": kind.description(),
                    "total_count": effects.len(),
                    "effects": effects
                }),
            ))
        }
        "parse_media_info" => {
            let parsed: ToolMediaInfoArgs = serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            if remote_url(&parsed.media_path).is_some() {
                return Ok(ToolResponse::failed(
                    "only local files can be inspected; remote material is checked when it is placed",
                    serde_json::Value::Null,
                ));
            }
            let path = Path::new(&parsed.media_path);
            let meta = match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => meta,
                _ => {
                    let err = DraftError::NotFound(format!("media file '{}'", parsed.media_path));
                    return Ok(ToolResponse::from_error(&err));
                }
            };
            let kind = MaterialKind::from_path(path);
            let duration = match kind {
                Some(MaterialKind::Video | MaterialKind::Audio) => store.probe.probe(path).ok(),
                _ => None,
            };
            let mut message = format!("{} file", kind.map_or("unknown", |k| k.as_str()));
            if let Some(us) = duration {
                message.push_str(&format!(", duration {}", format_micros(us)));
            }
            Ok(ToolResponse::ok(
                message,
                json!({
                    "media_path": parsed.media_path,
                    "type": kind,
                    "size_bytes": meta.len(),
                    "duration_us": duration,
                    "duration": duration.map(format_micros)
                }),
            ))
        }
        _ => Err(format!("unknown tool: {name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::testing::{media_file, temp_store};
    use crate::tool_defs::{tool_catalog_map, tool_definitions_json};

    #[test]
    fn test_every_defined_tool_is_dispatched() {
        let (_dir, store) = temp_store(None);
        for name in tool_catalog_map(&tool_definitions_json()).keys() {
            let err = execute_tool(&store, name, json!({ "__probe": true })).err();
            assert_ne!(err, Some(format!("unknown tool: {name}")));
        }
        let resp = call_tool(&store, "nope", json!({}));
        assert!(!resp.success);
        assert_eq!(resp.message, "unknown tool: nope");
    }

    #[test]
    fn test_tool_workflow() {
        let (dir, store) = temp_store(Some(20));
        let created = call_tool(&store, "create_draft", json!({ "draft_name": "Trip" }));
        assert!(created.success);
        let draft_id = created.data["draft_id"].as_str().unwrap().to_string();

        assert!(call_tool(&store, "create_track", json!({ "draft_id": draft_id, "track_type": "video" })).success);
        let dup = call_tool(&store, "create_track", json!({ "draft_id": draft_id, "track_type": "video" }));
        assert!(!dup.success);
        assert_eq!(dup.data["error_type"], "name_conflict");

        let seg = call_tool(
            &store,
            "add_video_segment",
            json!({
                "draft_id": draft_id,
                "material": media_file(&dir, "beach.mp4"),
                "target_timerange": "0s-6s",
                "clip_settings": { "scale_x": 1.2 }
            }),
        );
        assert!(seg.success, "{}", seg.message);
        let segment_id = seg.data["segment_id"].as_str().unwrap().to_string();
        assert_eq!(seg.data["params"]["clip"]["scale_x"], 1.2);
        assert_eq!(seg.data["target_start_duration"], "0s-6s");

        let typo = call_tool(
            &store,
            "add_video_filter",
            json!({ "segment_id": segment_id, "filter_type": "Vintag" }),
        );
        assert!(!typo.success);
        assert_eq!(typo.data["suggestions"][0], "Vintage");

        let filter = call_tool(
            &store,
            "add_video_filter",
            json!({ "segment_id": segment_id, "filter_type": "Vintage", "intensity": 70 }),
        );
        assert!(filter.success, "{}", filter.message);

        let overlap = call_tool(
            &store,
            "add_video_segment",
            json!({ "draft_id": draft_id, "material": media_file(&dir, "beach.mp4"), "target_timerange": "5s-7s" }),
        );
        assert_eq!(overlap.data["error_type"], "overlap");

        let unknown = call_tool(&store, "add_audio_fade", json!({ "segment_id": segment_id, "in_duration": "1s", "out_duration": "1s" }));
        assert!(!unknown.success);

        let export = call_tool(&store, "export_draft", json!({ "draft_id": draft_id }));
        assert!(export.success, "{}", export.message);
        assert_eq!(export.data["draft_name"], "Trip");
        assert_eq!(export.data["error_count"], 0);
    }

    #[test]
    fn test_find_effects_and_media_info() {
        let (dir, store) = temp_store(Some(3));
        let found = call_tool(&store, "find_effects_by_type", json!({ "effect_type": "filter_type", "is_vip": true }));
        assert!(found.success);
        assert_eq!(found.data["total_count"], 2);

        let bad = call_tool(&store, "find_effects_by_type", json!({ "effect_type": "Stickers" }));
        assert!(!bad.success);

        let info = call_tool(&store, "parse_media_info", json!({ "media_path": media_file(&dir, "a.wav") }));
        assert!(info.success);
        assert_eq!(info.data["type"], "audio");
        assert_eq!(info.data["duration_us"], 3_000_000);

        let missing = call_tool(&store, "parse_media_info", json!({ "media_path": "/definitely/not/here.mp4" }));
        assert_eq!(missing.data["error_type"], "not_found");
    }
}
