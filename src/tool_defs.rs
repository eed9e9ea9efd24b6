use std::collections::HashMap;

use serde_json::json;

fn clip_settings_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "alpha": { "type": "number" },
            "flip_horizontal": { "type": "boolean" },
            "flip_vertical": { "type": "boolean" },
            "rotation": { "type": "number" },
            "scale_x": { "type": "number" },
            "scale_y": { "type": "number" },
            "transform_x": { "type": "number" },
            "transform_y": { "type": "number" }
        }
    })
}

fn segment_mutation(name: &str, description: &str, properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    let mut props = json!({ "segment_id": { "type": "string" } });
    if let (Some(base), Some(extra)) = (props.as_object_mut(), properties.as_object()) {
        base.extend(extra.clone());
    }
    let mut req = vec!["segment_id"];
    req.extend_from_slice(required);
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": props,
            "required": req
        }
    })
}

pub(crate) fn tool_definitions_json() -> Vec<serde_json::Value> {
    let effect_props = json!({
        "effect_type": { "type": "string" },
        "effect_name": { "type": "string" },
        "params": { "type": "array", "items": { "type": ["number", "null"] } }
    });
    let animation_props = json!({
        "animation_type": { "type": "string" },
        "animation_name": { "type": "string" },
        "duration": { "type": "string" }
    });

    vec![
        json!({
            "name": "rules",
            "description": "Workflow rules for building a draft. Read before the first call.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "create_draft",
            "description": "Create a draft. Returns its draft_id.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "draft_name": { "type": "string" },
                    "width": { "type": "integer" },
                    "height": { "type": "integer" },
                    "fps": { "type": "integer" }
                }
            }
        }),
        json!({
            "name": "export_draft",
            "description": "Replay a draft's journals into the output folder.",
            "inputSchema": {
                "type": "object",
                "properties": { "draft_id": { "type": "string" } },
                "required": ["draft_id"]
            }
        }),
        json!({
            "name": "create_track",
            "description": "Add a video, audio or text track. Only the first track of a kind may be unnamed.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "draft_id": { "type": "string" },
                    "track_type": { "type": "string", "enum": ["video", "audio", "text"] },
                    "track_name": { "type": "string" }
                },
                "required": ["draft_id", "track_type"]
            }
        }),
        json!({
            "name": "delete_track",
            "description": "Remove a track by name or id.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "draft_id": { "type": "string" },
                    "track": { "type": "string" }
                },
                "required": ["draft_id", "track"]
            }
        }),
        json!({
            "name": "list_tracks",
            "description": "Tracks of a draft in creation order.",
            "inputSchema": {
                "type": "object",
                "properties": { "draft_id": { "type": "string" } },
                "required": ["draft_id"]
            }
        }),
        json!({
            "name": "add_video_segment",
            "description": "Place a video clip. Intervals are \"start-end\", e.g. \"0s-4.2s\".",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "draft_id": { "type": "string" },
                    "material": { "type": "string" },
                    "target_timerange": { "type": "string" },
                    "source_timerange": { "type": "string" },
                    "speed": { "type": "number" },
                    "volume": { "type": "number" },
                    "change_pitch": { "type": "boolean" },
                    "clip_settings": clip_settings_schema(),
                    "track_name": { "type": "string" }
                },
                "required": ["draft_id", "material", "target_timerange"]
            }
        }),
        json!({
            "name": "add_image_segment",
            "description": "Place a still image on a video track.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "draft_id": { "type": "string" },
                    "material": { "type": "string" },
                    "target_timerange": { "type": "string" },
                    "clip_settings": clip_settings_schema(),
                    "track_name": { "type": "string" }
                },
                "required": ["draft_id", "material", "target_timerange"]
            }
        }),
        segment_mutation(
            "add_video_animation",
            "Intro, outro or group animation on a video or image segment.",
            animation_props.clone(),
            &["animation_type", "animation_name"],
        ),
        segment_mutation(
            "add_image_animation",
            "Intro, outro or group animation on an image segment.",
            animation_props.clone(),
            &["animation_type", "animation_name"],
        ),
        segment_mutation(
            "add_video_transition",
            "Transition into the next clip.",
            json!({ "transition_type": { "type": "string" }, "duration": { "type": "string" } }),
            &["transition_type"],
        ),
        segment_mutation(
            "add_video_filter",
            "Color filter, intensity 0-100.",
            json!({ "filter_type": { "type": "string" }, "intensity": { "type": "number" } }),
            &["filter_type"],
        ),
        segment_mutation(
            "add_video_mask",
            "Mask; rect_width and round_corner apply to the Rectangle mask only.",
            json!({
                "mask_type": { "type": "string" },
                "center_x": { "type": "number" },
                "center_y": { "type": "number" },
                "size": { "type": "number" },
                "rotation": { "type": "number" },
                "feather": { "type": "number" },
                "invert": { "type": "boolean" },
                "rect_width": { "type": "number" },
                "round_corner": { "type": "number" }
            }),
            &["mask_type"],
        ),
        segment_mutation(
            "add_video_background_filling",
            "Fill the canvas behind the clip with blur or a color.",
            json!({
                "fill_type": { "type": "string", "enum": ["blur", "color"] },
                "blur": { "type": "number" },
                "color": { "type": "string" }
            }),
            &["fill_type"],
        ),
        segment_mutation(
            "add_video_keyframe",
            "Keyframe a visual property at an offset into the segment.",
            json!({
                "property": { "type": "string" },
                "time_offset": { "type": "string" },
                "value": { "type": "number" }
            }),
            &["property", "time_offset", "value"],
        ),
        segment_mutation(
            "add_video_effect",
            "Scene or character effect, params each 0-100.",
            effect_props.clone(),
            &["effect_type", "effect_name"],
        ),
        json!({
            "name": "add_audio_segment",
            "description": "Place an audio clip. Intervals are \"start-end\".",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "draft_id": { "type": "string" },
                    "material": { "type": "string" },
                    "target_timerange": { "type": "string" },
                    "source_timerange": { "type": "string" },
                    "speed": { "type": "number" },
                    "volume": { "type": "number" },
                    "change_pitch": { "type": "boolean" },
                    "track_name": { "type": "string" }
                },
                "required": ["draft_id", "material", "target_timerange"]
            }
        }),
        segment_mutation(
            "add_audio_effect",
            "Scene, tone or speech-to-song effect.",
            effect_props,
            &["effect_type", "effect_name"],
        ),
        segment_mutation(
            "add_audio_fade",
            "Fade in and out durations, e.g. \"1s\".",
            json!({ "in_duration": { "type": "string" }, "out_duration": { "type": "string" } }),
            &["in_duration", "out_duration"],
        ),
        segment_mutation(
            "add_audio_keyframe",
            "Volume keyframe.",
            json!({ "time_offset": { "type": "string" }, "volume": { "type": "number" } }),
            &["time_offset", "volume"],
        ),
        json!({
            "name": "add_text_segment",
            "description": "Place a caption. timerange is \"start-end\".",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "draft_id": { "type": "string" },
                    "text": { "type": "string" },
                    "timerange": { "type": "string" },
                    "font": { "type": "string" },
                    "style": { "type": "object" },
                    "clip_settings": clip_settings_schema(),
                    "border": { "type": "object" },
                    "background": { "type": "object" },
                    "track_name": { "type": "string" }
                },
                "required": ["draft_id", "text", "timerange"]
            }
        }),
        segment_mutation(
            "add_text_animation",
            "TextIntro, TextOutro or TextLoopAnim animation.",
            animation_props,
            &["animation_type", "animation_name"],
        ),
        segment_mutation(
            "add_text_bubble",
            "Speech bubble by effect and resource id.",
            json!({ "effect_id": { "type": "string" }, "resource_id": { "type": "string" } }),
            &["effect_id", "resource_id"],
        ),
        segment_mutation(
            "add_text_effect",
            "Decorative text effect by id.",
            json!({ "effect_id": { "type": "string" } }),
            &["effect_id"],
        ),
        json!({
            "name": "find_effects_by_type",
            "description": "List or fuzzy-search catalog entries of one kind.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "effect_type": { "type": "string" },
                    "keyword": { "type": "string" },
                    "is_vip": { "type": "boolean" },
                    "limit": { "type": "integer" }
                },
                "required": ["effect_type"]
            }
        }),
        json!({
            "name": "parse_media_info",
            "description": "Size, kind and probed duration of a local media file.",
            "inputSchema": {
                "type": "object",
                "properties": { "media_path": { "type": "string" } },
                "required": ["media_path"]
            }
        }),
    ]
}

pub(crate) fn tool_catalog_map(catalog: &[serde_json::Value]) -> HashMap<String, serde_json::Value> {
    let mut map = HashMap::new();
    for tool in catalog {
        if let Some(name) = tool.get("name").and_then(|v| v.as_str()) {
            map.insert(name.to_string(), tool.clone());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_unique_and_schemas_present() {
        let defs = tool_definitions_json();
        let map = tool_catalog_map(&defs);
        assert_eq!(map.len(), defs.len());
        for def in &defs {
            assert_eq!(def["inputSchema"]["type"], "object", "{}", def["name"]);
        }
        let fade = &map["add_audio_fade"]["inputSchema"];
        assert_eq!(fade["required"], json!(["segment_id", "in_duration", "out_duration"]));
        assert!(fade["properties"]["segment_id"].is_object());
    }
}
