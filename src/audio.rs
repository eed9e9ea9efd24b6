//! Audio segments and their effect, fade and volume-keyframe mutations.

use serde::{Deserialize, Serialize};

use crate::builder::{check_bounds, check_non_empty, reject, settle, Created, SegmentScope};
use crate::catalog::CatalogKind;
use crate::draft::DraftStore;
use crate::error::{DraftError, DraftResult};
use crate::journal::{JournalKind, JournalOp};
use crate::localizer::MaterialKind;
use crate::timerange::{parse_duration, resolve_timing, TimeRange};
use crate::types::{MutationStatus, SegmentClass, TrackKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AudioSegmentParams {
    pub(crate) material: String,
    pub(crate) target: TimeRange,
    pub(crate) source: TimeRange,
    pub(crate) speed: f64,
    pub(crate) volume: f64,
    #[serde(default)]
    pub(crate) change_pitch: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "snake_case")]
pub(crate) enum AudioOp {
    AddAudioSegment(AudioSegmentParams),
    AddEffect {
        effect_type: CatalogKind,
        name: String,
        #[serde(default)]
        params: Vec<Option<f64>>,
    },
    AddFade {
        in_duration: i64,
        out_duration: i64,
    },
    AddKeyframe {
        time_offset: i64,
        volume: f64,
    },
}

impl JournalOp for AudioOp {
    const KIND: JournalKind = JournalKind::Audio;

    fn tag(&self) -> &'static str {
        match self {
            Self::AddAudioSegment(_) => "add_audio_segment",
            Self::AddEffect { .. } => "add_effect",
            Self::AddFade { .. } => "add_fade",
            Self::AddKeyframe { .. } => "add_keyframe",
        }
    }

    fn is_creation(&self) -> bool {
        matches!(self, Self::AddAudioSegment(_))
    }

    fn target_range(&self) -> Option<TimeRange> {
        match self {
            Self::AddAudioSegment(p) => Some(p.target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AudioSegmentRequest {
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
    pub(crate) track_name: Option<String>,
}

pub(crate) struct AudioBuilder<'a> {
    scope: SegmentScope<'a>,
}

impl<'a> AudioBuilder<'a> {
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

    pub(crate) fn add_audio_segment(&mut self, req: &AudioSegmentRequest) -> DraftResult<Created<AudioSegmentParams>> {
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
        let timing = resolve_timing(target, source, req.speed)?;

        let track = self
            .scope
            .place::<AudioOp>(TrackKind::Audio, req.track_name.as_deref(), &timing.target)?;
        let material = self
            .scope
            .localize_checked(&req.material, MaterialKind::Audio, Some(timing.source.end()))?;

        let payload = AudioSegmentParams {
            material: material.relative,
            target: timing.target,
            source: timing.source,
            speed: timing.speed,
            volume,
            change_pitch: req.change_pitch.unwrap_or(false),
        };
        let id = self
            .scope
            .commit(&track, &[SegmentClass::Audio], AudioOp::AddAudioSegment(payload.clone()))?;
        Ok(Created { id, payload })
    }

    pub(crate) fn add_effect(
        &self,
        effect_type: &str,
        name: &str,
        params: &[Option<f64>],
        segment_id: Option<&str>,
    ) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Audio)?;
            let kind = match CatalogKind::parse(effect_type) {
                Ok(
                    k @ (CatalogKind::AudioSceneEffectType
                    | CatalogKind::ToneEffectType
                    | CatalogKind::SpeechToSongType),
                ) => k,
                _ => {
                    return Err(reject(format!(
                        "effect_type must be AudioSceneEffectType, ToneEffectType or SpeechToSongType, got '{effect_type}'"
                    )));
                }
            };
            check_non_empty("effect_name", name)?;
            for value in params.iter().flatten() {
                check_bounds("effect param", *value, 0.0, 100.0)?;
            }
            Ok(self.scope.mutate(
                &id,
                AudioOp::AddEffect {
                    effect_type: kind,
                    name: name.trim().to_string(),
                    params: params.to_vec(),
                },
            ))
        })())
    }

    pub(crate) fn add_fade(&self, in_duration: &str, out_duration: &str, segment_id: Option<&str>) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Audio)?;
            check_non_empty("in_duration", in_duration)?;
            check_non_empty("out_duration", out_duration)?;
            let fade_in = parse_duration(in_duration).map_err(|err| reject(format!("in_duration: {err}")))?;
            let fade_out = parse_duration(out_duration).map_err(|err| reject(format!("out_duration: {err}")))?;
            Ok(self.scope.mutate(
                &id,
                AudioOp::AddFade {
                    in_duration: fade_in,
                    out_duration: fade_out,
                },
            ))
        })())
    }

    pub(crate) fn add_keyframe(&self, time_offset: &str, volume: f64, segment_id: Option<&str>) -> MutationStatus {
        settle((|| {
            let id = self.scope.mutation_target(segment_id, SegmentClass::Audio)?;
            check_non_empty("time_offset", time_offset)?;
            let offset = parse_duration(time_offset).map_err(|err| reject(format!("time_offset: {err}")))?;
            if !(volume >= 0.0) || !volume.is_finite() {
                return Err(reject(format!("volume must be >= 0, got {volume}")));
            }
            Ok(self.scope.mutate(
                &id,
                AudioOp::AddKeyframe {
                    time_offset: offset,
                    volume,
                },
            ))
        })())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::testing::{media_file, temp_store};
    use crate::journal;
    use crate::track::TrackBuilder;

    fn bgm_request(material: &str, range: &str) -> AudioSegmentRequest {
        AudioSegmentRequest {
            material: material.to_string(),
            target_timerange: range.to_string(),
            ..AudioSegmentRequest::default()
        }
    }

    #[test]
    fn test_default_track_segments_are_overlap_checked() {
        let (dir, store) = temp_store(Some(30));
        let draft = store.create_draft("d", None, None, None).unwrap();
        TrackBuilder::new(&store, &draft.id).add_track(TrackKind::Audio, None).unwrap();
        let song = media_file(&dir, "song.mp3");
        let mut audio = AudioBuilder::new(&store, &draft.id);

        let first = audio.add_audio_segment(&bgm_request(&song, "0s-10s")).unwrap();
        assert_eq!(first.payload.material, "material/song.mp3");
        assert_eq!(first.payload.source, TimeRange::new(0, 10_000_000));
        let err = audio.add_audio_segment(&bgm_request(&song, "9s-12s")).unwrap_err();
        assert!(matches!(err, DraftError::Overlap { .. }));
        audio.add_audio_segment(&bgm_request(&song, "10s-12s")).unwrap();

        let records = journal::load::<AudioOp>(&store.draft_dir(&draft.id)).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.track_name.is_none()));
    }

    #[test]
    fn test_video_file_rejected_as_audio() {
        let (dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        TrackBuilder::new(&store, &draft.id).add_track(TrackKind::Audio, None).unwrap();
        let mut audio = AudioBuilder::new(&store, &draft.id);
        let err = audio
            .add_audio_segment(&bgm_request(&media_file(&dir, "notes.txt"), "0s-1s"))
            .unwrap_err();
        assert!(matches!(err, DraftError::Format(_)));
    }

    #[test]
    fn test_mutations() {
        let (dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        TrackBuilder::new(&store, &draft.id).add_track(TrackKind::Audio, Some("bgm")).unwrap();
        let mut audio = AudioBuilder::new(&store, &draft.id).with_track("bgm");
        let created = audio
            .add_audio_segment(&bgm_request(&media_file(&dir, "song.wav"), "0s-5s"))
            .unwrap();

        assert!(audio.add_fade("1s", "500ms", None).success);
        assert!(!audio.add_fade("", "1s", None).success);
        assert!(!audio.add_fade("1s", "later", None).success);
        assert!(audio.add_keyframe("2s", 0.3, None).success);
        assert!(!audio.add_keyframe("2s", -0.1, None).success);
        assert!(audio.add_effect("ToneEffectType", "Robot", &[Some(50.0)], None).success);
        assert!(!audio.add_effect("FilterType", "Warm", &[], None).success);
        assert!(!audio.add_effect("AudioSceneEffectType", "Rain", &[Some(101.0)], None).success);

        // A fresh builder can address the segment explicitly.
        let other = AudioBuilder::new(&store, &draft.id).with_segment(created.id.clone());
        assert!(other.add_fade("0.2s", "0.2s", None).success);
        assert!(!other.add_fade("0.2s", "0.2s", Some("ghost")).success);

        let records = journal::load::<AudioOp>(&store.draft_dir(&draft.id)).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.entity_id == created.id));
        assert_eq!(
            records[1].op,
            AudioOp::AddFade {
                in_duration: 1_000_000,
                out_duration: 500_000
            }
        );
    }

    #[test]
    fn test_video_id_is_not_an_audio_id() {
        let (dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        let tracks = TrackBuilder::new(&store, &draft.id);
        tracks.add_track(TrackKind::Video, None).unwrap();
        let mut video = crate::video::VideoBuilder::new(&store, &draft.id);
        let clip = video
            .add_video_segment(&crate::video::VideoSegmentRequest {
                material: media_file(&dir, "clip.mp4"),
                target_timerange: "0s-1s".into(),
                ..Default::default()
            })
            .unwrap();

        let audio = AudioBuilder::new(&store, &draft.id);
        let status = audio.add_fade("1s", "1s", Some(&clip.id));
        assert!(!status.success);
        assert!(status.message.contains("unknown audio segment"));
    }
}
