//! Replays a draft's journals into a compiled project folder.
//!
//! The artifact is assembled in `<output>/.<name>.partial` and swapped into
//! `<output>/<name>` only once it has been saved, so a failed export leaves the
//! previous artifact untouched. Problems with individual records are logged and
//! skipped; only failures before the shell exists, or at save time, fail the run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::audio::AudioOp;
use crate::catalog::{resolve, CatalogKind};
use crate::compiler::{
    AudioSegment, DraftCompiler, DraftScript, JsonDraftFolder, Segment, TextSegment, VideoSegment,
};
use crate::draft::DraftStore;
use crate::error::{DraftError, DraftResult};
use crate::journal::{self, group_by_entity, JournalOp, OpRecord};
use crate::localizer::MATERIAL_DIR;
use crate::text::TextOp;
use crate::track::TrackOp;
use crate::util::remove_leftover;
use crate::video::VideoOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ExportLog {
    pub(crate) level: LogLevel,
    pub(crate) message: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExportSummary {
    pub(crate) success: bool,
    pub(crate) output: String,
    pub(crate) draft_name: String,
    pub(crate) logs: Vec<ExportLog>,
    pub(crate) info_count: usize,
    pub(crate) warning_count: usize,
    pub(crate) error_count: usize,
}

/// Leveled line buffer, mirrored into tracing as it fills.
struct ExportRun {
    draft_id: String,
    logs: Vec<ExportLog>,
}

impl ExportRun {
    fn push(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!(draft = %self.draft_id, "{message}"),
            LogLevel::Warning => warn!(draft = %self.draft_id, "{message}"),
            LogLevel::Error => error!(draft = %self.draft_id, "{message}"),
        }
        self.logs.push(ExportLog { level, message });
    }

    fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warning, message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    fn count(&self, level: LogLevel) -> usize {
        self.logs.iter().filter(|l| l.level == level).count()
    }

    fn finish(self, success: bool, output: &Path, draft_name: String) -> ExportSummary {
        ExportSummary {
            success,
            output: output.to_string_lossy().into_owned(),
            draft_name,
            info_count: self.count(LogLevel::Info),
            warning_count: self.count(LogLevel::Warning),
            error_count: self.count(LogLevel::Error),
            logs: self.logs,
        }
    }
}

/// Per-kind replay hooks: build the segment from its creation record, then
/// apply each later record to it.
trait Replay: JournalOp {
    fn build(&self, id: &str, run: &mut ExportRun, material_root: &Path) -> DraftResult<Segment>;

    /// Returns a short description of what was applied.
    fn apply(&self, segment: &mut Segment) -> DraftResult<String>;
}

fn material_path(material_root: &Path, relative: &str) -> String {
    material_root.join(relative).to_string_lossy().into_owned()
}

fn wrong_segment(op: &str) -> DraftError {
    DraftError::Format(format!("{op} applied to a segment of another kind"))
}

impl Replay for VideoOp {
    fn build(&self, id: &str, _run: &mut ExportRun, material_root: &Path) -> DraftResult<Segment> {
        let VideoOp::AddVideoSegment(p) = self else {
            return Err(wrong_segment(self.tag()));
        };
        Ok(Segment::Video(VideoSegment::new(
            id,
            material_path(material_root, &p.material),
            p.material_type,
            p.target,
            p.source,
            p.speed,
            p.volume,
            p.change_pitch,
            p.clip,
        )))
    }

    fn apply(&self, segment: &mut Segment) -> DraftResult<String> {
        let Segment::Video(seg) = segment else {
            return Err(wrong_segment(self.tag()));
        };
        match self {
            VideoOp::AddVideoSegment(_) => Err(DraftError::Format("duplicate creation record".into())),
            VideoOp::AddAnimation {
                animation_type,
                name,
                duration,
            } => {
                let entry = resolve(*animation_type, name)?;
                seg.add_animation(*animation_type, entry, *duration)?;
                Ok(format!("animation {}.{}", animation_type.as_str(), entry.name))
            }
            VideoOp::AddTransition { name, duration } => {
                let entry = resolve(CatalogKind::TransitionType, name)?;
                seg.add_transition(entry, *duration)?;
                Ok(format!("transition {}", entry.name))
            }
            VideoOp::AddFilter { name, intensity } => {
                let entry = resolve(CatalogKind::FilterType, name)?;
                seg.add_filter(entry, *intensity)?;
                Ok(format!("filter {} at {intensity}", entry.name))
            }
            VideoOp::AddMask(params) => {
                let entry = resolve(CatalogKind::MaskType, &params.name)?;
                seg.add_mask(entry, params.clone())?;
                Ok(format!("mask {}", entry.name))
            }
            VideoOp::AddBackgroundFilling(filling) => {
                seg.add_background_filling(filling.clone())?;
                Ok(format!("background filling {:?}", filling.fill_type))
            }
            VideoOp::AddKeyframe {
                property,
                time_offset,
                value,
            } => {
                seg.add_keyframe(*property, *time_offset, *value)?;
                Ok(format!("keyframe {property:?} at {time_offset}us"))
            }
            VideoOp::AddEffect {
                effect_type,
                name,
                params,
            } => {
                let entry = resolve(*effect_type, name)?;
                seg.add_effect(*effect_type, entry, params.clone())?;
                Ok(format!("effect {}.{}", effect_type.as_str(), entry.name))
            }
        }
    }
}

impl Replay for AudioOp {
    fn build(&self, id: &str, _run: &mut ExportRun, material_root: &Path) -> DraftResult<Segment> {
        let AudioOp::AddAudioSegment(p) = self else {
            return Err(wrong_segment(self.tag()));
        };
        Ok(Segment::Audio(AudioSegment::new(
            id,
            material_path(material_root, &p.material),
            p.target,
            p.source,
            p.speed,
            p.volume,
            p.change_pitch,
        )))
    }

    fn apply(&self, segment: &mut Segment) -> DraftResult<String> {
        let Segment::Audio(seg) = segment else {
            return Err(wrong_segment(self.tag()));
        };
        match self {
            AudioOp::AddAudioSegment(_) => Err(DraftError::Format("duplicate creation record".into())),
            AudioOp::AddEffect {
                effect_type,
                name,
                params,
            } => {
                let entry = resolve(*effect_type, name)?;
                seg.add_effect(*effect_type, entry, params.clone())?;
                Ok(format!("audio effect {}.{}", effect_type.as_str(), entry.name))
            }
            AudioOp::AddFade {
                in_duration,
                out_duration,
            } => {
                seg.add_fade(*in_duration, *out_duration)?;
                Ok(format!("fade in={in_duration}us out={out_duration}us"))
            }
            AudioOp::AddKeyframe { time_offset, volume } => {
                seg.add_keyframe(*time_offset, *volume)?;
                Ok(format!("volume keyframe {volume} at {time_offset}us"))
            }
        }
    }
}

impl Replay for TextOp {
    fn build(&self, id: &str, run: &mut ExportRun, _material_root: &Path) -> DraftResult<Segment> {
        let TextOp::AddTextSegment(p) = self else {
            return Err(wrong_segment(self.tag()));
        };
        let mut seg = TextSegment::new(id, p.text.clone(), p.target);
        if let Some(font) = &p.font {
            match resolve(CatalogKind::FontType, font) {
                Ok(entry) => seg.font = Some(entry),
                Err(err) => run.warning(format!("text {id}: {err}; using the default font")),
            }
        }
        seg.style = p.style;
        seg.clip = p.clip;
        seg.border = p.border;
        seg.background = p.background.clone();
        Ok(Segment::Text(seg))
    }

    fn apply(&self, segment: &mut Segment) -> DraftResult<String> {
        let Segment::Text(seg) = segment else {
            return Err(wrong_segment(self.tag()));
        };
        match self {
            TextOp::AddTextSegment(_) => Err(DraftError::Format("duplicate creation record".into())),
            TextOp::AddAnimation {
                animation_type,
                name,
                duration,
            } => {
                let entry = resolve(*animation_type, name)?;
                seg.add_animation(*animation_type, entry, *duration)?;
                Ok(format!("text animation {}.{}", animation_type.as_str(), entry.name))
            }
            TextOp::AddBubble {
                effect_id,
                resource_id,
            } => {
                seg.add_bubble(effect_id, resource_id)?;
                Ok(format!("bubble {effect_id}/{resource_id}"))
            }
            TextOp::AddEffect { effect_id } => {
                seg.add_effect(effect_id)?;
                Ok(format!("text effect {effect_id}"))
            }
        }
    }
}

fn replay_segments<Op: Replay, S: DraftScript>(
    run: &mut ExportRun,
    script: &mut S,
    records: Vec<OpRecord<Op>>,
    material_root: &Path,
) {
    let kind = Op::KIND.as_str();
    for (id, group) in group_by_entity(records) {
        let creations: Vec<_> = group.iter().filter(|r| r.op.is_creation()).collect();
        let [creation] = creations.as_slice() else {
            run.warning(format!(
                "{kind} {id}: expected one creation record, found {}; skipped",
                creations.len()
            ));
            continue;
        };

        let mut segment = match creation.op.build(&id, run, material_root) {
            Ok(segment) => segment,
            Err(err) => {
                run.error(format!("{kind} {id}: {err}"));
                continue;
            }
        };
        run.info(format!("built {kind} segment {id} at {}", segment.target()));

        for record in group.iter().filter(|r| !r.op.is_creation()) {
            match record.op.apply(&mut segment) {
                Ok(applied) => run.info(format!("{kind} {id}: {applied}")),
                Err(DraftError::NotFound(what)) => {
                    run.warning(format!("{kind} {id}: {} skipped, {what} not found", record.op.tag()))
                }
                Err(err) => run.error(format!("{kind} {id}: {} skipped: {err}", record.op.tag())),
            }
        }

        let track_name = creation.track_name.as_deref();
        match script.add_segment(segment, track_name) {
            Ok(()) => run.info(format!(
                "{kind} {id} placed on {}",
                track_name.unwrap_or("the default track")
            )),
            Err(err) => run.error(format!("{kind} {id} not placed: {err}")),
        }
    }
}

fn copy_materials(run: &mut ExportRun, from: &Path, to: &Path) {
    if !from.is_dir() {
        run.info("no materials to copy");
        return;
    }
    let mut copied = 0usize;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                run.error(format!("material walk failed: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        let result = target
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::copy(entry.path(), &target).map(|_| ()));
        match result {
            Ok(()) => copied += 1,
            Err(err) => run.error(format!("copy of {} failed: {err}", relative.display())),
        }
    }
    run.info(format!("copied {copied} material file(s)"));
}

fn discard_staging(run: &mut ExportRun, staging: &Path) {
    if let Err(err) = remove_leftover(staging) {
        run.warning(format!("staging dir {} left behind: {err}", staging.display()));
    }
}

fn replace_dir(staging: &Path, target: &Path) -> std::io::Result<()> {
    if target.exists() {
        fs::remove_dir_all(target)?;
    }
    fs::rename(staging, target)
}

/// Exports with the bundled JSON folder writer.
pub(crate) fn export_draft(store: &DraftStore, draft_id: &str) -> ExportSummary {
    export_with(store, &JsonDraftFolder, draft_id)
}

pub(crate) fn export_with<C: DraftCompiler>(store: &DraftStore, compiler: &C, draft_id: &str) -> ExportSummary {
    let mut run = ExportRun {
        draft_id: draft_id.to_string(),
        logs: Vec::new(),
    };
    let output_root = store.settings.output_path.clone();
    run.info(format!("exporting draft {draft_id}"));

    let meta = match store.load_draft(draft_id) {
        Ok(meta) => meta,
        Err(err) => {
            run.error(format!("cannot export: {err}"));
            return run.finish(false, &output_root, format!("Draft_{draft_id}"));
        }
    };
    let name = meta.artifact_name();
    let draft_dir = store.draft_dir(draft_id);

    let journals = (|| -> DraftResult<_> {
        Ok((
            journal::load::<TrackOp>(&draft_dir)?,
            journal::load::<VideoOp>(&draft_dir)?,
            journal::load::<AudioOp>(&draft_dir)?,
            journal::load::<TextOp>(&draft_dir)?,
        ))
    })();
    let (tracks, videos, audios, texts) = match journals {
        Ok(loaded) => loaded,
        Err(err) => {
            run.error(format!("cannot read journals: {err}"));
            return run.finish(false, &output_root, name);
        }
    };

    let final_dir = output_root.join(&name);
    let staging = output_root.join(format!(".{name}.partial"));
    if final_dir.parent() != Some(output_root.as_path()) || staging.parent() != Some(output_root.as_path()) {
        run.error(format!("artifact name '{name}' does not stay inside {}", output_root.display()));
        return run.finish(false, &output_root, name);
    }
    let mut script = match prepare_staging(&staging).and_then(|()| compiler.create_draft(&staging, &meta)) {
        Ok(script) => script,
        Err(err) => {
            run.error(format!("cannot create artifact shell: {err}"));
            discard_staging(&mut run, &staging);
            return run.finish(false, &output_root, name);
        }
    };
    run.info(format!("artifact '{name}' {}x{} @ {}fps", meta.width, meta.height, meta.fps));

    copy_materials(&mut run, &draft_dir.join(MATERIAL_DIR), &staging.join(MATERIAL_DIR));

    for record in &tracks {
        let TrackOp::AddTrack { track_type } = &record.op;
        let label = record.track_name.as_deref().unwrap_or(track_type.as_str());
        match script.add_track(*track_type, record.track_name.as_deref()) {
            Ok(()) => run.info(format!("added {track_type} track '{label}'")),
            Err(err) => run.error(format!("track '{label}' skipped: {err}")),
        }
    }

    let material_root: PathBuf = std::path::absolute(&final_dir).unwrap_or_else(|_| final_dir.clone());
    replay_segments(&mut run, &mut script, videos, &material_root);
    replay_segments(&mut run, &mut script, audios, &material_root);
    replay_segments(&mut run, &mut script, texts, &material_root);

    if let Err(err) = script.save() {
        run.error(format!("save failed: {err}"));
        discard_staging(&mut run, &staging);
        return run.finish(false, &output_root, name);
    }
    if let Err(err) = replace_dir(&staging, &final_dir) {
        run.error(format!("cannot move artifact into place: {err}"));
        return run.finish(false, &output_root, name);
    }
    run.info(format!("exported to {}", final_dir.display()));
    run.finish(true, &output_root, name)
}

fn prepare_staging(staging: &Path) -> DraftResult<()> {
    if staging.exists() {
        fs::remove_dir_all(staging)?;
    }
    fs::create_dir_all(staging)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioBuilder, AudioSegmentRequest};
    use crate::compiler::CONTENT_FILE;
    use crate::draft::testing::{media_file, temp_store};
    use crate::text::{TextBuilder, TextSegmentRequest};
    use crate::timerange::TimeRange;
    use crate::track::TrackBuilder;
    use crate::types::TrackKind;
    use crate::video::{VideoBuilder, VideoSegmentRequest};

    fn content(store: &DraftStore, summary: &ExportSummary) -> serde_json::Value {
        let path = store.settings.output_path.join(&summary.draft_name).join(CONTENT_FILE);
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    fn clip_request(material: &str, range: &str) -> VideoSegmentRequest {
        VideoSegmentRequest {
            material: material.to_string(),
            target_timerange: range.to_string(),
            track_name: Some("main".into()),
            ..VideoSegmentRequest::default()
        }
    }

    #[test]
    fn test_two_clips_end_to_end() {
        let (dir, store) = temp_store(Some(60));
        let draft = store.create_draft("Promo", None, None, None).unwrap();
        TrackBuilder::new(&store, &draft.id).add_track(TrackKind::Video, Some("main")).unwrap();
        let clip = media_file(&dir, "clip.mp4");
        let mut video = VideoBuilder::new(&store, &draft.id);
        let first = video.add_video_segment(&clip_request(&clip, "0s-5s")).unwrap();
        video.add_video_segment(&clip_request(&clip, "5s-8s")).unwrap();

        let summary = export_draft(&store, &draft.id);
        assert!(summary.success, "{:?}", summary.logs);
        assert_eq!(summary.error_count, 0);
        assert_eq!(summary.draft_name, "Promo");

        let content = content(&store, &summary);
        let tracks = content["tracks"].as_array().unwrap();
        assert_eq!(tracks.len(), 1);
        let segments = tracks[0]["segments"].as_array().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(content["duration"], 8_000_000);
        assert_eq!(segments[0]["id"], first.id.as_str());
        assert_eq!(segments[0]["target_timerange"]["duration"], 5_000_000);

        let material = segments[0]["material_path"].as_str().unwrap();
        assert!(material.ends_with("clip.mp4"));
        assert!(Path::new(material).is_file());
        assert!(!store.settings.output_path.join(".Promo.partial").exists());

        // A placement straddling both clips is refused and the journal stays valid.
        let err = video.add_video_segment(&clip_request(&clip, "4s-6s")).unwrap_err();
        assert!(matches!(err, DraftError::Overlap { .. }));
        assert!(export_draft(&store, &draft.id).success);
    }

    #[test]
    fn test_export_is_repeatable() {
        let (dir, store) = temp_store(None);
        let draft = store.create_draft("", None, None, None).unwrap();
        TrackBuilder::new(&store, &draft.id).add_track(TrackKind::Audio, None).unwrap();
        let mut audio = AudioBuilder::new(&store, &draft.id);
        audio
            .add_audio_segment(&AudioSegmentRequest {
                material: media_file(&dir, "song.mp3"),
                target_timerange: "1s-3s".into(),
                ..AudioSegmentRequest::default()
            })
            .unwrap();
        assert!(audio.add_fade("0.5s", "0.5s", None).success);

        let first = export_draft(&store, &draft.id);
        let mut before = content(&store, &first);
        let stale = store.settings.output_path.join(&first.draft_name).join("stale.txt");
        fs::write(&stale, "old").unwrap();
        let second = export_draft(&store, &draft.id);

        assert!(second.success);
        assert_eq!(first.draft_name, format!("Draft_{}", draft.id));
        let after = content(&store, &second);
        // Track ids are minted per export.
        before["tracks"][0]["id"] = after["tracks"][0]["id"].clone();
        assert_eq!(before, after);
        assert!(!stale.exists());
    }

    #[test]
    fn test_orphan_mutation_is_warned_and_skipped() {
        let (_dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        TrackBuilder::new(&store, &draft.id).add_track(TrackKind::Video, None).unwrap();
        let orphan = OpRecord::new(
            "ghost",
            None,
            VideoOp::AddFilter {
                name: "Warm".into(),
                intensity: 50.0,
            },
        );
        journal::append(&store.draft_dir(&draft.id), &orphan).unwrap();

        let summary = export_draft(&store, &draft.id);
        assert!(summary.success);
        assert_eq!(summary.warning_count, 1);
        assert_eq!(summary.error_count, 0);
        assert!(content(&store, &summary)["tracks"][0]["segments"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_replay_keeps_intervals_and_sorts_out_bad_records() {
        let (dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        let tracks = TrackBuilder::new(&store, &draft.id);
        tracks.add_track(TrackKind::Video, None).unwrap();
        tracks.add_track(TrackKind::Text, Some("subs")).unwrap();

        let mut video = VideoBuilder::new(&store, &draft.id);
        let created = video
            .add_video_segment(&VideoSegmentRequest {
                material: media_file(&dir, "clip.mov"),
                target_timerange: "1.5s-4s".into(),
                source_timerange: Some("10s-12.5s".into()),
                ..VideoSegmentRequest::default()
            })
            .unwrap();
        assert!(video.add_filter("Warm", Some(60.0), None).success);
        // Unknown catalog name: warning at replay.
        assert!(video.add_filter("xyzzy", Some(60.0), None).success);
        assert!(video.add_transition("Dissolve", None, None).success);
        // Second transition: rejected by the compiled segment.
        assert!(video.add_transition("Dissolve", None, None).success);

        let mut text = TextBuilder::new(&store, &draft.id).with_track("subs");
        text.add_text_segment(&TextSegmentRequest {
            text: "Hello".into(),
            timerange: "0s-2s".into(),
            font: Some("xxxx".into()),
            ..TextSegmentRequest::default()
        })
        .unwrap();

        let summary = export_draft(&store, &draft.id);
        assert!(summary.success);
        assert_eq!(summary.warning_count, 2);
        assert_eq!(summary.error_count, 1);

        let content = content(&store, &summary);
        let seg = &content["tracks"][0]["segments"][0];
        let target: TimeRange = serde_json::from_value(seg["target_timerange"].clone()).unwrap();
        let source: TimeRange = serde_json::from_value(seg["source_timerange"].clone()).unwrap();
        assert_eq!(target, created.payload.target);
        assert_eq!(source, TimeRange::new(10_000_000, 2_500_000));
        assert_eq!(seg["filters"].as_array().unwrap().len(), 1);
        assert_eq!(content["tracks"][1]["segments"][0]["text"], "Hello");
    }

    #[test]
    fn test_dot_dot_name_exports_under_id_name() {
        let (dir, store) = temp_store(None);
        let draft = store.create_draft("legit", None, None, None).unwrap();
        // A hand-edited draft.json bypasses the name check in create_draft.
        let meta_path = store.draft_dir(&draft.id).join(crate::draft::DRAFT_FILE);
        let mut meta: serde_json::Value = serde_json::from_str(&fs::read_to_string(&meta_path).unwrap()).unwrap();
        meta["name"] = "..".into();
        fs::write(&meta_path, meta.to_string()).unwrap();
        let sentinel = dir.path().join("sentinel.txt");
        fs::write(&sentinel, "keep").unwrap();

        let summary = export_draft(&store, &draft.id);
        assert!(summary.success, "{:?}", summary.logs);
        assert_eq!(summary.draft_name, format!("Draft_{}", draft.id));
        assert!(sentinel.is_file());
        assert!(store.settings.save_path.join("index.sqlite").is_file());
        assert!(store.settings.output_path.join(&summary.draft_name).join(CONTENT_FILE).is_file());
    }

    #[test]
    fn test_missing_draft_fails_without_artifact() {
        let (_dir, store) = temp_store(None);
        let summary = export_draft(&store, "nope");
        assert!(!summary.success);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.draft_name, "Draft_nope");
        assert!(!store.settings.output_path.join("Draft_nope").exists());
    }
}
