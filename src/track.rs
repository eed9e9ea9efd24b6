//! Track journal and naming rules.
//!
//! The first track of a kind may stay unnamed; every later track of that kind
//! needs a name, and names are unique across all tracks of the draft.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::audio::AudioOp;
use crate::draft::DraftStore;
use crate::error::{DraftError, DraftResult};
use crate::index::TrackMapping;
use crate::journal::{self, JournalKind, JournalOp, OpRecord};
use crate::text::TextOp;
use crate::types::TrackKind;
use crate::video::VideoOp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "snake_case")]
pub(crate) enum TrackOp {
    AddTrack { track_type: TrackKind },
}

impl JournalOp for TrackOp {
    const KIND: JournalKind = JournalKind::Track;

    fn tag(&self) -> &'static str {
        "add_track"
    }

    fn is_creation(&self) -> bool {
        true
    }
}

pub(crate) struct TrackBuilder<'a> {
    store: &'a DraftStore,
    draft_id: String,
}

impl<'a> TrackBuilder<'a> {
    pub(crate) fn new(store: &'a DraftStore, draft_id: impl Into<String>) -> Self {
        Self {
            store,
            draft_id: draft_id.into(),
        }
    }

    fn mapping(&self, record: &OpRecord<TrackOp>) -> TrackMapping {
        let TrackOp::AddTrack { track_type } = &record.op;
        TrackMapping {
            id: record.entity_id.clone(),
            draft_id: self.draft_id.clone(),
            kind: *track_type,
            name: record.track_name.clone(),
        }
    }

    /// Tracks in creation order, read from the journal.
    pub(crate) fn list_tracks(&self) -> DraftResult<Vec<TrackMapping>> {
        let records = journal::load::<TrackOp>(&self.store.draft_dir(&self.draft_id))?;
        Ok(records.iter().map(|r| self.mapping(r)).collect())
    }

    pub(crate) fn track_by_name(&self, name: &str) -> DraftResult<Option<TrackMapping>> {
        Ok(self
            .list_tracks()?
            .into_iter()
            .find(|t| t.name.as_deref() == Some(name)))
    }

    pub(crate) fn add_track(&self, kind: TrackKind, name: Option<&str>) -> DraftResult<TrackMapping> {
        self.store.load_draft(&self.draft_id)?;
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let existing = self.list_tracks()?;

        match name {
            None if existing.iter().any(|t| t.kind == kind) => {
                return Err(DraftError::NameConflict(format!(
                    "draft already has a {kind} track; additional {kind} tracks need a name"
                )));
            }
            Some(name) if existing.iter().any(|t| t.name.as_deref() == Some(name)) => {
                return Err(DraftError::NameConflict(format!(
                    "a track named '{name}' already exists in this draft"
                )));
            }
            _ => {}
        }

        let record = OpRecord::new(
            Uuid::new_v4().to_string(),
            name.map(String::from),
            TrackOp::AddTrack { track_type: kind },
        );
        journal::append(&self.store.draft_dir(&self.draft_id), &record)?;
        let mapping = self.mapping(&record);
        self.store.index.upsert_track(&mapping)?;
        info!(draft = %self.draft_id, track = %mapping.id, kind = kind.as_str(), name = ?mapping.name, "added track");
        Ok(mapping)
    }

    /// Removes a track by name or id together with every segment placed on it.
    /// The only operation that rewrites journal history.
    pub(crate) fn delete_track(&self, name_or_id: &str) -> DraftResult<TrackMapping> {
        let dir = self.store.draft_dir(&self.draft_id);
        let mut records = journal::load::<TrackOp>(&dir)?;
        let pos = records
            .iter()
            .position(|r| r.track_name.as_deref() == Some(name_or_id))
            .or_else(|| records.iter().position(|r| r.entity_id == name_or_id))
            .ok_or_else(|| DraftError::NotFound(format!("track '{name_or_id}'")))?;
        let removed = records.remove(pos);
        let mapping = self.mapping(&removed);

        let track_name = mapping.name.as_deref();
        let segments = match mapping.kind {
            TrackKind::Video => drop_segments::<VideoOp>(&dir, track_name)?,
            TrackKind::Audio => drop_segments::<AudioOp>(&dir, track_name)?,
            TrackKind::Text => drop_segments::<TextOp>(&dir, track_name)?,
        };
        journal::rewrite(&dir, &records)?;
        self.store.index.remove_track_segments(&mapping.id)?;
        self.store.index.remove_track(&mapping.id)?;
        info!(draft = %self.draft_id, track = %mapping.id, segments, "deleted track");
        Ok(mapping)
    }

    /// Track a new segment of `kind` lands on: the named one, else the first of that kind.
    pub(crate) fn resolve_for_segment(&self, kind: TrackKind, name: Option<&str>) -> DraftResult<TrackMapping> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                let track = self
                    .track_by_name(name)?
                    .ok_or_else(|| DraftError::NotFound(format!("track '{name}'")))?;
                if track.kind != kind {
                    return Err(DraftError::TypeMismatch {
                        track: name.to_string(),
                        expected: kind.to_string(),
                        actual: track.kind.to_string(),
                    });
                }
                Ok(track)
            }
            None => self
                .list_tracks()?
                .into_iter()
                .find(|t| t.kind == kind)
                .ok_or_else(|| DraftError::NotFound(format!("no {kind} track in draft '{}'", self.draft_id))),
        }
    }
}

/// Rewrites the `Op` journal without the segments created on `track_name`,
/// mutations included. Returns how many segments were dropped.
fn drop_segments<Op: JournalOp>(dir: &Path, track_name: Option<&str>) -> DraftResult<usize> {
    let records = journal::load::<Op>(dir)?;
    let doomed: HashSet<String> = records
        .iter()
        .filter(|r| r.op.is_creation() && r.track_name.as_deref() == track_name)
        .map(|r| r.entity_id.clone())
        .collect();
    if doomed.is_empty() {
        return Ok(0);
    }
    let kept: Vec<_> = records
        .into_iter()
        .filter(|r| !doomed.contains(&r.entity_id))
        .collect();
    journal::rewrite(dir, &kept)?;
    Ok(doomed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::testing::temp_store;

    #[test]
    fn test_second_unnamed_track_of_kind_fails() {
        let (_dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        let tracks = TrackBuilder::new(&store, &draft.id);

        tracks.add_track(TrackKind::Video, None).unwrap();
        tracks.add_track(TrackKind::Audio, None).unwrap();
        let err = tracks.add_track(TrackKind::Video, None).unwrap_err();
        assert!(matches!(err, DraftError::NameConflict(_)));
        tracks.add_track(TrackKind::Video, Some("overlay")).unwrap();
        assert_eq!(tracks.list_tracks().unwrap().len(), 3);
    }

    #[test]
    fn test_names_unique_across_kinds() {
        let (_dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        let tracks = TrackBuilder::new(&store, &draft.id);

        tracks.add_track(TrackKind::Video, Some("main")).unwrap();
        let err = tracks.add_track(TrackKind::Audio, Some("main")).unwrap_err();
        assert!(matches!(err, DraftError::NameConflict(_)));
    }

    #[test]
    fn test_unknown_draft() {
        let (_dir, store) = temp_store(None);
        let tracks = TrackBuilder::new(&store, "nope");
        assert!(matches!(
            tracks.add_track(TrackKind::Video, None),
            Err(DraftError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_track_rewrites_journal_and_index() {
        let (_dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        let tracks = TrackBuilder::new(&store, &draft.id);

        let main = tracks.add_track(TrackKind::Video, Some("main")).unwrap();
        let bgm = tracks.add_track(TrackKind::Audio, Some("bgm")).unwrap();

        let removed = tracks.delete_track("main").unwrap();
        assert_eq!(removed.id, main.id);
        assert_eq!(tracks.list_tracks().unwrap(), vec![bgm.clone()]);
        assert!(store.index.track(&main.id).unwrap().is_none());
        assert!(store.index.track(&bgm.id).unwrap().is_some());

        // Name is free again once the track is gone.
        tracks.add_track(TrackKind::Text, Some("main")).unwrap();
        assert!(matches!(tracks.delete_track("ghost"), Err(DraftError::NotFound(_))));
        assert_eq!(tracks.delete_track(&bgm.id).unwrap().name.as_deref(), Some("bgm"));
    }

    #[test]
    fn test_resolve_for_segment() {
        let (_dir, store) = temp_store(None);
        let draft = store.create_draft("d", None, None, None).unwrap();
        let tracks = TrackBuilder::new(&store, &draft.id);

        assert!(matches!(
            tracks.resolve_for_segment(TrackKind::Video, None),
            Err(DraftError::NotFound(_))
        ));
        let video = tracks.add_track(TrackKind::Video, None).unwrap();
        tracks.add_track(TrackKind::Audio, Some("bgm")).unwrap();

        assert_eq!(tracks.resolve_for_segment(TrackKind::Video, None).unwrap(), video);
        assert!(matches!(
            tracks.resolve_for_segment(TrackKind::Video, Some("bgm")),
            Err(DraftError::TypeMismatch { .. })
        ));
        assert!(matches!(
            tracks.resolve_for_segment(TrackKind::Video, Some("nope")),
            Err(DraftError::NotFound(_))
        ));
    }
}
