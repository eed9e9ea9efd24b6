//! Creation and mutation plumbing shared by the video, audio and text builders.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::draft::DraftStore;
use crate::error::{DraftError, DraftResult};
use crate::index::TrackMapping;
use crate::journal::{self, JournalOp, OpRecord};
use crate::localizer::{localize, verify_duration, LocalizedMaterial, MaterialKind};
use crate::overlap::check_overlap;
use crate::timerange::{parse_duration, TimeRange};
use crate::track::TrackBuilder;
use crate::types::{MutationStatus, SegmentClass, TrackKind};
use crate::util::remove_leftover;

/// Result of a creation call: the minted id plus the payload that was journaled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Created<P> {
    pub(crate) id: String,
    pub(crate) payload: P,
}

/// Per-builder state: target draft, default track and the last created id.
pub(crate) struct SegmentScope<'a> {
    pub(crate) store: &'a DraftStore,
    pub(crate) draft_id: String,
    pub(crate) track_name: Option<String>,
    pub(crate) current: Option<String>,
}

impl<'a> SegmentScope<'a> {
    pub(crate) fn new(store: &'a DraftStore, draft_id: impl Into<String>) -> Self {
        Self {
            store,
            draft_id: draft_id.into(),
            track_name: None,
            current: None,
        }
    }

    pub(crate) fn draft_dir(&self) -> PathBuf {
        self.store.draft_dir(&self.draft_id)
    }

    /// Resolves the track and runs the overlap check. Nothing is written.
    pub(crate) fn place<Op: JournalOp>(
        &self,
        kind: TrackKind,
        track_name: Option<&str>,
        target: &TimeRange,
    ) -> DraftResult<TrackMapping> {
        self.store.load_draft(&self.draft_id)?;
        let name = track_name.or(self.track_name.as_deref());
        let track = TrackBuilder::new(self.store, &self.draft_id).resolve_for_segment(kind, name)?;
        check_overlap::<Op>(&self.draft_dir(), track.name.as_deref(), target)?;
        Ok(track)
    }

    /// Localizes `source`; when `needed` is set the probed length must cover it.
    /// A copy that fails the check is removed again.
    pub(crate) fn localize_checked(
        &self,
        source: &str,
        kind: MaterialKind,
        needed: Option<i64>,
    ) -> DraftResult<LocalizedMaterial> {
        let material = localize(&self.store.settings, &self.draft_id, source, kind)?;
        if let Some(needed) = needed {
            let margin = self.store.settings.duration_margin_ms;
            if let Err(err) = verify_duration(self.store.probe.as_ref(), &material.absolute, needed, margin) {
                if let Err(cleanup) = remove_leftover(&material.absolute) {
                    warn!(path = %material.absolute.display(), %cleanup, "could not remove rejected material");
                }
                return Err(err);
            }
        }
        Ok(material)
    }

    /// Mints an id, appends the creation record and registers the id.
    pub(crate) fn commit<Op: JournalOp>(
        &mut self,
        track: &TrackMapping,
        classes: &[SegmentClass],
        op: Op,
    ) -> DraftResult<String> {
        if let Some(class) = classes.iter().find(|c| c.track_kind() != track.kind) {
            return Err(DraftError::TypeMismatch {
                track: track.name.clone().unwrap_or_else(|| track.id.clone()),
                expected: class.as_str().to_string(),
                actual: track.kind.to_string(),
            });
        }
        let id = Uuid::new_v4().to_string();
        let record = OpRecord::new(id.clone(), track.name.clone(), op);
        journal::append(&self.draft_dir(), &record)?;
        self.store
            .index
            .register_segment(&id, classes, &self.draft_id, Some(&track.id))?;
        info!(
            draft = %self.draft_id,
            segment = %id,
            track = ?track.name,
            op = record.op.tag(),
            "created segment"
        );
        self.current = Some(id.clone());
        Ok(id)
    }

    /// Id a mutation applies to: explicit, else the last created one.
    /// Must be indexed under `class` in this draft.
    pub(crate) fn mutation_target(
        &self,
        explicit: Option<&str>,
        class: SegmentClass,
    ) -> Result<String, MutationStatus> {
        let Some(id) = explicit.or(self.current.as_deref()) else {
            return Err(reject("no segment id given and nothing created yet"));
        };
        match self.store.index.segment(id, class) {
            Ok(Some(mapping)) if mapping.draft_id == self.draft_id => Ok(id.to_string()),
            Ok(Some(mapping)) => Err(reject(format!(
                "{} segment {id} belongs to draft {}",
                class.as_str(),
                mapping.draft_id
            ))),
            Ok(None) => Err(reject(format!("unknown {} segment {id}", class.as_str()))),
            Err(err) => Err(reject(format!("index lookup failed for {id}: {err}"))),
        }
    }

    pub(crate) fn mutate<Op: JournalOp>(&self, id: &str, op: Op) -> MutationStatus {
        let tag = op.tag();
        let record = OpRecord::new(id, None, op);
        match journal::append(&self.draft_dir(), &record) {
            Ok(()) => {
                info!(draft = %self.draft_id, segment = id, op = tag, "recorded mutation");
                MutationStatus::ok(format!("{tag} recorded for {id}"))
            }
            Err(err) => reject(format!("{tag} for {id} not recorded: {err}")),
        }
    }

    /// Earlier records for `id`, for checks that depend on what a segment already has.
    pub(crate) fn history<Op: JournalOp>(&self, id: &str) -> Vec<Op> {
        match journal::load::<Op>(&self.draft_dir()) {
            Ok(records) => records
                .into_iter()
                .filter(|r| r.entity_id == id)
                .map(|r| r.op)
                .collect(),
            Err(err) => {
                warn!(draft = %self.draft_id, %err, "could not read journal history");
                Vec::new()
            }
        }
    }
}

pub(crate) fn reject(message: impl Into<String>) -> MutationStatus {
    let message = message.into();
    warn!(%message, "mutation rejected");
    MutationStatus::failed(message)
}

pub(crate) fn check_bounds(name: &str, value: f64, lo: f64, hi: f64) -> Result<(), MutationStatus> {
    if value.is_finite() && (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(reject(format!("{name} must be within [{lo}, {hi}], got {value}")))
    }
}

pub(crate) fn check_non_empty(name: &str, value: &str) -> Result<(), MutationStatus> {
    if value.trim().is_empty() {
        Err(reject(format!("{name} must not be empty")))
    } else {
        Ok(())
    }
}

/// Parses an optional duration argument for a mutation.
pub(crate) fn optional_duration(name: &str, raw: Option<&str>) -> Result<Option<i64>, MutationStatus> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_duration(raw)
            .map(Some)
            .map_err(|err| reject(format!("{name}: {err}"))),
        None => Ok(None),
    }
}

/// Collapses a validation chain into the status the caller sees.
pub(crate) fn settle(result: Result<MutationStatus, MutationStatus>) -> MutationStatus {
    result.unwrap_or_else(|status| status)
}
