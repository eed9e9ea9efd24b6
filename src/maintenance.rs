use serde::Serialize;
use tracing::info;

use crate::draft::{DraftStore, DRAFT_FILE};
use crate::error::DraftResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct PruneReport {
    pub(crate) checked: usize,
    pub(crate) removed_drafts: Vec<String>,
    /// Tracks registered under the stale drafts.
    pub(crate) stale_tracks: usize,
    pub(crate) removed_rows: usize,
}

/// Drops index rows for drafts whose folder no longer holds a `draft.json`.
pub(crate) fn prune_index(store: &DraftStore, dry_run: bool) -> DraftResult<PruneReport> {
    let mut report = PruneReport::default();
    for id in store.index.draft_ids()? {
        report.checked += 1;
        if store.draft_dir(&id).join(DRAFT_FILE).is_file() {
            continue;
        }
        report.stale_tracks += store.index.tracks_for_draft(&id)?.len();
        if !dry_run {
            report.removed_rows += store.index.remove_draft(&id)?;
        }
        report.removed_drafts.push(id);
    }
    info!(
        checked = report.checked,
        stale = report.removed_drafts.len(),
        dry_run,
        "pruned index"
    );
    Ok(report)
}
