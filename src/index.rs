//! SQLite-backed ID index spanning every draft under one save root.
//!
//! Derived data only: journals stay the source of truth for timing and payload.
//! The index answers "which draft/track does this id belong to" without
//! re-reading journals.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use crate::error::{DraftError, DraftResult};
use crate::types::{DraftMeta, SegmentClass, TrackKind};

// ── Mappings ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct TrackMapping {
    pub(crate) id: String,
    pub(crate) draft_id: String,
    pub(crate) kind: TrackKind,
    pub(crate) name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SegmentMapping {
    pub(crate) id: String,
    pub(crate) class: SegmentClass,
    pub(crate) draft_id: String,
    pub(crate) track_id: Option<String>,
}

// ── Schema SQL ───────────────────────────────────────────────────────────

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS drafts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    fps INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tracks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    draft_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    name TEXT
);

CREATE INDEX IF NOT EXISTS idx_tracks_draft ON tracks(draft_id);

CREATE TABLE IF NOT EXISTS segments (
    id TEXT NOT NULL,
    class TEXT NOT NULL,
    draft_id TEXT NOT NULL,
    track_id TEXT,
    PRIMARY KEY (id, class)
);

CREATE INDEX IF NOT EXISTS idx_segments_draft ON segments(draft_id);
";

pub(crate) struct IdIndex {
    conn: Connection,
}

// ── Core implementation ──────────────────────────────────────────────────

impl IdIndex {
    pub(crate) fn open_or_create(path: &Path) -> DraftResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let index = Self { conn };
        index.apply_pragmas()?;
        index.conn.execute_batch(SCHEMA_SQL)?;
        Ok(index)
    }

    fn apply_pragmas(&self) -> DraftResult<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    // ── Drafts ──

    pub(crate) fn upsert_draft(&self, draft: &DraftMeta) -> DraftResult<()> {
        self.conn.execute(
            "INSERT INTO drafts (id, name, width, height, fps, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, width = excluded.width,
                height = excluded.height, fps = excluded.fps",
            params![draft.id, draft.name, draft.width, draft.height, draft.fps, draft.created_at],
        )?;
        Ok(())
    }

    pub(crate) fn draft(&self, id: &str) -> DraftResult<Option<DraftMeta>> {
        let draft = self
            .conn
            .query_row(
                "SELECT id, name, width, height, fps, created_at FROM drafts WHERE id = ?1",
                params![id],
                |row| {
                    Ok(DraftMeta {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        width: row.get(2)?,
                        height: row.get(3)?,
                        fps: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(draft)
    }

    pub(crate) fn draft_ids(&self) -> DraftResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM drafts ORDER BY created_at, id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Drops the draft and every track and segment row that belongs to it.
    pub(crate) fn remove_draft(&self, id: &str) -> DraftResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut removed = tx.execute("DELETE FROM segments WHERE draft_id = ?1", params![id])?;
        removed += tx.execute("DELETE FROM tracks WHERE draft_id = ?1", params![id])?;
        removed += tx.execute("DELETE FROM drafts WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed)
    }

    // ── Tracks ──

    pub(crate) fn upsert_track(&self, track: &TrackMapping) -> DraftResult<()> {
        self.conn.execute(
            "INSERT INTO tracks (id, draft_id, kind, name) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                draft_id = excluded.draft_id, kind = excluded.kind, name = excluded.name",
            params![track.id, track.draft_id, track.kind.as_str(), track.name],
        )?;
        Ok(())
    }

    pub(crate) fn track(&self, id: &str) -> DraftResult<Option<TrackMapping>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, draft_id, kind, name FROM tracks WHERE id = ?1",
                params![id],
                track_from_row,
            )
            .optional()?;
        row.transpose()
    }

    /// Tracks of one draft in creation order.
    pub(crate) fn tracks_for_draft(&self, draft_id: &str) -> DraftResult<Vec<TrackMapping>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, draft_id, kind, name FROM tracks WHERE draft_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![draft_id], track_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    pub(crate) fn remove_track(&self, id: &str) -> DraftResult<bool> {
        let removed = self.conn.execute("DELETE FROM tracks WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Drops every segment row registered on the track. Returns rows removed.
    pub(crate) fn remove_track_segments(&self, track_id: &str) -> DraftResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM segments WHERE track_id = ?1", params![track_id])?;
        Ok(removed)
    }

    // ── Segments ──

    /// Registers one id under several classes atomically.
    pub(crate) fn register_segment(
        &self,
        id: &str,
        classes: &[SegmentClass],
        draft_id: &str,
        track_id: Option<&str>,
    ) -> DraftResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for class in classes {
            tx.execute(
                "INSERT INTO segments (id, class, draft_id, track_id) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id, class) DO UPDATE SET
                    draft_id = excluded.draft_id, track_id = excluded.track_id",
                params![id, class.as_str(), draft_id, track_id],
            )?;
        }
        tx.commit()?;
        debug!(segment = id, draft = draft_id, ?classes, "registered segment");
        Ok(())
    }

    pub(crate) fn segment(&self, id: &str, class: SegmentClass) -> DraftResult<Option<SegmentMapping>> {
        let mapping = self
            .conn
            .query_row(
                "SELECT id, draft_id, track_id FROM segments WHERE id = ?1 AND class = ?2",
                params![id, class.as_str()],
                |row| {
                    Ok(SegmentMapping {
                        id: row.get(0)?,
                        class,
                        draft_id: row.get(1)?,
                        track_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(mapping)
    }

    /// segment → track id → track record → name.
    pub(crate) fn segment_track_name(&self, id: &str, class: SegmentClass) -> DraftResult<Option<String>> {
        let Some(segment) = self.segment(id, class)? else {
            return Ok(None);
        };
        let Some(track_id) = segment.track_id else {
            return Ok(None);
        };
        Ok(self.track(&track_id)?.and_then(|t| t.name))
    }

    /// segment → draft id → draft record.
    pub(crate) fn segment_draft(&self, id: &str, class: SegmentClass) -> DraftResult<Option<DraftMeta>> {
        match self.segment(id, class)? {
            Some(segment) => self.draft(&segment.draft_id),
            None => Ok(None),
        }
    }
}

fn track_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DraftResult<TrackMapping>> {
    let kind: String = row.get(2)?;
    let id: String = row.get(0)?;
    let draft_id: String = row.get(1)?;
    let name: Option<String> = row.get(3)?;
    Ok(TrackKind::parse(&kind)
        .map_err(|_| DraftError::Format(format!("track {id} has unknown kind '{kind}' in index")))
        .map(|kind| TrackMapping {
            id,
            draft_id,
            kind,
            name,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: &str) -> DraftMeta {
        DraftMeta {
            id: id.into(),
            name: format!("draft {id}"),
            width: 1920,
            height: 1080,
            fps: 30,
            created_at: 1,
        }
    }

    fn open_temp() -> (tempfile::TempDir, IdIndex) {
        let dir = tempfile::tempdir().unwrap();
        let index = IdIndex::open_or_create(&dir.path().join("nested").join("index.sqlite")).unwrap();
        (dir, index)
    }

    #[test]
    fn test_draft_upsert_and_lookup() {
        let (_dir, index) = open_temp();
        assert!(index.draft("d1").unwrap().is_none());
        index.upsert_draft(&draft("d1")).unwrap();
        index.upsert_draft(&draft("d1")).unwrap();
        assert_eq!(index.draft("d1").unwrap(), Some(draft("d1")));
        assert_eq!(index.draft_ids().unwrap(), vec!["d1".to_string()]);
    }

    #[test]
    fn test_tracks_keep_creation_order() {
        let (_dir, index) = open_temp();
        for (id, kind, name) in [
            ("t2", TrackKind::Audio, None),
            ("t1", TrackKind::Video, Some("main")),
        ] {
            index
                .upsert_track(&TrackMapping {
                    id: id.into(),
                    draft_id: "d1".into(),
                    kind,
                    name: name.map(String::from),
                })
                .unwrap();
        }
        let ids: Vec<_> = index
            .tracks_for_draft("d1")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["t2", "t1"]);
        assert!(index.remove_track("t2").unwrap());
        assert!(!index.remove_track("t2").unwrap());
        assert_eq!(index.tracks_for_draft("d1").unwrap().len(), 1);
    }

    #[test]
    fn test_image_registered_under_both_classes() {
        let (_dir, index) = open_temp();
        index.upsert_draft(&draft("d1")).unwrap();
        index
            .upsert_track(&TrackMapping {
                id: "t1".into(),
                draft_id: "d1".into(),
                kind: TrackKind::Video,
                name: Some("main".into()),
            })
            .unwrap();
        index
            .register_segment("s1", &[SegmentClass::Image, SegmentClass::Video], "d1", Some("t1"))
            .unwrap();

        assert!(index.segment("s1", SegmentClass::Image).unwrap().is_some());
        assert!(index.segment("s1", SegmentClass::Video).unwrap().is_some());
        assert!(index.segment("s1", SegmentClass::Audio).unwrap().is_none());
        assert_eq!(
            index.segment_track_name("s1", SegmentClass::Video).unwrap().as_deref(),
            Some("main")
        );
        assert_eq!(index.segment_draft("s1", SegmentClass::Image).unwrap().map(|d| d.id), Some("d1".into()));

        index.register_segment("s2", &[SegmentClass::Video], "d1", Some("t9")).unwrap();
        assert_eq!(index.remove_track_segments("t1").unwrap(), 2);
        assert!(index.segment("s1", SegmentClass::Video).unwrap().is_none());
        assert!(index.segment("s2", SegmentClass::Video).unwrap().is_some());
    }

    #[test]
    fn test_remove_draft_cascades() {
        let (_dir, index) = open_temp();
        index.upsert_draft(&draft("d1")).unwrap();
        index.upsert_draft(&draft("d2")).unwrap();
        index
            .upsert_track(&TrackMapping {
                id: "t1".into(),
                draft_id: "d1".into(),
                kind: TrackKind::Text,
                name: None,
            })
            .unwrap();
        index.register_segment("s1", &[SegmentClass::Text], "d1", Some("t1")).unwrap();

        assert_eq!(index.remove_draft("d1").unwrap(), 3);
        assert!(index.draft("d1").unwrap().is_none());
        assert!(index.segment("s1", SegmentClass::Text).unwrap().is_none());
        assert_eq!(index.draft_ids().unwrap(), vec!["d2".to_string()]);
    }
}
