//! Append-only JSON-lines journals, one file per draft and entity kind.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DraftResult;
use crate::timerange::TimeRange;
use crate::util::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum JournalKind {
    Track,
    Video,
    Audio,
    Text,
}

impl JournalKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }

    pub(crate) fn file_name(&self) -> &'static str {
        match self {
            Self::Track => "track.jsonl",
            Self::Video => "video.jsonl",
            Self::Audio => "audio.jsonl",
            Self::Text => "text.jsonl",
        }
    }
}

/// The payload half of a journal record.
pub(crate) trait JournalOp: Serialize + DeserializeOwned {
    const KIND: JournalKind;

    /// Operation tag as written to disk.
    fn tag(&self) -> &'static str;

    fn is_creation(&self) -> bool;

    /// On-track interval carried by creation records.
    fn target_range(&self) -> Option<TimeRange> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct OpRecord<Op> {
    pub(crate) entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) track_name: Option<String>,
    pub(crate) recorded_at: i64,
    pub(crate) op: Op,
}

impl<Op: JournalOp> OpRecord<Op> {
    pub(crate) fn new(entity_id: impl Into<String>, track_name: Option<String>, op: Op) -> Self {
        Self {
            entity_id: entity_id.into(),
            track_name,
            recorded_at: now_millis(),
            op,
        }
    }
}

pub(crate) fn journal_path(draft_dir: &Path, kind: JournalKind) -> PathBuf {
    draft_dir.join(kind.file_name())
}

pub(crate) fn append<Op: JournalOp>(draft_dir: &Path, record: &OpRecord<Op>) -> DraftResult<()> {
    fs::create_dir_all(draft_dir)?;
    let path = journal_path(draft_dir, Op::KIND);
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;
    if ends_mid_line(&mut file)? {
        warn!(path = %path.display(), "journal ends in a torn line; terminating it before append");
        file.write_all(b"\n")?;
    }
    file.write_all(line.as_bytes())?;
    debug!(
        kind = Op::KIND.as_str(),
        entity = %record.entity_id,
        op = record.op.tag(),
        "journal append"
    );
    Ok(())
}

/// Non-empty file whose last byte is not a newline, as left by an interrupted write.
fn ends_mid_line(file: &mut fs::File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// All records in file order. A missing journal is empty; malformed lines are skipped.
pub(crate) fn load<Op: JournalOp>(draft_dir: &Path) -> DraftResult<Vec<OpRecord<Op>>> {
    let path = journal_path(draft_dir, Op::KIND);
    let file = match fs::File::open(&path) {
        Ok(f) => f,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut records = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<OpRecord<Op>>(&line) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(path = %path.display(), line = lineno + 1, %err, "skipping malformed journal line");
            }
        }
    }
    Ok(records)
}

/// Replaces the whole journal through a temp file and rename.
pub(crate) fn rewrite<Op: JournalOp>(draft_dir: &Path, records: &[OpRecord<Op>]) -> DraftResult<()> {
    fs::create_dir_all(draft_dir)?;
    let path = journal_path(draft_dir, Op::KIND);
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        for record in records {
            writeln!(writer, "{}", serde_json::to_string(record)?)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, &path)?;
    Ok(())
}

/// Groups records by entity id, groups in first-appearance order, records in file order.
pub(crate) fn group_by_entity<Op>(records: Vec<OpRecord<Op>>) -> Vec<(String, Vec<OpRecord<Op>>)> {
    let mut groups: Vec<(String, Vec<OpRecord<Op>>)> = Vec::new();
    let mut positions: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for record in records {
        match positions.get(&record.entity_id) {
            Some(&pos) => groups[pos].1.push(record),
            None => {
                positions.insert(record.entity_id.clone(), groups.len());
                groups.push((record.entity_id.clone(), vec![record]));
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "operation", content = "params", rename_all = "snake_case")]
    enum NoteOp {
        Create { range: TimeRange },
        Touch { note: String },
    }

    impl JournalOp for NoteOp {
        const KIND: JournalKind = JournalKind::Text;

        fn tag(&self) -> &'static str {
            match self {
                Self::Create { .. } => "create",
                Self::Touch { .. } => "touch",
            }
        }

        fn is_creation(&self) -> bool {
            matches!(self, Self::Create { .. })
        }

        fn target_range(&self) -> Option<TimeRange> {
            match self {
                Self::Create { range } => Some(*range),
                _ => None,
            }
        }
    }

    #[test]
    fn test_append_and_load_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let range = TimeRange::new(0, 5_000_000);
        append(dir.path(), &OpRecord::new("a", Some("main".into()), NoteOp::Create { range })).unwrap();
        append(dir.path(), &OpRecord::new("a", None, NoteOp::Touch { note: "x".into() })).unwrap();

        let loaded: Vec<OpRecord<NoteOp>> = load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].op, NoteOp::Create { range });
        assert_eq!(loaded[0].track_name.as_deref(), Some("main"));
        assert!(loaded[1].track_name.is_none());

        let raw = fs::read_to_string(journal_path(dir.path(), JournalKind::Text)).unwrap();
        assert!(raw.lines().next().unwrap().contains("\"operation\":\"create\""));
    }

    #[test]
    fn test_missing_journal_is_empty_and_bad_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let empty: Vec<OpRecord<NoteOp>> = load(dir.path()).unwrap();
        assert!(empty.is_empty());

        append(dir.path(), &OpRecord::new("a", None, NoteOp::Touch { note: "ok".into() })).unwrap();
        let path = journal_path(dir.path(), JournalKind::Text);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{truncated").unwrap();
        let loaded: Vec<OpRecord<NoteOp>> = load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_append_after_torn_line_stays_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = journal_path(dir.path(), JournalKind::Text);
        fs::write(&path, r#"{"entity_id":"x","op":{"oper"#).unwrap();

        let range = TimeRange::new(0, 5_000_000);
        append(dir.path(), &OpRecord::new("a", Some("main".into()), NoteOp::Create { range })).unwrap();
        append(dir.path(), &OpRecord::new("a", None, NoteOp::Touch { note: "x".into() })).unwrap();

        let loaded: Vec<OpRecord<NoteOp>> = load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].op.target_range(), Some(range));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
    }

    #[test]
    fn test_rewrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        for id in ["a", "b", "c"] {
            append(dir.path(), &OpRecord::new(id, None, NoteOp::Touch { note: id.into() })).unwrap();
        }
        let mut records: Vec<OpRecord<NoteOp>> = load(dir.path()).unwrap();
        records.retain(|r| r.entity_id != "b");
        rewrite(dir.path(), &records).unwrap();

        let reloaded: Vec<OpRecord<NoteOp>> = load(dir.path()).unwrap();
        let ids: Vec<_> = reloaded.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_group_by_entity_first_appearance() {
        let touch = |id: &str| OpRecord::new(id, None, NoteOp::Touch { note: id.into() });
        let groups = group_by_entity(vec![touch("b"), touch("a"), touch("b"), touch("c"), touch("a")]);
        let order: Vec<_> = groups.iter().map(|(id, recs)| (id.as_str(), recs.len())).collect();
        assert_eq!(order, vec![("b", 2), ("a", 2), ("c", 1)]);
    }
}
