use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{DraftError, DraftResult};
use crate::index::IdIndex;
use crate::probe::{CommandProbe, DurationProbe};
use crate::types::{DraftMeta, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::util::{is_single_component, now_millis};

pub(crate) const DRAFT_FILE: &str = "draft.json";

/// Everything a builder or the exporter needs: paths, the shared index and the probe.
pub(crate) struct DraftStore {
    pub(crate) settings: Settings,
    pub(crate) index: IdIndex,
    pub(crate) probe: Box<dyn DurationProbe>,
}

impl DraftStore {
    pub(crate) fn open(settings: Settings) -> DraftResult<Self> {
        let probe = CommandProbe::from_command_line(
            &settings.probe_command,
            Duration::from_secs(settings.download_timeout_secs.max(1)),
        )?;
        Self::with_probe(settings, Box::new(probe))
    }

    pub(crate) fn with_probe(settings: Settings, probe: Box<dyn DurationProbe>) -> DraftResult<Self> {
        std::fs::create_dir_all(&settings.save_path)?;
        let index = IdIndex::open_or_create(&settings.index_path())?;
        Ok(Self {
            settings,
            index,
            probe,
        })
    }

    pub(crate) fn draft_dir(&self, draft_id: &str) -> PathBuf {
        self.settings.draft_dir(draft_id)
    }

    pub(crate) fn create_draft(
        &self,
        name: &str,
        width: Option<u32>,
        height: Option<u32>,
        fps: Option<u32>,
    ) -> DraftResult<DraftMeta> {
        let width = width.unwrap_or(DEFAULT_WIDTH);
        let height = height.unwrap_or(DEFAULT_HEIGHT);
        let fps = fps.unwrap_or(DEFAULT_FPS);
        if width == 0 || height == 0 {
            return Err(DraftError::Range(format!("canvas must be non-empty, got {width}x{height}")));
        }
        if fps == 0 {
            return Err(DraftError::Range("fps must be positive".into()));
        }
        let name = name.trim();
        if !name.is_empty() && !is_single_component(name) {
            return Err(DraftError::Format(format!(
                "draft name must be usable as a folder name, got '{name}'"
            )));
        }

        let meta = DraftMeta {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            width,
            height,
            fps,
            created_at: now_millis(),
        };
        let dir = self.draft_dir(&meta.id);
        std::fs::create_dir_all(&dir)?;
        write_draft_file(&dir, &meta)?;
        self.index.upsert_draft(&meta)?;
        info!(draft = %meta.id, name = %meta.name, width, height, fps, "created draft");
        Ok(meta)
    }

    /// `draft.json` first, the index as fallback.
    pub(crate) fn load_draft(&self, draft_id: &str) -> DraftResult<DraftMeta> {
        let path = self.draft_dir(draft_id).join(DRAFT_FILE);
        if let Ok(data) = std::fs::read_to_string(&path) {
            return Ok(serde_json::from_str(&data)?);
        }
        self.index
            .draft(draft_id)?
            .ok_or_else(|| DraftError::NotFound(format!("draft '{draft_id}'")))
    }
}

fn write_draft_file(dir: &Path, meta: &DraftMeta) -> DraftResult<()> {
    let path = dir.join(DRAFT_FILE);
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(meta)?)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::probe::FixedProbe;

    /// Store rooted in a temp dir with a probe that reports `probe_secs` for every file.
    pub(crate) fn temp_store(probe_secs: Option<i64>) -> (tempfile::TempDir, DraftStore) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            save_path: dir.path().join("save"),
            output_path: dir.path().join("output"),
            ..Settings::default()
        };
        let probe = FixedProbe(probe_secs.map(|s| s * 1_000_000));
        let store = DraftStore::with_probe(settings, Box::new(probe)).unwrap();
        (dir, store)
    }

    /// Writes a small fake media file outside the save root.
    pub(crate) fn media_file(dir: &tempfile::TempDir, name: &str) -> String {
        let src = dir.path().join("media");
        std::fs::create_dir_all(&src).unwrap();
        let path = src.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::temp_store;
    use super::*;

    #[test]
    fn test_create_draft_defaults_and_reload() {
        let (_dir, store) = temp_store(None);
        let meta = store.create_draft("", None, None, None).unwrap();
        assert_eq!((meta.width, meta.height, meta.fps), (1920, 1080, 30));
        assert_eq!(meta.artifact_name(), format!("Draft_{}", meta.id));
        assert!(store.draft_dir(&meta.id).join(DRAFT_FILE).is_file());
        assert_eq!(store.load_draft(&meta.id).unwrap(), meta);
        assert_eq!(store.index.draft(&meta.id).unwrap(), Some(meta));
    }

    #[test]
    fn test_load_draft_falls_back_to_index() {
        let (_dir, store) = temp_store(None);
        let meta = store.create_draft("Promo", Some(1080), Some(1920), Some(60)).unwrap();
        std::fs::remove_file(store.draft_dir(&meta.id).join(DRAFT_FILE)).unwrap();
        assert_eq!(store.load_draft(&meta.id).unwrap().name, "Promo");
        assert!(matches!(store.load_draft("missing"), Err(DraftError::NotFound(_))));
    }

    #[test]
    fn test_rejects_names_that_escape_the_output_dir() {
        let (_dir, store) = temp_store(None);
        for name in ["..", ".", "/home/x", "a/b", "a\\b", "nul\0"] {
            assert!(
                matches!(store.create_draft(name, None, None, None), Err(DraftError::Format(_))),
                "{name:?}"
            );
        }
        assert!(store.index.draft_ids().unwrap().is_empty());
        assert_eq!(store.create_draft("  Cut v2 ", None, None, None).unwrap().name, "Cut v2");
    }

    #[test]
    fn test_rejects_empty_canvas() {
        let (_dir, store) = temp_store(None);
        assert!(matches!(
            store.create_draft("x", Some(0), None, None),
            Err(DraftError::Range(_))
        ));
        assert!(matches!(
            store.create_draft("x", None, None, Some(0)),
            Err(DraftError::Range(_))
        ));
    }
}
