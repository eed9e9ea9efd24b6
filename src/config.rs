use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DraftResult;
use crate::util::env_optional;

pub(crate) const DEFAULT_SAVE_DIR: &str = "./draftvault";
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "./draftvault/output";
pub(crate) const SAVE_PATH_ENV: &str = "DRAFTVAULT_SAVE_PATH";
pub(crate) const OUTPUT_PATH_ENV: &str = "DRAFTVAULT_OUTPUT_PATH";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub(crate) struct Settings {
    /// Root holding per-draft journals, materials and the ID index.
    pub(crate) save_path: PathBuf,
    /// Directory compiled artifacts are written into.
    pub(crate) output_path: PathBuf,
    /// Command used to probe media durations. Split with shell rules.
    pub(crate) probe_command: String,
    /// Subtracted from every probed duration before the requested-duration check.
    pub(crate) duration_margin_ms: u64,
    pub(crate) download_timeout_secs: u64,
    pub(crate) max_rename_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from(DEFAULT_SAVE_DIR),
            output_path: PathBuf::from(DEFAULT_OUTPUT_DIR),
            probe_command: "ffprobe".to_string(),
            duration_margin_ms: 200,
            download_timeout_secs: 30,
            max_rename_attempts: 1000,
        }
    }
}

impl Settings {
    pub(crate) fn index_path(&self) -> PathBuf {
        self.save_path.join("index.sqlite")
    }

    pub(crate) fn draft_dir(&self, draft_id: &str) -> PathBuf {
        self.save_path.join(draft_id)
    }
}

pub(crate) fn config_file_path(save_root: &Path) -> PathBuf {
    save_root.join("config.json")
}

/// Missing or unreadable config falls back to defaults.
pub(crate) fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "ignoring invalid config file");
            Settings::default()
        }),
        Err(_) => Settings::default(),
    }
}

pub(crate) fn save_settings(path: &Path, settings: &Settings) -> DraftResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Precedence: CLI flag, then environment, then `config.json` under the save root.
pub(crate) fn resolve_settings(cli_root: Option<PathBuf>, cli_output: Option<PathBuf>) -> Settings {
    let root = cli_root
        .or_else(|| env_optional(SAVE_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_DIR));

    let mut settings = load_settings(&config_file_path(&root));
    settings.save_path = root;
    if let Some(output) = cli_output.or_else(|| env_optional(OUTPUT_PATH_ENV).map(PathBuf::from)) {
        settings.output_path = output;
    }
    settings
}
