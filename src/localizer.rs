//! Makes every referenced material draft-local.
//!
//! Files land in `<save_root>/<draft>/material/` and journals only ever see the
//! draft-relative path, so a draft folder can be moved without breaking replay.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::error::{DraftError, DraftResult};
use crate::probe::{usable_duration, DurationProbe};
use crate::timerange::format_micros;
use crate::util::{blake3_hex_prefix, is_extension_allowed, remove_leftover, to_forward_slashes};

pub(crate) const MATERIAL_DIR: &str = "material";

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "m4a", "flac", "ogg", "wma"];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v", "mpg", "mpeg",
];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MaterialKind {
    Video,
    Image,
    Audio,
}

impl MaterialKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }

    /// Kind whose allow-list contains the extension of `path`.
    pub(crate) fn from_path(path: &Path) -> Option<Self> {
        [Self::Video, Self::Image, Self::Audio]
            .into_iter()
            .find(|kind| is_extension_allowed(path, kind.allowed_extensions()))
    }

    fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Video => VIDEO_EXTENSIONS,
            Self::Image => IMAGE_EXTENSIONS,
            Self::Audio => AUDIO_EXTENSIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalizedMaterial {
    /// `material/<file>`, forward slashes, relative to the draft root.
    pub(crate) relative: String,
    pub(crate) absolute: PathBuf,
}

pub(crate) fn material_dir(draft_dir: &Path) -> PathBuf {
    draft_dir.join(MATERIAL_DIR)
}

/// An http(s) locator with a host, or `None` for anything that should be treated as a path.
pub(crate) fn remote_url(source: &str) -> Option<Url> {
    let url = Url::parse(source).ok()?;
    let remote = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
    remote.then_some(url)
}

/// Last non-empty path segment, percent-decoded.
pub(crate) fn url_file_name(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(segment).ok()?.into_owned();
    let name = Path::new(&decoded).file_name()?.to_str()?.to_string();
    (!name.is_empty()).then_some(name)
}

pub(crate) fn localize(
    settings: &Settings,
    draft_id: &str,
    source: &str,
    kind: MaterialKind,
) -> DraftResult<LocalizedMaterial> {
    let draft_dir = settings.draft_dir(draft_id);
    let dir = material_dir(&draft_dir);
    fs::create_dir_all(&dir)?;

    let localized = match remote_url(source) {
        Some(url) => {
            let name = url_file_name(&url);
            if let Some(name) = &name {
                check_extension(Path::new(name), kind)?;
            }
            let name = name.unwrap_or_else(|| {
                format!("material_{}.tmp", blake3_hex_prefix(source.as_bytes(), 8))
            });
            let (target, file) = reserve_target(&dir, &name, settings.max_rename_attempts)?;
            let timeout = Duration::from_secs(settings.download_timeout_secs);
            if let Err(err) = download(&url, file, timeout) {
                if let Err(cleanup) = remove_leftover(&target) {
                    warn!(path = %target.display(), %cleanup, "could not remove partial material");
                }
                return Err(err);
            }
            target
        }
        None => {
            let path = Path::new(source);
            if !path.is_file() {
                return Err(DraftError::NotFound(format!("material file '{source}'")));
            }
            check_extension(path, kind)?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| DraftError::Format(format!("material path has no file name: '{source}'")))?;
            let (target, file) = reserve_target(&dir, name, settings.max_rename_attempts)?;
            if let Err(err) = copy_into(path, file) {
                if let Err(cleanup) = remove_leftover(&target) {
                    warn!(path = %target.display(), %cleanup, "could not remove partial material");
                }
                return Err(err);
            }
            target
        }
    };

    let relative = localized
        .strip_prefix(&draft_dir)
        .map(to_forward_slashes)
        .map_err(|_| DraftError::Format(format!("material escaped draft dir: {}", localized.display())))?;
    info!(draft = draft_id, source, stored = %relative, kind = kind.as_str(), "localized material");
    Ok(LocalizedMaterial {
        relative,
        absolute: localized,
    })
}

/// Rejects placements asking for more time than the localized file provides.
/// Unprobeable files pass.
pub(crate) fn verify_duration(
    probe: &dyn DurationProbe,
    path: &Path,
    requested: i64,
    margin_ms: u64,
) -> DraftResult<()> {
    let Some(available) = usable_duration(probe, path, margin_ms) else {
        return Ok(());
    };
    if available < requested {
        return Err(DraftError::Duration {
            requested: format_micros(requested),
            available: format_micros(available.max(0)),
        });
    }
    Ok(())
}

fn check_extension(path: &Path, kind: MaterialKind) -> DraftResult<()> {
    if is_extension_allowed(path, kind.allowed_extensions()) {
        return Ok(());
    }
    Err(DraftError::Format(format!(
        "'{}' is not a supported {} file (allowed: {})",
        path.display(),
        kind.as_str(),
        kind.allowed_extensions().join(", ")
    )))
}

/// Creates `name`, or `stem_1.ext`, `stem_2.ext`, ... with `create_new`
/// so an existing file is never truncated.
fn reserve_target(dir: &Path, name: &str, max_attempts: u32) -> DraftResult<(PathBuf, File)> {
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("material");
    let ext = as_path.extension().and_then(|e| e.to_str());

    for attempt in 0..=max_attempts {
        let candidate = match (attempt, ext) {
            (0, _) => name.to_string(),
            (n, Some(ext)) => format!("{stem}_{n}.{ext}"),
            (n, None) => format!("{stem}_{n}"),
        };
        let path = dir.join(&candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    warn!(dir = %dir.display(), name, max_attempts, "no free material file name");
    Err(DraftError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for '{name}' after {max_attempts} attempts"),
    )))
}

fn copy_into(source: &Path, target: File) -> DraftResult<()> {
    let mut reader = File::open(source)?;
    let mut writer = BufWriter::new(target);
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn download(url: &Url, target: File, timeout: Duration) -> DraftResult<()> {
    let client = Client::builder()
        .user_agent("draftvault")
        .timeout(timeout)
        .build()?;
    let mut response = client.get(url.as_str()).send()?.error_for_status()?;
    let mut writer = BufWriter::new(target);
    let bytes = io::copy(&mut response, &mut writer)?;
    writer.flush()?;
    info!(url = %url, bytes, "downloaded material");
    Ok(())
}
