use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path};
use std::process::Command as ProcessCommand;

use chrono::Utc;

pub(crate) fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn blake3_hex_prefix(bytes: &[u8], len: usize) -> String {
    let hex = blake3::hash(bytes).to_hex();
    hex.as_str()[..len.min(hex.len())].to_string()
}

pub(crate) fn is_extension_allowed(path: &Path, exts: &[&str]) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or("");
    exts.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed))
}

/// True when `name` is exactly one ordinary path component: no separators, NUL, `.` or `..`.
pub(crate) fn is_single_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut parts = Path::new(name).components();
    matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None))
}

/// Removes a leftover file or directory tree. Already gone counts as removed.
pub(crate) fn remove_leftover(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Join path components with `/` regardless of platform.
pub(crate) fn to_forward_slashes(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn build_external_command(program: &str, args: &[String]) -> ProcessCommand {
    let mut cmd = ProcessCommand::new(program);
    cmd.args(args);

    // Own process group so a timed-out probe can be killed without touching us.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_extension_allowed_ignores_case() {
        assert!(is_extension_allowed(Path::new("a/b/clip.MP4"), &["mp4", "mov"]));
        assert!(!is_extension_allowed(Path::new("clip"), &["mp4"]));
        assert!(!is_extension_allowed(Path::new("clip.txt"), &["mp4"]));
    }

    #[test]
    fn test_forward_slashes() {
        let p: PathBuf = ["material", "clip.mp4"].iter().collect();
        assert_eq!(to_forward_slashes(&p), "material/clip.mp4");
    }

    #[test]
    fn test_single_component() {
        assert!(is_single_component("Promo Cut"));
        assert!(is_single_component("v1.2"));
        for bad in ["", ".", "..", "a/b", "/home/x", "a\\b", "nul\0byte"] {
            assert!(!is_single_component(bad), "{bad:?}");
        }
    }

    #[test]
    fn test_remove_leftover() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4.part");
        fs::write(&file, b"x").unwrap();
        let tree = dir.path().join(".Promo.partial");
        fs::create_dir_all(tree.join("material")).unwrap();
        fs::write(tree.join("material/a.wav"), b"x").unwrap();

        remove_leftover(&file).unwrap();
        remove_leftover(&tree).unwrap();
        assert!(!file.exists() && !tree.exists());
        remove_leftover(&file).unwrap();
    }

    #[test]
    fn test_hex_prefix_is_stable() {
        let a = blake3_hex_prefix(b"https://x/y", 8);
        assert_eq!(a.len(), 8);
        assert_eq!(a, blake3_hex_prefix(b"https://x/y", 8));
    }
}
