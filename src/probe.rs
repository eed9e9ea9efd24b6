//! Media duration probing.

use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{DraftError, DraftResult};
use crate::timerange::parse_duration;
use crate::util::build_external_command;

const PROBE_POLL_MS: u64 = 10;
const PROBE_ARGS: [&str; 6] = [
    "-v",
    "error",
    "-show_entries",
    "format=duration",
    "-of",
    "default=nw=1:nk=1",
];

pub(crate) trait DurationProbe {
    /// Duration of the media at `path`, in microseconds.
    fn probe(&self, path: &Path) -> DraftResult<i64>;
}

/// Runs an ffprobe-compatible command and parses the single duration line it prints.
pub(crate) struct CommandProbe {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
}

impl CommandProbe {
    pub(crate) fn from_command_line(command: &str, timeout: Duration) -> DraftResult<Self> {
        let parts = shlex::split(command)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| DraftError::Format(format!("invalid probe command: '{command}'")))?;
        let mut parts = parts.into_iter();
        let program = parts.next().unwrap_or_default();
        Ok(Self {
            program,
            base_args: parts.collect(),
            timeout,
        })
    }

    fn run(&self, path: &Path) -> DraftResult<String> {
        let mut args = self.base_args.clone();
        args.extend(PROBE_ARGS.iter().map(|s| s.to_string()));
        args.push(path.to_string_lossy().into_owned());

        let mut cmd = build_external_command(&self.program, &args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = cmd.spawn()?;

        let start = Instant::now();
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if start.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(DraftError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("probe timed out after {}ms", self.timeout.as_millis()),
                    )));
                }
                None => thread::sleep(Duration::from_millis(PROBE_POLL_MS)),
            }
        };

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)?;
        }
        if !status.success() {
            return Err(DraftError::Io(std::io::Error::other(format!(
                "probe exited with {status}"
            ))));
        }
        Ok(stdout)
    }
}

impl DurationProbe for CommandProbe {
    fn probe(&self, path: &Path) -> DraftResult<i64> {
        let raw = self.run(path)?;
        let micros = parse_probe_output(&raw)?;
        debug!(path = %path.display(), micros, "probed media duration");
        Ok(micros)
    }
}

/// ffprobe prints seconds as a bare decimal, e.g. `5.034000`.
pub(crate) fn parse_probe_output(raw: &str) -> DraftResult<i64> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| DraftError::Format("probe returned no duration".into()))?;
    parse_duration(&format!("{line}s"))
}

/// Probed duration with the safety margin removed, or `None` when the file cannot be probed.
pub(crate) fn usable_duration(probe: &dyn DurationProbe, path: &Path, margin_ms: u64) -> Option<i64> {
    match probe.probe(path) {
        Ok(micros) => Some(micros - margin_ms as i64 * 1_000),
        Err(err) => {
            debug!(path = %path.display(), %err, "duration probe failed, skipping check");
            None
        }
    }
}

#[cfg(test)]
pub(crate) struct FixedProbe(pub(crate) Option<i64>);

#[cfg(test)]
impl DurationProbe for FixedProbe {
    fn probe(&self, _path: &Path) -> DraftResult<i64> {
        self.0
            .ok_or_else(|| DraftError::NotFound("no duration".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        assert_eq!(parse_probe_output("5.034000\n").unwrap(), 5_034_000);
        assert_eq!(parse_probe_output("\n  12\n").unwrap(), 12_000_000);
        assert!(parse_probe_output("N/A").is_err());
        assert!(parse_probe_output("").is_err());
    }

    #[test]
    fn test_usable_duration_subtracts_margin() {
        let probe = FixedProbe(Some(10_000_000));
        assert_eq!(usable_duration(&probe, Path::new("x.mp4"), 200), Some(9_800_000));
        assert_eq!(usable_duration(&FixedProbe(None), Path::new("x.mp4"), 200), None);
    }

    #[test]
    fn test_command_line_split() {
        let probe = CommandProbe::from_command_line("\"/opt/ff probe\" -hide_banner", Duration::from_secs(1)).unwrap();
        assert_eq!(probe.program, "/opt/ff probe");
        assert_eq!(probe.base_args, vec!["-hide_banner".to_string()]);
        assert!(CommandProbe::from_command_line("", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let probe = CommandProbe::from_command_line("definitely-not-a-real-probe-binary", Duration::from_secs(1)).unwrap();
        assert!(probe.probe(Path::new("clip.mp4")).is_err());
    }
}
