//! Time strings and half-open microsecond intervals.
//!
//! Every timing value that reaches a journal has already been parsed into
//! integer microseconds, so overlap checks and replay never touch floats.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DraftError, DraftResult};

pub(crate) const MICROS_PER_SECOND: i64 = 1_000_000;

fn unit_micros(unit: &str) -> Option<i64> {
    match unit {
        "h" => Some(3_600 * MICROS_PER_SECOND),
        "m" => Some(60 * MICROS_PER_SECOND),
        "s" => Some(MICROS_PER_SECOND),
        "ms" => Some(1_000),
        "us" => Some(1),
        _ => None,
    }
}

/// Parse a duration such as `"1.5s"`, `"500ms"` or `"1m30s"` into microseconds.
///
/// Each numeric part must carry a unit. Decimal fractions are applied exactly;
/// anything below one microsecond is truncated.
pub(crate) fn parse_duration(raw: &str) -> DraftResult<i64> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DraftError::Format("empty time string".into()));
    }

    let mut total: i64 = 0;
    let mut rest = text;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(DraftError::Format(format!("expected a number in '{raw}'")));
        }
        let (number, tail) = rest.split_at(num_len);
        let unit_len = tail
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(tail.len());
        if unit_len == 0 {
            return Err(DraftError::Format(format!("missing time unit in '{raw}'")));
        }
        let (unit, tail) = tail.split_at(unit_len);
        let scale = unit_micros(unit)
            .ok_or_else(|| DraftError::Format(format!("unknown time unit '{unit}' in '{raw}'")))?;
        total = total
            .checked_add(scale_decimal(number, scale, raw)?)
            .ok_or_else(|| DraftError::Format(format!("time value too large: '{raw}'")))?;
        rest = tail;
    }
    Ok(total)
}

fn scale_decimal(number: &str, scale: i64, raw: &str) -> DraftResult<i64> {
    let bad = || DraftError::Format(format!("invalid number '{number}' in '{raw}'"));
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
        return Err(bad());
    }
    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| bad())?
    };
    let mut micros = whole.checked_mul(scale).ok_or_else(bad)?;
    if !frac_part.is_empty() {
        let digits: i128 = frac_part.parse().map_err(|_| bad())?;
        let denom = 10i128
            .checked_pow(frac_part.len() as u32)
            .ok_or_else(bad)?;
        micros += (digits * scale as i128 / denom) as i64;
    }
    Ok(micros)
}

/// Render microseconds as seconds without trailing zeros (`5s`, `1.25s`).
pub(crate) fn format_micros(us: i64) -> String {
    let sign = if us < 0 { "-" } else { "" };
    let abs = us.unsigned_abs();
    let secs = abs / MICROS_PER_SECOND as u64;
    let frac = abs % MICROS_PER_SECOND as u64;
    if frac == 0 {
        format!("{sign}{secs}s")
    } else {
        let frac = format!("{frac:06}");
        format!("{sign}{secs}.{}s", frac.trim_end_matches('0'))
    }
}

/// Half-open interval `[start, start + duration)` in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub(crate) struct TimeRange {
    pub(crate) start: i64,
    pub(crate) duration: i64,
}

impl TimeRange {
    pub(crate) fn new(start: i64, duration: i64) -> Self {
        Self { start, duration }
    }

    pub(crate) fn end(&self) -> i64 {
        self.start + self.duration
    }

    /// `NOT(self.end <= other.start OR self.start >= other.end)`.
    pub(crate) fn overlaps(&self, other: &TimeRange) -> bool {
        !(self.end() <= other.start || self.start >= other.end())
    }

    /// Parse `"<start>-<end>"`, e.g. `"1s-4.2s"`. The end must exceed the start.
    pub(crate) fn parse_start_end(raw: &str) -> DraftResult<Self> {
        let (start_str, end_str) = split_pair(raw)?;
        let start = parse_duration(start_str)?;
        let end = parse_duration(end_str)?;
        if end <= start {
            return Err(DraftError::Format(format!(
                "end time must be greater than start time: '{raw}'"
            )));
        }
        Ok(Self::new(start, end - start))
    }

    /// Wire form in start-duration notation.
    pub(crate) fn to_start_duration(&self) -> String {
        format!("{}-{}", format_micros(self.start), format_micros(self.duration))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_micros(self.start), format_micros(self.end()))
    }
}

/// Consistent target/source/speed triple for a media placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct Timing {
    pub(crate) target: TimeRange,
    pub(crate) source: TimeRange,
    pub(crate) speed: f64,
}

/// Fills in whichever of source and speed is missing.
///
/// With both given, the on-track duration becomes `source / speed` and the
/// requested target duration is overridden.
pub(crate) fn resolve_timing(
    target: TimeRange,
    source: Option<TimeRange>,
    speed: Option<f64>,
) -> DraftResult<Timing> {
    if let Some(speed) = speed {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(DraftError::Range(format!("speed must be positive, got {speed}")));
        }
    }
    let timing = match (source, speed) {
        (Some(source), Some(speed)) => Timing {
            target: TimeRange::new(target.start, (source.duration as f64 / speed).round() as i64),
            source,
            speed,
        },
        (Some(source), None) => Timing {
            target,
            source,
            speed: source.duration as f64 / target.duration as f64,
        },
        (None, speed) => {
            let speed = speed.unwrap_or(1.0);
            Timing {
                target,
                source: TimeRange::new(0, (target.duration as f64 * speed).round() as i64),
                speed,
            }
        }
    };
    if timing.target.duration <= 0 {
        return Err(DraftError::Range(format!(
            "placement collapses to zero length at speed {}",
            timing.speed
        )));
    }
    Ok(timing)
}

fn split_pair(raw: &str) -> DraftResult<(&str, &str)> {
    let (left, right) = raw
        .split_once('-')
        .ok_or_else(|| DraftError::Format(format!("invalid time range '{raw}': missing '-'")))?;
    Ok((left.trim(), right.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("5s").unwrap(), 5_000_000);
        assert_eq!(parse_duration("1.5s").unwrap(), 1_500_000);
        assert_eq!(parse_duration("500ms").unwrap(), 500_000);
        assert_eq!(parse_duration("250us").unwrap(), 250);
        assert_eq!(parse_duration("1m30s").unwrap(), 90_000_000);
        assert_eq!(parse_duration("1h").unwrap(), 3_600_000_000);
        assert_eq!(parse_duration(".5s").unwrap(), 500_000);
    }

    #[test]
    fn test_parse_duration_is_exact() {
        // 0.1 + 0.2 style drift never shows up because parsing is decimal.
        assert_eq!(parse_duration("0.1s").unwrap() + parse_duration("0.2s").unwrap(), 300_000);
        assert_eq!(parse_duration("4.2s").unwrap(), 4_200_000);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(matches!(parse_duration("5"), Err(DraftError::Format(_))));
        assert!(matches!(parse_duration(""), Err(DraftError::Format(_))));
        assert!(matches!(parse_duration("s"), Err(DraftError::Format(_))));
        assert!(matches!(parse_duration("5x"), Err(DraftError::Format(_))));
        assert!(matches!(parse_duration("1.2.3s"), Err(DraftError::Format(_))));
    }

    #[test]
    fn test_start_end_to_start_duration() {
        let r = TimeRange::parse_start_end("1s-4.2s").unwrap();
        assert_eq!(r, TimeRange::new(1_000_000, 3_200_000));
        assert_eq!(r.to_start_duration(), "1s-3.2s");
        assert_eq!(r.to_string(), "1s-4.2s");

        assert!(TimeRange::parse_start_end("5s-5s").is_err());
        assert!(TimeRange::parse_start_end("5s").is_err());
        assert!(TimeRange::parse_start_end("0-5s").is_err());
    }

    #[test]
    fn test_overlap_iff() {
        let a = TimeRange::parse_start_end("0s-5s").unwrap();
        let abutting = TimeRange::parse_start_end("5s-8s").unwrap();
        let inside = TimeRange::parse_start_end("4s-6s").unwrap();
        let before = TimeRange::parse_start_end("0s-1s").unwrap();
        let later = TimeRange::parse_start_end("2s-3s").unwrap();

        assert!(!a.overlaps(&abutting));
        assert!(!abutting.overlaps(&a));
        assert!(a.overlaps(&inside));
        assert!(inside.overlaps(&abutting));
        assert!(!before.overlaps(&later));
        assert!(a.overlaps(&a));
    }

    #[test]
    fn test_resolve_timing_rules() {
        let target = TimeRange::parse_start_end("2s-6s").unwrap();

        let t = resolve_timing(target, None, None).unwrap();
        assert_eq!(t.source, TimeRange::new(0, 4_000_000));
        assert_eq!(t.speed, 1.0);

        let t = resolve_timing(target, None, Some(2.0)).unwrap();
        assert_eq!(t.source, TimeRange::new(0, 8_000_000));
        assert_eq!(t.target, target);

        let source = TimeRange::parse_start_end("1s-3s").unwrap();
        let t = resolve_timing(target, Some(source), None).unwrap();
        assert_eq!(t.speed, 0.5);
        assert_eq!(t.target, target);

        let t = resolve_timing(target, Some(source), Some(0.5)).unwrap();
        assert_eq!(t.target, TimeRange::new(2_000_000, 4_000_000));

        assert!(matches!(resolve_timing(target, None, Some(0.0)), Err(DraftError::Range(_))));
        assert!(matches!(resolve_timing(target, None, Some(-1.0)), Err(DraftError::Range(_))));
    }

    #[test]
    fn test_format_micros() {
        assert_eq!(format_micros(0), "0s");
        assert_eq!(format_micros(8_000_000), "8s");
        assert_eq!(format_micros(1_250_000), "1.25s");
        assert_eq!(format_micros(200), "0.0002s");
    }
}
