//! Non-overlap rule for placements on one track.

use std::path::Path;

use crate::error::{DraftError, DraftResult};
use crate::journal::{load, JournalOp, OpRecord};
use crate::timerange::TimeRange;

/// First committed range that intersects `candidate`, if any.
pub(crate) fn find_conflict<'a, I>(candidate: &TimeRange, committed: I) -> Option<TimeRange>
where
    I: IntoIterator<Item = &'a TimeRange>,
{
    committed.into_iter().find(|e| candidate.overlaps(e)).copied()
}

/// Creation intervals committed to `track_name` (`None` is the unnamed default track).
pub(crate) fn committed_ranges<Op: JournalOp>(
    records: &[OpRecord<Op>],
    track_name: Option<&str>,
) -> Vec<TimeRange> {
    records
        .iter()
        .filter(|r| r.op.is_creation() && r.track_name.as_deref() == track_name)
        .filter_map(|r| r.op.target_range())
        .collect()
}

/// Rejects `candidate` when it intersects any creation record on the same track.
pub(crate) fn check_overlap<Op: JournalOp>(
    draft_dir: &Path,
    track_name: Option<&str>,
    candidate: &TimeRange,
) -> DraftResult<()> {
    let records = load::<Op>(draft_dir)?;
    let committed = committed_ranges(&records, track_name);
    match find_conflict(candidate, &committed) {
        Some(existing) => Err(DraftError::Overlap {
            track: track_name.unwrap_or("<default>").to_string(),
            candidate: candidate.to_string(),
            existing: existing.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(raw: &str) -> TimeRange {
        TimeRange::parse_start_end(raw).unwrap()
    }

    #[test]
    fn test_conflict_iff_intervals_intersect() {
        let committed = vec![r("0s-5s"), r("10s-12s")];
        assert_eq!(find_conflict(&r("4s-6s"), &committed), Some(r("0s-5s")));
        assert_eq!(find_conflict(&r("11s-20s"), &committed), Some(r("10s-12s")));
        assert_eq!(find_conflict(&r("1s-2s"), &committed), Some(r("0s-5s")));
        assert_eq!(find_conflict(&r("5s-10s"), &committed), None);
        assert_eq!(find_conflict(&r("12s-13s"), &committed), None);
    }

    #[test]
    fn test_exhaustive_small_grid_matches_formula() {
        // Every pair of intervals on a 0..6 second grid.
        let mut spans = Vec::new();
        for s in 0..6i64 {
            for e in (s + 1)..=6 {
                spans.push(TimeRange::new(s * 1_000_000, (e - s) * 1_000_000));
            }
        }
        for a in &spans {
            for b in &spans {
                let expected = !(b.end() <= a.start || b.start >= a.end());
                assert_eq!(find_conflict(b, [a]).is_some(), expected, "{a} vs {b}");
            }
        }
    }
}
