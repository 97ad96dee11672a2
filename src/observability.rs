//! Statistics and phase timing (spec §6) — reported at `info` level via
//! `tracing` and returned to the caller, the way the teacher reports
//! progress through `tracing` spans/events rather than ad hoc `println!`.

use std::fmt;
use std::time::Duration;

/// Wall-clock duration spent in each phase of one `process` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimings {
    pub checksum: Duration,
    pub summary: Duration,
    pub merge: Duration,
    pub bulk: Duration,
}

/// Everything spec §6 says to report after `process` completes: side
/// counts, the folding factor used, the effective cascade depth, the total
/// number of differences found, and per-phase timings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub left_count: u64,
    pub right_count: u64,
    pub factor: u8,
    pub levels: usize,
    pub updates: u64,
    pub inserts: u64,
    pub deletes: u64,
    pub timings: PhaseTimings,
}

impl Statistics {
    /// The "nothing to do" statistics returned for an empty-domain
    /// comparison, so callers that want a value rather than an error still
    /// get something printable.
    pub fn empty() -> Self {
        Statistics::default()
    }

    pub fn total_differences(&self) -> u64 {
        self.updates + self.inserts + self.deletes
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "sides: left={} right={} factor={} levels={}",
            self.left_count, self.right_count, self.factor, self.levels
        )?;
        writeln!(
            f,
            "differences: {} (updates={} inserts={} deletes={})",
            self.total_differences(),
            self.updates,
            self.inserts,
            self.deletes
        )?;
        write!(
            f,
            "timings: checksum={:?} summary={:?} merge={:?} bulk={:?}",
            self.timings.checksum, self.timings.summary, self.timings.merge, self.timings.bulk
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_statistics_has_zero_differences() {
        assert_eq!(Statistics::empty().total_differences(), 0);
    }

    #[test]
    fn test_total_differences_sums_all_kinds() {
        let stats = Statistics {
            updates: 1,
            inserts: 2,
            deletes: 3,
            ..Default::default()
        };
        assert_eq!(stats.total_differences(), 6);
    }

    #[test]
    fn test_display_includes_side_counts() {
        let stats = Statistics {
            left_count: 10,
            right_count: 12,
            factor: 7,
            levels: 3,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("left=10"));
        assert!(text.contains("right=12"));
        assert!(text.contains("factor=7"));
    }
}
