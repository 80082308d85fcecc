//! Padding range map: tracks ext-SN ranges that were never actually
//! forwarded (padding), so the sequencer ring doesn't waste slots on them.
//!
//! The map is a small ordered list of half-open, non-overlapping exclusion
//! ranges `[start, end)`. `get_value(s)` is the stepwise cumulative count of
//! excluded sequence numbers at or before `s`; subtracting it from an ext-SN
//! gives the contiguous ring-slot index that SN would occupy if the
//! excluded SNs had never existed.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Exclusion {
    start: u64,
    end: u64, // exclusive
}

impl Exclusion {
    fn len(&self) -> u64 {
        self.end - self.start
    }
}

/// An ordered sequence of half-open exclusion ranges over ext-SN space.
#[derive(Debug, Default)]
pub(crate) struct RangeMap {
    exclusions: Vec<Exclusion>,
    /// Running count of excluded SNs strictly before `exclusions[0]`, kept
    /// so that trimming history doesn't perturb `get_value` for ranges that
    /// are still live.
    trimmed_offset: u64,
    /// Cap on retained history, matching the sequencer ring's own window.
    max_history: usize,
}

impl RangeMap {
    pub(crate) fn new(max_history: usize) -> Self {
        RangeMap {
            exclusions: Vec::new(),
            trimmed_offset: 0,
            max_history: max_history.max(1),
        }
    }

    /// Cumulative count of excluded sequence numbers at or before `s`.
    ///
    /// Returns an error if `s` falls strictly inside an exclusion (there is
    /// no single well-defined offset for an SN that was itself excluded).
    pub(crate) fn get_value(&self, s: u64) -> Result<u64> {
        let mut total = self.trimmed_offset;
        for ex in &self.exclusions {
            if s < ex.start {
                break;
            }
            if s < ex.end {
                return Err(Error::ErrOffsetNotFound(s));
            }
            total += ex.len();
        }
        Ok(total)
    }

    /// Registers a new exclusion `[start, end)`, coalescing with an
    /// immediately-adjacent prior exclusion when possible.
    ///
    /// Ranges must be appended in non-decreasing order and must not overlap
    /// an existing exclusion; either violation is a typed error and leaves
    /// the map unchanged.
    pub(crate) fn exclude_range(&mut self, start: u64, end: u64) -> Result<()> {
        if end <= start {
            return Ok(());
        }

        if let Some(last) = self.exclusions.last_mut() {
            if start < last.end {
                return Err(Error::ErrRangeMapOverlap { start, end });
            }
            if start == last.end {
                last.end = end;
                self.trim();
                return Ok(());
            }
        }

        self.exclusions.push(Exclusion { start, end });
        self.trim();
        Ok(())
    }

    /// Drops exclusions wholly before `floor`, folding their length into
    /// `trimmed_offset` so later `get_value` calls remain correct.
    pub(crate) fn trim_before(&mut self, floor: u64) {
        while let Some(first) = self.exclusions.first() {
            if first.end <= floor {
                self.trimmed_offset += first.len();
                self.exclusions.remove(0);
            } else {
                break;
            }
        }
    }

    fn trim(&mut self) {
        while self.exclusions.len() > self.max_history {
            if let Some(first) = self.exclusions.first() {
                self.trimmed_offset += first.len();
            }
            self.exclusions.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_has_zero_offset_everywhere() {
        let m = RangeMap::new(8);
        assert_eq!(m.get_value(12345).unwrap(), 0);
    }

    #[test]
    fn single_exclusion_offsets_values_after_it() {
        let mut m = RangeMap::new(8);
        m.exclude_range(1005, 1010).unwrap(); // excludes 1005..1009 (5 values)
        assert_eq!(m.get_value(1004).unwrap(), 0);
        assert_eq!(m.get_value(1010).unwrap(), 5);
        assert_eq!(m.get_value(2000).unwrap(), 5);
    }

    #[test]
    fn query_inside_exclusion_errors() {
        let mut m = RangeMap::new(8);
        m.exclude_range(1005, 1010).unwrap();
        assert!(matches!(m.get_value(1007), Err(Error::ErrOffsetNotFound(1007))));
    }

    #[test]
    fn overlapping_exclusion_errors_and_leaves_map_unchanged() {
        let mut m = RangeMap::new(8);
        m.exclude_range(1000, 1010).unwrap();
        let err = m.exclude_range(1005, 1020);
        assert!(matches!(err, Err(Error::ErrRangeMapOverlap { .. })));
        assert_eq!(m.get_value(1010).unwrap(), 10);
    }

    #[test]
    fn adjacent_exclusions_coalesce() {
        let mut m = RangeMap::new(8);
        m.exclude_range(1000, 1010).unwrap();
        m.exclude_range(1010, 1015).unwrap();
        assert_eq!(m.exclusions.len(), 1);
        assert_eq!(m.get_value(2000).unwrap(), 15);
    }

    #[test]
    fn trimming_preserves_offsets_for_surviving_ranges() {
        let mut m = RangeMap::new(8);
        m.exclude_range(100, 105).unwrap();
        m.exclude_range(200, 203).unwrap();
        m.trim_before(150);
        assert_eq!(m.exclusions.len(), 1);
        assert_eq!(m.get_value(1000).unwrap(), 8);
    }

    #[test]
    fn history_cap_evicts_oldest() {
        let mut m = RangeMap::new(2);
        m.exclude_range(100, 105).unwrap();
        m.exclude_range(200, 203).unwrap();
        m.exclude_range(300, 301).unwrap();
        assert_eq!(m.exclusions.len(), 2);
        assert_eq!(m.get_value(1000).unwrap(), 9);
    }
}
