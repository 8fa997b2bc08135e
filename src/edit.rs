//! Edit overlay: the mapping between the edited and the original timeline.
//!
//! Edits are non-destructive. The overlay keeps the ordered list of original
//! time intervals that survive all deletions so far; the edited timeline is
//! their concatenation. All times are microseconds.
//!
//! ```
//! use clipforge::edit::EditOverlay;
//!
//! let mut overlay = EditOverlay::new(60_000_000);
//! overlay.delete_range(0, 25_000_000).unwrap();
//! overlay.delete_range(10_000_000, 50_000_000).unwrap();
//!
//! assert_eq!(overlay.duration(), 10_000_000);
//! assert_eq!(overlay.map(0), Some(25_000_000));
//! ```

use crate::error::{ClipError, Result};

/// A kept `[start, end)` interval of original time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Ordered, disjoint kept intervals plus the edited start of each one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOverlay {
    original_duration: u64,
    intervals: Vec<Interval>,
    /// Edited-time start of `intervals[i]` (prefix sums of lengths).
    edited_starts: Vec<u64>,
    duration: u64,
}

impl EditOverlay {
    /// Identity overlay over `[0, original_duration)`.
    pub fn new(original_duration: u64) -> Self {
        let intervals = if original_duration > 0 {
            vec![Interval {
                start: 0,
                end: original_duration,
            }]
        } else {
            Vec::new()
        };
        let mut overlay = Self {
            original_duration,
            intervals,
            edited_starts: Vec::new(),
            duration: 0,
        };
        overlay.reindex();
        overlay
    }

    /// Current edited duration.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn original_duration(&self) -> u64 {
        self.original_duration
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// True until the first effective deletion.
    pub fn is_identity(&self) -> bool {
        self.duration == self.original_duration
    }

    /// Edited time to original time. `None` at or past the edited end.
    pub fn map(&self, edited: u64) -> Option<u64> {
        if edited >= self.duration {
            return None;
        }
        let idx = self.edited_starts.partition_point(|&s| s <= edited) - 1;
        Some(self.intervals[idx].start + (edited - self.edited_starts[idx]))
    }

    /// Original time to edited time. `None` when the point was deleted.
    pub fn unmap(&self, original: u64) -> Option<u64> {
        let idx = self.containing_or_next(original);
        let interval = self.intervals.get(idx)?;
        (interval.start <= original)
            .then(|| self.edited_starts[idx] + (original - interval.start))
    }

    /// Edited time of the first kept point at or after `original`. Points past
    /// the last kept interval project to the edited end.
    pub fn project(&self, original: u64) -> u64 {
        let idx = self.containing_or_next(original);
        match self.intervals.get(idx) {
            Some(interval) => self.edited_starts[idx] + original.saturating_sub(interval.start),
            None => self.duration,
        }
    }

    /// First kept original time at or after `original`.
    pub fn next_kept(&self, original: u64) -> Option<u64> {
        let idx = self.containing_or_next(original);
        self.intervals
            .get(idx)
            .map(|interval| interval.start.max(original))
    }

    /// Whether any part of the original window `[start, end)` survives.
    pub fn is_visible(&self, start: u64, end: u64) -> bool {
        self.next_kept(start)
            .is_some_and(|kept| kept < end.max(start + 1))
    }

    /// Remove the edited range `[start, end)` and return the new duration.
    ///
    /// `end` is clamped to the current duration. An empty range, or one that
    /// starts exactly at the end, leaves the overlay unchanged.
    pub fn delete_range(&mut self, start: u64, end: u64) -> Result<u64> {
        if start > end || start > self.duration {
            return Err(ClipError::InvalidRange {
                start,
                end,
                duration: self.duration,
            });
        }
        let end = end.min(self.duration);
        if start == end {
            return Ok(self.duration);
        }

        let mut kept = Vec::with_capacity(self.intervals.len() + 1);
        for (interval, &edited_start) in self.intervals.iter().zip(&self.edited_starts) {
            let edited_end = edited_start + interval.len();
            let lo = start.max(edited_start);
            let hi = end.min(edited_end);
            if lo >= hi {
                kept.push(*interval);
                continue;
            }

            // Original sub-range covered by the deletion
            let cut_start = interval.start + (lo - edited_start);
            let cut_end = interval.start + (hi - edited_start);
            for piece in [
                Interval {
                    start: interval.start,
                    end: cut_start,
                },
                Interval {
                    start: cut_end,
                    end: interval.end,
                },
            ] {
                if !piece.is_empty() {
                    kept.push(piece);
                }
            }
        }

        self.intervals = kept;
        self.reindex();

        tracing::debug!(
            start_us = start,
            end_us = end,
            duration_us = self.duration,
            intervals = self.intervals.len(),
            "Deleted range"
        );
        Ok(self.duration)
    }

    /// Index of the interval containing `original`, or of the first interval
    /// after it.
    fn containing_or_next(&self, original: u64) -> usize {
        self.intervals.partition_point(|i| i.end <= original)
    }

    fn reindex(&mut self) {
        self.edited_starts.clear();
        let mut acc = 0;
        for interval in &self.intervals {
            self.edited_starts.push(acc);
            acc += interval.len();
        }
        self.duration = acc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const S: u64 = 1_000_000;

    #[test]
    fn test_identity() {
        let overlay = EditOverlay::new(60 * S);
        assert!(overlay.is_identity());
        assert_eq!(overlay.duration(), 60 * S);
        assert_eq!(overlay.map(123), Some(123));
        assert_eq!(overlay.unmap(123), Some(123));
        assert_eq!(overlay.map(60 * S), None);
        assert_eq!(overlay.unmap(60 * S), None);
    }

    #[test]
    fn test_deletion_composes() {
        let mut overlay = EditOverlay::new(60 * S);
        assert_eq!(overlay.delete_range(0, 25 * S).unwrap(), 35 * S);
        assert_eq!(overlay.delete_range(10 * S, 50 * S).unwrap(), 10 * S);

        assert_eq!(
            overlay.intervals(),
            &[Interval {
                start: 25 * S,
                end: 35 * S
            }]
        );
        assert_eq!(overlay.map(0), Some(25 * S));
        assert_eq!(overlay.map(10 * S - 1), Some(35 * S - 1));
        assert_eq!(overlay.unmap(30 * S), Some(5 * S));
        assert_eq!(overlay.unmap(10 * S), None);
    }

    #[test]
    fn test_middle_deletion_splits_interval() {
        let mut overlay = EditOverlay::new(10 * S);
        overlay.delete_range(2 * S, 5 * S).unwrap();

        assert_eq!(overlay.duration(), 7 * S);
        assert_eq!(overlay.intervals().len(), 2);
        assert_eq!(overlay.map(2 * S), Some(5 * S));
        assert_eq!(overlay.map(S), Some(S));
        assert_eq!(overlay.unmap(6 * S), Some(3 * S));
        assert_eq!(overlay.unmap(3 * S), None);

        // Second cut spanning the seam removes from both intervals
        overlay.delete_range(S, 3 * S).unwrap();
        assert_eq!(overlay.duration(), 5 * S);
        assert_eq!(
            overlay.intervals(),
            &[
                Interval { start: 0, end: S },
                Interval {
                    start: 6 * S,
                    end: 10 * S
                }
            ]
        );
    }

    #[test]
    fn test_project_and_next_kept() {
        let mut overlay = EditOverlay::new(10 * S);
        overlay.delete_range(2 * S, 5 * S).unwrap();

        assert_eq!(overlay.project(3 * S), 2 * S);
        assert_eq!(overlay.project(6 * S), 3 * S);
        assert_eq!(overlay.project(11 * S), 7 * S);
        assert_eq!(overlay.next_kept(3 * S), Some(5 * S));
        assert_eq!(overlay.next_kept(S), Some(S));
        assert_eq!(overlay.next_kept(10 * S), None);

        assert!(overlay.is_visible(S, 3 * S));
        assert!(overlay.is_visible(4 * S, 6 * S));
        assert!(!overlay.is_visible(2 * S, 5 * S));
    }

    #[test]
    fn test_end_clamped() {
        let mut overlay = EditOverlay::new(10 * S);
        assert_eq!(overlay.delete_range(8 * S, 100 * S).unwrap(), 8 * S);
    }

    #[test]
    fn test_empty_and_tail_ranges_are_noops() {
        let mut overlay = EditOverlay::new(10 * S);
        assert_eq!(overlay.delete_range(3 * S, 3 * S).unwrap(), 10 * S);
        assert_eq!(overlay.delete_range(10 * S, 12 * S).unwrap(), 10 * S);
        assert!(overlay.is_identity());
    }

    #[test]
    fn test_invalid_ranges() {
        let mut overlay = EditOverlay::new(10 * S);
        assert_matches!(
            overlay.delete_range(5 * S, 2 * S),
            Err(ClipError::InvalidRange { .. })
        );
        assert_matches!(
            overlay.delete_range(11 * S, 12 * S),
            Err(ClipError::InvalidRange { duration, .. }) if duration == 10 * S
        );
    }

    #[test]
    fn test_delete_everything() {
        let mut overlay = EditOverlay::new(10 * S);
        assert_eq!(overlay.delete_range(0, 10 * S).unwrap(), 0);
        assert!(overlay.intervals().is_empty());
        assert_eq!(overlay.map(0), None);
        assert_eq!(overlay.project(5 * S), 0);
        assert_eq!(overlay.delete_range(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_duration_formula() {
        // duration' = max(0, d - (min(b, d) - a))
        for (a, b) in [(0, 1), (3, 7), (9, 20), (0, 10), (5, 5)] {
            let mut overlay = EditOverlay::new(10 * S);
            let d = overlay.duration();
            let expected = d.saturating_sub((b * S).min(d) - a * S);
            assert_eq!(overlay.delete_range(a * S, b * S).unwrap(), expected);
        }
    }
}
