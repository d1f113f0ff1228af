//! Sequence gap tracking.
//!
//! Missing sequence numbers are the complement of the seen set over the range
//! `[first, max_seen]`, where `first` is either the configured first sequence of
//! the feed or the lowest sequence seen so far. Arrival order and duplicates do
//! not affect the result.
//!
//! Gaps are kept as inclusive ranges, so one record carrying an extreme
//! sequence number costs a single range rather than one entry per hole.
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    seen: BTreeSet<i32>,
    /// Gap start -> gap end, inclusive, non-overlapping.
    gaps: BTreeMap<i32, i32>,
    first: Option<i32>,
}

/// Borrowed view of the missing sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Missing<'a> {
    gaps: &'a BTreeMap<i32, i32>,
}

impl<'a> Missing<'a> {
    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    /// Number of missing sequence numbers.
    pub fn len(&self) -> u64 {
        self.gaps
            .iter()
            .map(|(&start, &end)| (i64::from(end) - i64::from(start) + 1) as u64)
            .sum()
    }

    /// Missing sequences as ascending inclusive ranges.
    pub fn ranges(self) -> impl Iterator<Item = RangeInclusive<i32>> + 'a {
        self.gaps.iter().map(|(&start, &end)| start..=end)
    }

    /// Missing sequences ascending, one by one.
    pub fn iter(self) -> impl Iterator<Item = i32> + 'a {
        self.ranges().flatten()
    }

    /// Missing sequences that fall inside `bounds`, ascending.
    pub fn within(self, bounds: RangeInclusive<i32>) -> impl Iterator<Item = i32> + 'a {
        let (lo, hi) = bounds.into_inner();
        self.gaps
            .range(..=hi)
            .filter_map(move |(&start, &end)| {
                let (start, end) = (start.max(lo), end.min(hi));
                (start <= end).then_some(start..=end)
            })
            .flatten()
    }
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker for a feed known to start at `first`; a lost leading packet is
    /// reported missing as soon as any later sequence is seen.
    pub fn with_first(first: i32) -> Self {
        Self {
            first: Some(first),
            ..Self::default()
        }
    }

    /// Record `seq` and return the current missing set.
    pub fn record_seen(&mut self, seq: i32) -> Missing<'_> {
        if !self.seen.contains(&seq) {
            match (self.range_start(), self.max_seen()) {
                (Some(lo), Some(hi)) => {
                    if seq > hi {
                        self.open_gap(hi + 1, seq - 1);
                    } else if seq < lo {
                        self.open_gap(seq + 1, lo - 1);
                    } else {
                        self.close(seq);
                    }
                }
                // first sequence ever: only a configured first can open a gap
                _ => {
                    if let Some(first) = self.first {
                        if first < seq {
                            self.open_gap(first, seq - 1);
                        }
                    }
                }
            }
            self.seen.insert(seq);
        }
        self.missing()
    }

    pub fn missing(&self) -> Missing<'_> {
        Missing { gaps: &self.gaps }
    }

    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn min_seen(&self) -> Option<i32> {
        self.seen.first().copied()
    }

    pub fn max_seen(&self) -> Option<i32> {
        self.seen.last().copied()
    }

    /// Number of distinct sequence numbers seen.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn range_start(&self) -> Option<i32> {
        match self.first {
            Some(first) => Some(first.min(self.min_seen()?)),
            None => self.min_seen(),
        }
    }

    /// Add `[start, end]` as a gap, merging with a gap that begins at `end + 1`.
    fn open_gap(&mut self, start: i32, end: i32) {
        if start > end {
            return;
        }
        let end = match end.checked_add(1).and_then(|next| self.gaps.remove(&next)) {
            Some(next_end) => next_end,
            None => end,
        };
        self.gaps.insert(start, end);
    }

    /// Remove `seq` from the gap that contains it, splitting the gap.
    fn close(&mut self, seq: i32) {
        let Some((&start, &end)) = self.gaps.range(..=seq).next_back() else {
            return;
        };
        if seq > end {
            return;
        }
        self.gaps.remove(&start);
        if start < seq {
            self.gaps.insert(start, seq - 1);
        }
        if seq < end {
            self.gaps.insert(seq + 1, end);
        }
    }
}
