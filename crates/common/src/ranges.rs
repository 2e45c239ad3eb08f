use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    time::Duration,
};

use crate::{
    time::UnixNanos,
    types::Shard,
};

/// Half-open time range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeRange {
    pub start: UnixNanos,
    pub end: UnixNanos,
}

impl TimeRange {
    pub fn new(start: UnixNanos, end: UnixNanos) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, ts: UnixNanos) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> Duration {
        let nanos = self.end.as_nanos().saturating_sub(self.start.as_nanos());
        Duration::from_nanos(nanos.max(0) as u64)
    }
}

/// A set of half-open time ranges. Intersecting and adjacent ranges are
/// merged on insert, so iteration yields disjoint, non-adjacent, non-empty
/// ranges in ascending order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeRangeSet {
    // start -> end
    ranges: BTreeMap<UnixNanos, UnixNanos>,
}

impl TimeRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_range(range: TimeRange) -> Self {
        let mut set = Self::new();
        set.add(range);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn add(&mut self, range: TimeRange) {
        if range.is_empty() {
            return;
        }
        let mut start = range.start;
        let mut end = range.end;
        // Absorb a predecessor that reaches `start`.
        if let Some((&prev_start, &prev_end)) = self.ranges.range(..=start).next_back() {
            if prev_end >= start {
                start = prev_start;
                end = end.max(prev_end);
                self.ranges.remove(&prev_start);
            }
        }
        // Absorb every successor starting within the merged span.
        while let Some((&next_start, &next_end)) = self.ranges.range(start..).next() {
            if next_start > end {
                break;
            }
            end = end.max(next_end);
            self.ranges.remove(&next_start);
        }
        self.ranges.insert(start, end);
    }

    pub fn contains(&self, ts: UnixNanos) -> bool {
        match self.ranges.range(..=ts).next_back() {
            Some((_, &end)) => ts < end,
            None => false,
        }
    }

    pub fn overlaps(&self, range: &TimeRange) -> bool {
        if range.is_empty() {
            return false;
        }
        if let Some((_, &prev_end)) = self.ranges.range(..=range.start).next_back() {
            if prev_end > range.start {
                return true;
            }
        }
        match self.ranges.range(range.start..).next() {
            Some((&next_start, _)) => next_start < range.end,
            None => false,
        }
    }

    /// The smallest single range covering every range in the set.
    pub fn min_max(&self) -> Option<TimeRange> {
        let (&start, _) = self.ranges.first_key_value()?;
        let (_, &end) = self.ranges.last_key_value()?;
        Some(TimeRange::new(start, end))
    }

    pub fn iter(&self) -> impl Iterator<Item = TimeRange> + '_ {
        self.ranges
            .iter()
            .map(|(&start, &end)| TimeRange::new(start, end))
    }

    /// Starts of every `block_size`-aligned block intersecting the set, in
    /// ascending order.
    pub fn block_starts(&self, block_size: Duration) -> Vec<UnixNanos> {
        let mut starts = BTreeSet::new();
        for range in self.iter() {
            let mut block = range.start.truncate_to(block_size);
            while block < range.end {
                starts.insert(block);
                block = block + block_size;
            }
        }
        starts.into_iter().collect()
    }
}

impl FromIterator<TimeRange> for TimeRangeSet {
    fn from_iter<I: IntoIterator<Item = TimeRange>>(iter: I) -> Self {
        let mut set = Self::new();
        for range in iter {
            set.add(range);
        }
        set
    }
}

/// What must be bootstrapped: a time-range set per shard. A shard mapped to
/// an empty set is treated as not requested.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShardTimeRanges {
    shards: BTreeMap<Shard, TimeRangeSet>,
}

impl ShardTimeRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, shard: Shard, ranges: TimeRangeSet) {
        self.shards.insert(shard, ranges);
    }

    pub fn add(&mut self, shard: Shard, range: TimeRange) {
        self.shards.entry(shard).or_default().add(range);
    }

    /// Requested ranges for `shard`, or `None` when the shard is absent or
    /// mapped to an empty set.
    pub fn get(&self, shard: Shard) -> Option<&TimeRangeSet> {
        self.shards.get(&shard).filter(|ranges| !ranges.is_empty())
    }

    pub fn is_requested(&self, shard: Shard) -> bool {
        self.get(shard).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Requested shards and their (non-empty) range sets.
    pub fn iter(&self) -> impl Iterator<Item = (Shard, &TimeRangeSet)> + '_ {
        self.shards
            .iter()
            .filter(|(_, ranges)| !ranges.is_empty())
            .map(|(&shard, ranges)| (shard, ranges))
    }

    pub fn shards(&self) -> impl Iterator<Item = Shard> + '_ {
        self.iter().map(|(shard, _)| shard)
    }

    pub fn num_shards(&self) -> usize {
        self.iter().count()
    }

    /// The hull of every requested range across all shards.
    pub fn min_max(&self) -> Option<TimeRange> {
        let mut hull: Option<TimeRange> = None;
        for (_, ranges) in self.iter() {
            let Some(span) = ranges.min_max() else {
                continue;
            };
            hull = Some(match hull {
                None => span,
                Some(hull) => TimeRange::new(
                    hull.start.min(span.start),
                    hull.end.max(span.end),
                ),
            });
        }
        hull
    }
}

impl FromIterator<(Shard, TimeRangeSet)> for ShardTimeRanges {
    fn from_iter<I: IntoIterator<Item = (Shard, TimeRangeSet)>>(iter: I) -> Self {
        Self {
            shards: iter.into_iter().collect(),
        }
    }
}
