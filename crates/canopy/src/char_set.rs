//! Character sets as sorted, disjoint code point ranges, and the partition
//! merge that keeps lexical transitions free of overlap.

use crate::types::{display_fn, Map};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    ops::RangeInclusive,
};

/// The largest Unicode scalar value.
pub const MAX_CHAR: u32 = 0x10FFFF;

/// An inclusive range of code points.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharRange {
    pub start: u32,
    pub end: u32,
}

impl CharRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, c: u32) -> bool {
        self.start <= c && c <= self.end
    }
}

/// A set of characters.
///
/// The ranges are kept sorted, pairwise disjoint and non-adjacent, so two sets
/// containing the same characters are structurally equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacterSet {
    ranges: Vec<CharRange>,
}

impl CharacterSet {
    pub const fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// The set of every character.
    pub fn full() -> Self {
        Self::empty().add_range(0, MAX_CHAR)
    }

    pub fn from_char(c: char) -> Self {
        Self::empty().add_char(c)
    }

    pub fn from_range(range: RangeInclusive<char>) -> Self {
        Self::empty().add_range(u32::from(*range.start()), u32::from(*range.end()))
    }

    pub fn add_char(self, c: char) -> Self {
        let c = u32::from(c);
        self.add_range(c, c)
    }

    /// Add the inclusive range `start..=end`. Empty ranges are ignored.
    pub fn add_range(mut self, start: u32, end: u32) -> Self {
        let end = end.min(MAX_CHAR);
        if start > end {
            return self;
        }
        self.insert(CharRange::new(start, end));
        self
    }

    fn insert(&mut self, range: CharRange) {
        // first range that could touch `range` from the left.
        let lo = self
            .ranges
            .partition_point(|r| r.end.saturating_add(1) < range.start);
        // first range that lies strictly right of `range` without touching it.
        let hi = self
            .ranges
            .partition_point(|r| r.start <= range.end.saturating_add(1));

        let mut merged = range;
        if lo < hi {
            merged.start = merged.start.min(self.ranges[lo].start);
            merged.end = merged.end.max(self.ranges[hi - 1].end);
        }
        self.ranges.splice(lo..hi, Some(merged));
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[CharRange] {
        &self.ranges[..]
    }

    pub fn contains(&self, c: char) -> bool {
        self.contains_code_point(u32::from(c))
    }

    pub fn contains_code_point(&self, c: u32) -> bool {
        let i = self.ranges.partition_point(|r| r.end < c);
        self.ranges.get(i).map_or(false, |r| r.contains(c))
    }

    /// The number of code points in this set.
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|r| u64::from(r.end - r.start) + 1)
            .sum()
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for range in &other.ranges {
            result.insert(*range);
        }
        result
    }

    pub fn intersection(&self, other: &Self) -> Self {
        let mut ranges = vec![];
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a, b) = (self.ranges[i], other.ranges[j]);
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start <= end {
                ranges.push(CharRange::new(start, end));
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self { ranges }
    }

    /// The characters not contained in this set.
    pub fn negate(&self) -> Self {
        let mut ranges = vec![];
        let mut next = 0u32;
        for range in &self.ranges {
            if range.start > next {
                ranges.push(CharRange::new(next, range.start - 1));
            }
            next = range.end.saturating_add(1);
        }
        if next <= MAX_CHAR {
            ranges.push(CharRange::new(next, MAX_CHAR));
        }
        Self { ranges }
    }

    pub fn difference(&self, other: &Self) -> Self {
        self.intersection(&other.negate())
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other).is_empty()
    }
}

impl fmt::Display for CharacterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = |c: u32| {
            display_fn(move |f| match char::from_u32(c) {
                Some(ch) if ch.is_ascii_graphic() && !matches!(ch, '\\' | ']' | '-' | '[') => {
                    write!(f, "{}", ch)
                }
                _ => write!(f, "\\u{{{:x}}}", c),
            })
        };

        f.write_str("[")?;
        for range in &self.ranges {
            if range.start == range.end {
                write!(f, "{}", c(range.start))?;
            } else {
                write!(f, "{}-{}", c(range.start), c(range.end))?;
            }
        }
        f.write_str("]")
    }
}

/// Re-partition a collection of `(characters, value)` entries so that the
/// resulting character sets are pairwise disjoint.
///
/// Each resulting set carries the `merge` of the values of every entry that
/// contains its characters, and the union of the resulting sets equals the
/// union of the input sets. Entries are processed as a sweep over the range
/// boundaries; the output is ordered by the smallest character of each set.
pub fn partition<T, F>(entries: Vec<(CharacterSet, T)>, mut merge: F) -> Vec<(CharacterSet, T)>
where
    T: Clone,
    F: FnMut(T, T) -> T,
{
    // boundary -> (entry, whether the entry starts covering at the boundary)
    let mut events: BTreeMap<u32, Vec<(usize, bool)>> = BTreeMap::new();
    for (i, (chars, _)) in entries.iter().enumerate() {
        for range in chars.ranges() {
            events.entry(range.start).or_default().push((i, true));
            events.entry(range.end + 1).or_default().push((i, false));
        }
    }

    let mut groups: Map<Vec<usize>, CharacterSet> = Map::default();
    let mut active = BTreeSet::new();
    let mut segment_start = None;
    for (&boundary, changes) in &events {
        if let Some(start) = segment_start {
            if !active.is_empty() {
                let key: Vec<usize> = active.iter().copied().collect();
                let chars = groups.entry(key).or_default();
                *chars = std::mem::take(chars).add_range(start, boundary - 1);
            }
        }
        for &(i, starts) in changes {
            if starts {
                active.insert(i);
            } else {
                active.remove(&i);
            }
        }
        segment_start = Some(boundary);
    }

    groups
        .into_iter()
        .filter_map(|(indices, chars)| {
            let value = indices
                .iter()
                .map(|&i| entries[i].1.clone())
                .reduce(&mut merge)?;
            Some((chars, value))
        })
        .collect()
}

/// Merge two transition maps keyed by character sets.
///
/// Overlapping sets are split into exact sub-ranges, and the sub-ranges covered
/// by both maps carry `merge(left, right)`.
pub fn merge_char_transitions<T, F>(
    left: Vec<(CharacterSet, T)>,
    right: Vec<(CharacterSet, T)>,
    merge: F,
) -> Vec<(CharacterSet, T)>
where
    T: Clone,
    F: FnMut(T, T) -> T,
{
    if left.is_empty() {
        return right;
    }
    if right.is_empty() {
        return left;
    }
    let mut entries = left;
    entries.extend(right);
    partition(entries, merge)
}
