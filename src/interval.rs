//! Range algebra: a closed set of code-point intervals with union, complement
//! and containment. Grounded on `RangeSet` in
//! `ecmascript/regexp/regexp_opcode.{h,cpp}` and on the `Interval` pair used
//! throughout `program.rs`/`unicode.rs`.

use std::cmp;

/// The code-point universe a [`RangeSet`] inverts against. Without the `u`
/// flag, ECMAScript regexes operate on UTF-16 code units, so the universe is
/// the BMP. With `u`, it's the full set of Unicode scalar values.
pub const MAX_BMP: u32 = 0xFFFF;
pub const MAX_UNICODE: u32 = 0xFFFF_FFFF;

/// An ordered list of disjoint, non-adjacent closed intervals `[lo, hi]`.
///
/// Invariant: intervals are sorted by `lo`, and for consecutive intervals
/// `a`, `b` we always have `a.hi + 1 < b.lo` (no touching or overlapping
/// neighbours survive an insert).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<(u32, u32)>,
}

impl RangeSet {
    pub fn new() -> Self {
        RangeSet { ranges: Vec::new() }
    }

    pub fn single(value: u32) -> Self {
        let mut set = RangeSet::new();
        set.insert(value, value);
        set
    }

    pub fn from_ranges(ranges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut set = RangeSet::new();
        for (lo, hi) in ranges {
            set.insert(lo, hi);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Add `[lo, hi]`, merging with any interval that overlaps or is
    /// adjacent to it (differs by exactly 1).
    pub fn insert(&mut self, lo: u32, hi: u32) {
        debug_assert!(lo <= hi);
        let mut merged_lo = lo;
        let mut merged_hi = hi;
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for &(rlo, rhi) in &self.ranges {
            if is_adjacent_or_overlapping(merged_lo, merged_hi, rlo, rhi) {
                merged_lo = cmp::min(merged_lo, rlo);
                merged_hi = cmp::max(merged_hi, rhi);
            } else {
                kept.push((rlo, rhi));
            }
        }
        kept.push((merged_lo, merged_hi));
        kept.sort_unstable_by_key(|r| r.0);
        self.ranges = kept;
    }

    /// Union with another set, then compress adjacent pairs.
    pub fn insert_set(&mut self, other: &RangeSet) {
        for &(lo, hi) in &other.ranges {
            self.insert(lo, hi);
        }
        self.compress();
    }

    /// Merge any adjacent pairs left over from a bulk union. `insert` already
    /// keeps the invariant for single inserts; this is a defensive pass for
    /// callers that build `ranges` directly (e.g. deserializing a `RANGE`
    /// opcode) before ever calling `insert`.
    pub fn compress(&mut self) {
        if self.ranges.is_empty() {
            return;
        }
        self.ranges.sort_unstable_by_key(|r| r.0);
        let mut compressed: Vec<(u32, u32)> = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            match compressed.last_mut() {
                Some((_, last_hi)) if lo <= *last_hi || lo == *last_hi + 1 => {
                    *last_hi = cmp::max(*last_hi, hi);
                }
                _ => compressed.push((lo, hi)),
            }
        }
        self.ranges = compressed;
    }

    /// Replace this set with its complement relative to `[0, max]`, where
    /// `max` is the BMP ceiling without the `u` flag and the full Unicode
    /// range with it. Inverting the empty set yields the whole space.
    pub fn invert(&mut self, is_unicode: bool) {
        let max = if is_unicode { MAX_UNICODE } else { MAX_BMP };
        let mut inverted = Vec::new();
        let mut next_lo: u32 = 0;
        for &(lo, hi) in &self.ranges {
            if lo > next_lo {
                inverted.push((next_lo, lo - 1));
            }
            next_lo = hi.saturating_add(1);
            if hi == u32::MAX {
                next_lo = u32::MAX;
                break;
            }
        }
        if next_lo <= max {
            inverted.push((next_lo, max));
        }
        self.ranges = inverted;
    }

    pub fn contains(&self, value: u32) -> bool {
        self.ranges.iter().any(|&(lo, hi)| value >= lo && value <= hi)
    }

    /// Max `hi` across all intervals, or 0 if empty.
    pub fn highest(&self) -> u32 {
        self.ranges.last().map(|&(_, hi)| hi).unwrap_or(0)
    }

    pub fn fits_in_bmp(&self) -> bool {
        self.highest() <= MAX_BMP
    }
}

fn is_adjacent_or_overlapping(a_lo: u32, a_hi: u32, b_lo: u32, b_hi: u32) -> bool {
    let overlap = a_lo <= b_hi && b_lo <= a_hi;
    let adjacent = (a_hi != u32::MAX && a_hi + 1 == b_lo) || (b_hi != u32::MAX && b_hi + 1 == a_lo);
    overlap || adjacent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_overlapping_and_adjacent() {
        let mut set = RangeSet::new();
        set.insert(10, 20);
        set.insert(21, 30);
        assert_eq!(set.ranges(), &[(10, 30)]);
        set.insert(5, 9);
        assert_eq!(set.ranges(), &[(5, 30)]);
        set.insert(100, 200);
        assert_eq!(set.ranges(), &[(5, 30), (100, 200)]);
    }

    #[test]
    fn invert_is_involutive() {
        let mut set = RangeSet::from_ranges([(0x41, 0x5A), (0x100, 0x200)]);
        let original = set.clone();
        set.invert(false);
        set.invert(false);
        assert_eq!(set, original);
    }

    #[test]
    fn invert_empty_is_whole_space() {
        let mut set = RangeSet::new();
        set.invert(false);
        assert_eq!(set.ranges(), &[(0, MAX_BMP)]);

        let mut set = RangeSet::new();
        set.invert(true);
        assert_eq!(set.ranges(), &[(0, MAX_UNICODE)]);
    }

    #[test]
    fn highest_of_empty_is_zero() {
        assert_eq!(RangeSet::new().highest(), 0);
    }

    #[test]
    fn contains_checks_every_interval() {
        let set = RangeSet::from_ranges([(0, 9), (65, 90)]);
        assert!(set.contains(5));
        assert!(set.contains(80));
        assert!(!set.contains(50));
    }
}
