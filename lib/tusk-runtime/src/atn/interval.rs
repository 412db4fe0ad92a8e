/// An ordered set of integers stored as disjoint, sorted, inclusive ranges.
///
/// Used for character classes in lexer ATNs and for token-type sets in parser ATNs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<(i32, i32)>,
}

impl IntervalSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single value.
    pub fn add(&mut self, value: i32) {
        self.add_range(value, value);
    }

    /// Adds every value in `from..=to`. Empty ranges are ignored.
    pub fn add_range(&mut self, from: i32, to: i32) {
        if to < from {
            return;
        }

        // Find the first interval that could touch the new one, then swallow everything it overlaps or abuts.
        let mut start = from;
        let mut end = to;
        let first = self.intervals.partition_point(|&(_, b)| b.saturating_add(1) < start);
        let mut last = first;
        while last < self.intervals.len() && self.intervals[last].0 <= end.saturating_add(1) {
            start = start.min(self.intervals[last].0);
            end = end.max(self.intervals[last].1);
            last += 1;
        }
        self.intervals.splice(first..last, std::iter::once((start, end)));
    }

    /// Returns `true` if the set contains `value`.
    pub fn contains(&self, value: i32) -> bool {
        let idx = self.intervals.partition_point(|&(_, b)| b < value);
        idx < self.intervals.len() && self.intervals[idx].0 <= value
    }

    /// Returns `true` if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Returns the ranges making up the set, in ascending order.
    pub fn intervals(&self) -> &[(i32, i32)] {
        &self.intervals
    }

    /// Iterates over every member in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|&(a, b)| a..=b)
    }
}

#[cfg(test)]
mod tests {
    use proptest::{collection::vec as arb_vec, prelude::*};

    use super::*;

    #[test]
    fn merges_adjacent_and_overlapping_ranges() {
        let mut set = IntervalSet::new();
        set.add_range(10, 20);
        set.add_range(30, 40);
        set.add_range(21, 29);
        assert_eq!(set.intervals(), &[(10, 40)]);

        set.add(5);
        set.add_range(0, 4);
        assert_eq!(set.intervals(), &[(0, 5), (10, 40)]);

        set.add_range(3, 12);
        assert_eq!(set.intervals(), &[(0, 40)]);
    }

    #[test]
    fn eof_and_negative_members() {
        let mut set = IntervalSet::new();
        set.add(-1);
        set.add_range(1, 3);

        assert!(set.contains(-1));
        assert!(!set.contains(0));
        assert!(set.contains(2));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![-1, 1, 2, 3]);
    }

    proptest! {
        #[test]
        fn property_membership_matches_naive_set(ranges in arb_vec((0i32..200, 0i32..20), 0..12), value in 0i32..240) {
            let mut set = IntervalSet::new();
            let mut naive = std::collections::BTreeSet::new();
            for (start, len) in ranges {
                set.add_range(start, start + len);
                naive.extend(start..=start + len);
            }

            assert_eq!(set.contains(value), naive.contains(&value));
            assert_eq!(set.iter().collect::<Vec<_>>(), naive.into_iter().collect::<Vec<_>>());

            for pair in set.intervals().windows(2) {
                // Ranges stay disjoint and never abut.
                assert!(pair[0].1 + 1 < pair[1].0);
            }
        }
    }
}
