#![forbid(unsafe_code)]

//! Fenwick (binary indexed) tree over item sizes.
//!
//! Backs the virtualizer's offset math: the start offset of item `i` is the
//! sum of all sizes before it, and "which item covers offset X" is a
//! descending search over the same sums.
//!
//! # Operations
//!
//! | Operation | Time |
//! |-----------|------|
//! | `from_values` | O(n) |
//! | `set` / `get` / `prefix` | O(log n) |
//! | `find_prefix` | O(log n) |
//! | `push` | O(log n) |
//! | `truncate` | O(1) amortized |
//!
//! # Invariants
//!
//! 1. `prefix(i)` == sum of values `[0..=i]`.
//! 2. `sum_before(i)` == sum of values `[0..i)`.
//! 3. `find_prefix(t)` returns the largest `i` with `prefix(i) <= t`.
//! 4. Growing with `push` and shrinking with `truncate` keep 1-3 without a
//!    rebuild.

/// Prefix-sum tree of `u64` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenwickTree {
    /// 1-based; slot 0 is unused.
    tree: Vec<u64>,
}

impl Default for FenwickTree {
    fn default() -> Self {
        Self::new(0)
    }
}

#[inline]
fn lowbit(i: usize) -> usize {
    i & i.wrapping_neg()
}

impl FenwickTree {
    /// Tree of `len` zeros.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            tree: vec![0; len + 1],
        }
    }

    /// Build from values in linear time.
    #[must_use]
    pub fn from_values(values: &[u64]) -> Self {
        let n = values.len();
        let mut tree = Vec::with_capacity(n + 1);
        tree.push(0);
        tree.extend_from_slice(values);
        for i in 1..=n {
            let parent = i + lowbit(i);
            if parent <= n {
                tree[parent] += tree[i];
            }
        }
        Self { tree }
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len() - 1
    }

    /// Whether the tree holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the first `count` values.
    fn sum_first(&self, count: usize) -> u64 {
        let mut i = count.min(self.len());
        let mut sum = 0u64;
        while i > 0 {
            sum += self.tree[i];
            i -= lowbit(i);
        }
        sum
    }

    /// Value at `idx`; 0 when out of range.
    #[must_use]
    pub fn get(&self, idx: usize) -> u64 {
        if idx >= self.len() {
            return 0;
        }
        self.sum_first(idx + 1) - self.sum_first(idx)
    }

    /// Replace the value at `idx`. Out-of-range indices are ignored.
    pub fn set(&mut self, idx: usize, value: u64) {
        let n = self.len();
        if idx >= n {
            return;
        }
        // Sums are linear, so a wrapping delta lands on the exact new sums.
        let delta = value.wrapping_sub(self.get(idx));
        let mut i = idx + 1;
        while i <= n {
            self.tree[i] = self.tree[i].wrapping_add(delta);
            i += lowbit(i);
        }
    }

    /// Sum of values `[0..=idx]`, clamped to the last value.
    #[must_use]
    pub fn prefix(&self, idx: usize) -> u64 {
        self.sum_first(idx.saturating_add(1))
    }

    /// Sum of values `[0..idx)`.
    #[must_use]
    pub fn sum_before(&self, idx: usize) -> u64 {
        self.sum_first(idx)
    }

    /// Sum of every value.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.sum_first(self.len())
    }

    /// Largest `i` with `prefix(i) <= target`, or `None` if even the first
    /// value exceeds `target` (or the tree is empty).
    #[must_use]
    pub fn find_prefix(&self, target: u64) -> Option<usize> {
        let n = self.len();
        if n == 0 {
            return None;
        }
        let mut pos = 0usize;
        let mut remaining = target;
        let mut step = 1usize << (usize::BITS - 1 - n.leading_zeros());
        while step > 0 {
            let next = pos + step;
            if next <= n && self.tree[next] <= remaining {
                pos = next;
                remaining -= self.tree[next];
            }
            step >>= 1;
        }
        pos.checked_sub(1)
    }

    /// Append one value.
    pub fn push(&mut self, value: u64) {
        let idx = self.len() + 1;
        // Node idx covers (idx - lowbit(idx), idx]; everything but the new
        // value is already summed by the existing prefix.
        let covered = self.sum_first(idx - 1) - self.sum_first(idx - lowbit(idx));
        self.tree.push(value + covered);
    }

    /// Drop values from `len` onward.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.tree.truncate(len + 1);
        }
    }

    /// Grow with `fill` or shrink to `len` values.
    pub fn resize(&mut self, len: usize, fill: u64) {
        if len <= self.len() {
            self.truncate(len);
            return;
        }
        self.tree.reserve(len - self.len());
        while self.len() < len {
            self.push(fill);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn naive_prefix(values: &[u64], idx: usize) -> u64 {
        values[..=idx].iter().sum()
    }

    #[test]
    fn prefix_sums_of_uniform_sizes() {
        let tree = FenwickTree::from_values(&[40; 10]);
        assert_eq!(tree.prefix(0), 40);
        assert_eq!(tree.prefix(9), 400);
        assert_eq!(tree.sum_before(0), 0);
        assert_eq!(tree.sum_before(5), 200);
        assert_eq!(tree.total(), 400);
    }

    #[test]
    fn set_changes_only_later_prefixes() {
        let mut tree = FenwickTree::from_values(&[40; 8]);
        tree.set(3, 100);
        assert_eq!(tree.get(3), 100);
        assert_eq!(tree.sum_before(3), 120);
        assert_eq!(tree.sum_before(4), 220);
        assert_eq!(tree.total(), 380);
        tree.set(3, 10);
        assert_eq!(tree.total(), 290);
    }

    #[test]
    fn find_prefix_locates_covering_item() {
        let tree = FenwickTree::from_values(&[10, 20, 30]);
        assert_eq!(tree.find_prefix(5), None);
        assert_eq!(tree.find_prefix(10), Some(0));
        assert_eq!(tree.find_prefix(29), Some(0));
        assert_eq!(tree.find_prefix(30), Some(1));
        assert_eq!(tree.find_prefix(1_000), Some(2));
        assert_eq!(FenwickTree::new(0).find_prefix(0), None);
    }

    #[test]
    fn push_matches_bulk_build() {
        let values = [5, 1, 7, 3, 9, 2, 8, 4, 6];
        let mut grown = FenwickTree::default();
        for v in values {
            grown.push(v);
        }
        assert_eq!(grown, FenwickTree::from_values(&values));
    }

    #[test]
    fn resize_grows_with_fill_and_truncates() {
        let mut tree = FenwickTree::from_values(&[1, 2, 3]);
        tree.resize(5, 40);
        assert_eq!(tree.total(), 86);
        tree.resize(2, 0);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.total(), 3);
        assert_eq!(tree.get(7), 0);
    }

    proptest! {
        #[test]
        fn prefix_matches_naive(
            values in proptest::collection::vec(0u64..500, 1..200),
            edits in proptest::collection::vec((any::<prop::sample::Index>(), 0u64..500), 0..30),
        ) {
            let mut values = values;
            let mut tree = FenwickTree::from_values(&values);
            for (at, v) in edits {
                let i = at.index(values.len());
                values[i] = v;
                tree.set(i, v);
            }
            for i in 0..values.len() {
                prop_assert_eq!(tree.prefix(i), naive_prefix(&values, i));
            }
        }

        #[test]
        fn find_prefix_matches_linear_scan(
            values in proptest::collection::vec(1u64..100, 1..150),
            target in 0u64..20_000,
        ) {
            let tree = FenwickTree::from_values(&values);
            let expected = (0..values.len())
                .filter(|&i| naive_prefix(&values, i) <= target)
                .last();
            prop_assert_eq!(tree.find_prefix(target), expected);
        }

        #[test]
        fn push_then_truncate_keeps_sums(
            values in proptest::collection::vec(0u64..1_000, 0..100),
            keep in 0usize..100,
        ) {
            let mut tree = FenwickTree::default();
            for v in &values {
                tree.push(*v);
            }
            let keep = keep.min(values.len());
            tree.truncate(keep);
            prop_assert_eq!(tree.total(), values[..keep].iter().sum::<u64>());
        }
    }
}
