#![forbid(unsafe_code)]

//! Windowed rendering math for long result lists.
//!
//! A [`Virtualizer`] knows how many items exist, how big each one is (an
//! estimate until measured), the viewport size, the scroll offset and the
//! overscan. From that it derives a [`VisibleRange`]: the contiguous index
//! interval that covers the viewport, widened by the overscan, with each
//! item's absolute start offset and the total content size.
//!
//! Sizes live in a [`FenwickTree`], so offset lookups stay logarithmic no
//! matter how many items there are or how many have been measured.
//!
//! # Invariants
//!
//! 1. `offset_of(i + 1) == offset_of(i) + size_of(i)`.
//! 2. `scroll_offset() <= max_scroll_offset()` after every mutation.
//! 3. `range()` is within `0..item_count()` and contains every item that
//!    intersects `[scroll, scroll + viewport)`.
//! 4. Measuring item `i` moves only offsets of items after `i`, by exactly
//!    the size delta.
//!
//! # Example
//!
//! ```
//! use rsel_widgets::Virtualizer;
//!
//! let mut virt = Virtualizer::new(40, 400, 2);
//! virt.set_item_count(1_000);
//! virt.set_scroll_offset(800);
//! let range = virt.range();
//! assert_eq!(range.visible, 20..30);
//! assert_eq!((range.start, range.end), (18, 32));
//! ```

use std::ops::Range;

use rsel_core::SelectorConfig;

use crate::fenwick::FenwickTree;

/// One materialized item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualItem {
    pub index: usize,
    /// Absolute offset of the item's leading edge.
    pub start: u64,
    pub size: u32,
}

impl VirtualItem {
    /// Offset just past the item.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start + u64::from(self.size)
    }
}

/// Result of a range computation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisibleRange {
    /// First materialized index (overscan included).
    pub start: usize,
    /// One past the last materialized index (overscan included).
    pub end: usize,
    /// Items that actually intersect the viewport.
    pub visible: Range<usize>,
    pub items: Vec<VirtualItem>,
    pub total_size: u64,
    /// Scroll offset the range was computed for.
    pub scroll_offset: u64,
}

impl VisibleRange {
    /// Number of materialized items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether nothing is materialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Materialized indices.
    #[must_use]
    pub fn indices(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Scroll and size bookkeeping for one list.
#[derive(Debug, Clone)]
pub struct Virtualizer {
    tree: FenwickTree,
    sizes: Vec<u32>,
    measured: Vec<bool>,
    estimate: u32,
    viewport: u32,
    overscan: usize,
    scroll: u64,
}

impl Default for Virtualizer {
    fn default() -> Self {
        Self::from_config(&SelectorConfig::default())
    }
}

impl Virtualizer {
    /// Empty list with the given size estimate, viewport and overscan.
    #[must_use]
    pub fn new(estimate: u32, viewport: u32, overscan: usize) -> Self {
        Self {
            tree: FenwickTree::new(0),
            sizes: Vec::new(),
            measured: Vec::new(),
            estimate,
            viewport,
            overscan,
            scroll: 0,
        }
    }

    /// Empty list sized from a selector config.
    #[must_use]
    pub fn from_config(config: &SelectorConfig) -> Self {
        Self::new(config.item_size, config.viewport_size, config.overscan)
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.sizes.len()
    }

    #[must_use]
    pub fn estimate(&self) -> u32 {
        self.estimate
    }

    #[must_use]
    pub fn viewport_size(&self) -> u32 {
        self.viewport
    }

    #[must_use]
    pub fn overscan(&self) -> usize {
        self.overscan
    }

    #[must_use]
    pub fn scroll_offset(&self) -> u64 {
        self.scroll
    }

    /// Grow with estimated items or shrink; surviving measurements are kept.
    pub fn set_item_count(&mut self, count: usize) {
        let current = self.item_count();
        if count == current {
            return;
        }
        self.tree.resize(count, u64::from(self.estimate));
        self.sizes.resize(count, self.estimate);
        self.measured.resize(count, false);
        self.clamp_scroll();
    }

    /// Forget every measurement, keeping the item count.
    pub fn reset_measurements(&mut self) {
        self.rebuild(self.item_count());
        self.clamp_scroll();
    }

    /// Start over with `count` unmeasured items scrolled to the top.
    pub fn replace_items(&mut self, count: usize) {
        self.rebuild(count);
        self.scroll = 0;
    }

    fn rebuild(&mut self, count: usize) {
        self.sizes = vec![self.estimate; count];
        self.measured = vec![false; count];
        self.tree = FenwickTree::from_values(&vec![u64::from(self.estimate); count]);
    }

    /// Size of item `index` (estimate when unmeasured or out of range).
    #[must_use]
    pub fn size_of(&self, index: usize) -> u32 {
        self.sizes.get(index).copied().unwrap_or(self.estimate)
    }

    /// Whether `measure` has been called for `index`.
    #[must_use]
    pub fn is_measured(&self, index: usize) -> bool {
        self.measured.get(index).copied().unwrap_or(false)
    }

    /// Record the rendered size of `index`. Returns whether the layout moved.
    ///
    /// An item lying entirely above the viewport shifts the scroll offset by
    /// the same delta, so the content under the viewport stays put.
    pub fn measure(&mut self, index: usize, size: u32) -> bool {
        let Some(old) = self.sizes.get(index).copied() else {
            return false;
        };
        self.measured[index] = true;
        if old == size {
            return false;
        }
        let start = self.offset_of(index);
        let above_viewport = start + u64::from(old) <= self.scroll;
        self.sizes[index] = size;
        self.tree.set(index, u64::from(size));
        if above_viewport {
            self.scroll = if size > old {
                self.scroll + u64::from(size - old)
            } else {
                self.scroll.saturating_sub(u64::from(old - size))
            };
        }
        self.clamp_scroll();
        true
    }

    pub fn set_viewport(&mut self, viewport: u32) {
        self.viewport = viewport;
        self.clamp_scroll();
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.overscan = overscan;
    }

    /// Scroll to `offset`, clamped so the last item ends at the viewport's
    /// trailing edge.
    pub fn set_scroll_offset(&mut self, offset: u64) {
        self.scroll = offset;
        self.clamp_scroll();
    }

    pub fn scroll_by(&mut self, delta: i64) {
        let target = if delta >= 0 {
            self.scroll.saturating_add(delta.unsigned_abs())
        } else {
            self.scroll.saturating_sub(delta.unsigned_abs())
        };
        self.set_scroll_offset(target);
    }

    /// Minimal scroll that brings `index` fully into view.
    pub fn scroll_to_index(&mut self, index: usize) {
        if index >= self.item_count() {
            return;
        }
        let start = self.offset_of(index);
        let end = start + u64::from(self.size_of(index));
        let viewport = u64::from(self.viewport);
        if start < self.scroll {
            self.scroll = start;
        } else if end > self.scroll + viewport {
            self.scroll = end.saturating_sub(viewport);
        }
        self.clamp_scroll();
    }

    /// Start offset of `index`; `total_size()` for `index >= item_count()`.
    #[must_use]
    pub fn offset_of(&self, index: usize) -> u64 {
        self.tree.sum_before(index)
    }

    /// Item covering `offset`; the last item for offsets past the end.
    #[must_use]
    pub fn index_at_offset(&self, offset: u64) -> Option<usize> {
        let count = self.item_count();
        if count == 0 {
            return None;
        }
        if offset >= self.total_size() {
            return Some(count - 1);
        }
        Some(self.tree.find_prefix(offset).map_or(0, |i| (i + 1).min(count - 1)))
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.tree.total()
    }

    #[must_use]
    pub fn max_scroll_offset(&self) -> u64 {
        self.total_size().saturating_sub(u64::from(self.viewport))
    }

    /// Compute the materialized range for the current state.
    #[must_use]
    pub fn range(&self) -> VisibleRange {
        let count = self.item_count();
        let total_size = self.total_size();
        let scroll = self.scroll.min(self.max_scroll_offset());
        let Some(first) = self.index_at_offset(scroll) else {
            return VisibleRange {
                total_size,
                scroll_offset: scroll,
                ..VisibleRange::default()
            };
        };
        let visible_end = if self.viewport == 0 {
            first
        } else {
            self.index_at_offset(scroll + u64::from(self.viewport) - 1)
                .map_or(first, |last| last + 1)
        };
        let start = first.saturating_sub(self.overscan);
        let end = visible_end.saturating_add(self.overscan).min(count);

        let mut offset = self.offset_of(start);
        let items = (start..end)
            .map(|index| {
                let size = self.sizes[index];
                let item = VirtualItem {
                    index,
                    start: offset,
                    size,
                };
                offset += u64::from(size);
                item
            })
            .collect();

        VisibleRange {
            start,
            end,
            visible: first..visible_end,
            items,
            total_size,
            scroll_offset: scroll,
        }
    }

    fn clamp_scroll(&mut self) {
        self.scroll = self.scroll.min(self.max_scroll_offset());
    }
}
