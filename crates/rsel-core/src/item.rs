#![forbid(unsafe_code)]

//! Selectable items.
//!
//! An [`Item`] pairs an opaque identity (`value`) with a display `label`.
//! Identity is the only thing that matters for equality: two items with the
//! same value and different labels are the same item, which is what lets a
//! selection survive a re-fetch that relabels rows.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Bounds for an item's identity.
///
/// Blanket-implemented, so plain `String`, integers or small newtypes work
/// out of the box.
pub trait ItemValue: Clone + Eq + Hash + fmt::Debug + 'static {}

impl<T> ItemValue for T where T: Clone + Eq + Hash + fmt::Debug + 'static {}

/// A selectable entry in a result list.
#[derive(Debug, Clone)]
pub struct Item<V = String> {
    value: V,
    label: String,
}

impl<V> Item<V> {
    /// Create an item from its identity and display label.
    #[must_use]
    pub fn new(value: V, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }

    /// The item's identity.
    #[inline]
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The item's display label.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Split into `(value, label)`.
    #[must_use]
    pub fn into_parts(self) -> (V, String) {
        (self.value, self.label)
    }
}

impl<V: PartialEq> PartialEq for Item<V> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<V: Eq> Eq for Item<V> {}

impl<V: Hash> Hash for Item<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<V> fmt::Display for Item<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
