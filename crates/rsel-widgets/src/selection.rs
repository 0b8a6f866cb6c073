#![forbid(unsafe_code)]

//! Single-value selection, keyed by item value.
//!
//! The model stores the selected *value*, never a position or a reference
//! into a result list, so a selection survives any number of result-list
//! replacements and matches a relabelled item with the same value.
//!
//! Two ownership modes:
//!
//! - **Uncontrolled**: the model owns the value and writes it on
//!   `select` / `toggle` / `clear`, then notifies the optional callback.
//! - **Controlled**: the caller owns the value. Mutations only propose a
//!   change through the callback; nothing changes until the caller writes
//!   it back with [`SelectionModel::set_value`].

use std::fmt;

use rsel_core::{Item, ItemValue};
use tracing::trace;

type ChangeCallback<V> = Box<dyn FnMut(Option<&Item<V>>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    Uncontrolled,
    Controlled,
}

/// Tracks the selected value and the label it was selected with.
pub struct SelectionModel<V: ItemValue> {
    ownership: Ownership,
    value: Option<V>,
    /// Label of the last item selected, tagged with its value.
    label: Option<(V, String)>,
    on_change: Option<ChangeCallback<V>>,
}

impl<V: ItemValue> fmt::Debug for SelectionModel<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionModel")
            .field("ownership", &self.ownership)
            .field("value", &self.value)
            .field("label", &self.selected_label())
            .field("has_callback", &self.on_change.is_some())
            .finish()
    }
}

impl<V: ItemValue> Default for SelectionModel<V> {
    fn default() -> Self {
        Self::uncontrolled()
    }
}

impl<V: ItemValue> SelectionModel<V> {
    /// Internally owned, nothing selected.
    #[must_use]
    pub fn uncontrolled() -> Self {
        Self {
            ownership: Ownership::Uncontrolled,
            value: None,
            label: None,
            on_change: None,
        }
    }

    /// Externally owned: `value` is the caller's current value and
    /// `on_change` receives every proposed change.
    #[must_use]
    pub fn controlled(value: Option<V>, on_change: impl FnMut(Option<&Item<V>>) + 'static) -> Self {
        Self {
            ownership: Ownership::Controlled,
            value,
            label: None,
            on_change: Some(Box::new(on_change)),
        }
    }

    /// Start from an already selected item.
    #[must_use]
    pub fn with_initial(mut self, item: &Item<V>) -> Self {
        self.value = Some(item.value().clone());
        self.remember(item);
        self
    }

    /// Notify `on_change` after every uncontrolled change.
    #[must_use]
    pub fn with_on_change(mut self, on_change: impl FnMut(Option<&Item<V>>) + 'static) -> Self {
        self.on_change = Some(Box::new(on_change));
        self
    }

    /// Select `item`. Returns whether the selection changed (or, when
    /// controlled, whether a change was proposed).
    pub fn select(&mut self, item: &Item<V>) -> bool {
        self.remember(item);
        if self.is_selected(item) {
            return false;
        }
        self.commit(Some(item))
    }

    /// Clear if `item` is selected, otherwise select it.
    pub fn toggle(&mut self, item: &Item<V>) -> bool {
        if self.is_selected(item) {
            self.commit(None)
        } else {
            self.select(item)
        }
    }

    /// Clear the selection.
    pub fn clear(&mut self) -> bool {
        if self.value.is_none() {
            return false;
        }
        self.commit(None)
    }

    /// Write the caller-owned value (controlled mode), or overwrite the
    /// internal one without notifying.
    pub fn set_value(&mut self, value: Option<V>) {
        self.value = value;
    }

    /// Whether `item` is the selected one. Compares by value only.
    #[must_use]
    pub fn is_selected(&self, item: &Item<V>) -> bool {
        self.is_selected_value(item.value())
    }

    #[must_use]
    pub fn is_selected_value(&self, value: &V) -> bool {
        self.value.as_ref() == Some(value)
    }

    #[must_use]
    pub fn selected_value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Label the current value was selected with, if known.
    #[must_use]
    pub fn selected_label(&self) -> Option<&str> {
        match (&self.value, &self.label) {
            (Some(value), Some((labelled, label))) if value == labelled => Some(label),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_controlled(&self) -> bool {
        self.ownership == Ownership::Controlled
    }

    fn remember(&mut self, item: &Item<V>) {
        self.label = Some((item.value().clone(), item.label().to_owned()));
    }

    fn commit(&mut self, next: Option<&Item<V>>) -> bool {
        trace!(
            controlled = self.is_controlled(),
            selected = next.map(Item::label),
            "selection change"
        );
        if self.ownership == Ownership::Uncontrolled {
            self.value = next.map(|item| item.value().clone());
        }
        if let Some(callback) = self.on_change.as_mut() {
            callback(next);
        }
        true
    }
}
