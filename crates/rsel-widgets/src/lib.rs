#![forbid(unsafe_code)]

//! Widgets for the remote-search selector.
//!
//! - [`Virtualizer`]: windowed range math over a [`FenwickTree`] of sizes.
//! - [`SelectionModel`]: value-keyed single selection, controlled or not.
//! - [`RemoteSelect`]: the composed view model a renderer drives.

pub mod fenwick;
pub mod remote_select;
pub mod selection;
pub mod virtualized;

pub use fenwick::FenwickTree;
pub use remote_select::{Affordance, RemoteSelect, Row};
pub use selection::SelectionModel;
pub use virtualized::{VirtualItem, Virtualizer, VisibleRange};
