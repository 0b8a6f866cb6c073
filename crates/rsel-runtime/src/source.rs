#![forbid(unsafe_code)]

//! The fetch boundary.
//!
//! [`ItemSource`] is the only I/O the selector performs. Implementations wrap
//! whatever transport the host uses; the selector only needs a future that
//! eventually yields ordered items or a [`FetchError`]. Futures are
//! `LocalBoxFuture` because the whole selector lives on one thread.

use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use rsel_core::{FetchError, Item, ItemValue, QueryKey};

/// Future returned by a source: ordered items, or a transient failure.
pub type FetchFuture<V> = LocalBoxFuture<'static, Result<Vec<Item<V>>, FetchError>>;

/// Something that can answer a normalized query.
pub trait ItemSource<V: ItemValue> {
    /// Start fetching the items matching `key`.
    ///
    /// Called at most once per in-flight key; the returned future is polled
    /// by the request controller and must not borrow the source.
    fn fetch_items(&self, key: &QueryKey) -> FetchFuture<V>;
}

/// Adapts a closure into an [`ItemSource`].
#[derive(Debug, Clone, Copy)]
pub struct FnSource<F>(pub F);

impl<V, F> ItemSource<V> for FnSource<F>
where
    V: ItemValue,
    F: Fn(&QueryKey) -> FetchFuture<V>,
{
    fn fetch_items(&self, key: &QueryKey) -> FetchFuture<V> {
        (self.0)(key)
    }
}

impl<V: ItemValue, S: ItemSource<V> + ?Sized> ItemSource<V> for Rc<S> {
    fn fetch_items(&self, key: &QueryKey) -> FetchFuture<V> {
        (**self).fetch_items(key)
    }
}

/// In-memory source over a fixed option list.
///
/// Matches by case-insensitive substring of the label and honors the
/// `offset` / `limit` params of the key, falling back to its own default
/// limit. Futures resolve immediately.
#[derive(Debug, Clone)]
pub struct StaticSource<V> {
    items: Rc<[Item<V>]>,
    default_limit: Option<usize>,
}

impl<V: ItemValue> StaticSource<V> {
    /// Serve `items` in the given order.
    #[must_use]
    pub fn new(items: Vec<Item<V>>) -> Self {
        Self {
            items: Rc::from(items),
            default_limit: None,
        }
    }

    /// Cap results when the key carries no `limit` param.
    #[must_use]
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = Some(limit);
        self
    }

    /// Number of options served.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the option list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Synchronous matching used by the fetch future.
    pub fn matching(&self, key: &QueryKey) -> Result<Vec<Item<V>>, FetchError> {
        let offset = parse_param(key, "offset")?.unwrap_or(0);
        let limit = parse_param(key, "limit")?.or(self.default_limit);
        let term = key.term();
        let matches = self
            .items
            .iter()
            .filter(|item| term.is_empty() || item.label().to_lowercase().contains(term))
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matches)
    }
}

impl<V: ItemValue> ItemSource<V> for StaticSource<V> {
    fn fetch_items(&self, key: &QueryKey) -> FetchFuture<V> {
        future::ready(self.matching(key)).boxed_local()
    }
}

fn parse_param(key: &QueryKey, name: &str) -> Result<Option<usize>, FetchError> {
    match key.param(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| FetchError::Decode(format!("{name} must be an integer, got '{raw}'"))),
    }
}
