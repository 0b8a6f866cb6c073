#![forbid(unsafe_code)]

//! Sample station list and a flaky wrapper around it.

use std::cell::RefCell;

use futures::FutureExt;
use futures::future;
use rsel_core::{FetchError, Item, QueryKey};
use rsel_runtime::{FetchFuture, ItemSource, StaticSource};

const STATIONS: &[(&str, &str)] = &[
    ("MB-AP", "Maribor AP"),
    ("MB-TAB", "Maribor Tabor"),
    ("MB-MEL", "Maribor Melje"),
    ("MRF", "Marof"),
    ("PT", "Ptuj"),
    ("PT-GOR", "Ptujska Gora"),
    ("SB", "Slovenska Bistrica"),
    ("CE", "Celje"),
    ("LJ", "Ljubljana AP"),
    ("MS", "Murska Sobota"),
    ("KR", "Kranj"),
    ("NM", "Novo Mesto"),
];

/// Stations labelled `"name (code)"`, valued by code.
pub fn station_source(page_limit: Option<usize>) -> StaticSource<String> {
    let items = STATIONS
        .iter()
        .map(|(code, name)| Item::new((*code).to_string(), format!("{name} ({code})")))
        .collect();
    let source = StaticSource::new(items);
    match page_limit {
        Some(limit) => source.with_default_limit(limit),
        None => source,
    }
}

/// Fails the first fetch whose term equals `fail_term`, then delegates.
pub struct FlakySource<S> {
    inner: S,
    fail_term: RefCell<Option<String>>,
}

impl<S> FlakySource<S> {
    pub fn new(inner: S, fail_term: Option<String>) -> Self {
        Self {
            inner,
            fail_term: RefCell::new(fail_term.map(|t| t.to_lowercase())),
        }
    }
}

impl<S: ItemSource<String>> ItemSource<String> for FlakySource<S> {
    fn fetch_items(&self, key: &QueryKey) -> FetchFuture<String> {
        let mut fail_term = self.fail_term.borrow_mut();
        if fail_term.as_deref() == Some(key.term()) {
            *fail_term = None;
            return future::ready(Err(FetchError::Status {
                code: 503,
                message: "station index unavailable".into(),
            }))
            .boxed_local();
        }
        self.inner.fetch_items(key)
    }
}
