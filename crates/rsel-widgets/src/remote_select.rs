#![forbid(unsafe_code)]

//! Remote-search selector view model.
//!
//! Composes the pieces into the state a rendering layer needs:
//!
//! ```text
//! handle_input ──► KeyNormalizer ──► DebounceScheduler
//!                                          │ tick
//!                                          ▼
//!                    RequestController ◄── query(key)
//!                          │ answer
//!                          ▼
//!       Virtualizer ◄── results ──► SelectionModel ──► rows()
//! ```
//!
//! The host owns the loop: it forwards input, calls `tick_at` (or awaits
//! `settle_next`) and renders `rows()` plus `affordance()`. Nothing here
//! spawns, sleeps or blocks.
//!
//! # Invariants
//!
//! 1. Rows only ever come from the answer for the current key.
//! 2. `Empty` (resolved, zero items) and `Error` (failed) are distinct
//!    affordances.
//! 3. A malformed input never reaches the cache; it cancels the pending
//!    debounce and is reported by `input_error()`.
//! 4. After `dispose`, no query is issued and nothing is surfaced.

use std::rc::Rc;
use std::time::{Duration, Instant};

use rsel_core::{
    ConfigError, Item, ItemValue, KeyNormalizer, QueryError, QueryInput, QueryKey, SelectorConfig,
};
use rsel_runtime::{
    Answer, CacheStats, DebounceScheduler, FetchStatus, ItemSource, Observable, RequestController,
    Settled,
};
use tracing::{debug, info};

use crate::selection::SelectionModel;
use crate::virtualized::{Virtualizer, VisibleRange};

/// What the list area should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affordance {
    /// A fetch for the current key is running.
    Loading,
    /// At least one item to show.
    Results,
    /// The fetch succeeded with zero items.
    Empty,
    /// The fetch failed; offer a retry.
    Error,
}

/// A materialized row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<V> {
    pub index: usize,
    pub item: Item<V>,
    pub start: u64,
    pub size: u32,
    pub selected: bool,
    pub highlighted: bool,
}

/// Searchable single-select backed by an [`ItemSource`].
#[derive(Debug)]
pub struct RemoteSelect<V: ItemValue, S: ItemSource<V>> {
    config: SelectorConfig,
    template: QueryInput,
    normalizer: KeyNormalizer,
    debounce: DebounceScheduler<QueryKey>,
    controller: RequestController<V, S>,
    virtualizer: Virtualizer,
    selection: SelectionModel<V>,
    results: Option<Rc<[Item<V>]>>,
    input: String,
    input_error: Option<QueryError>,
    highlight: Option<usize>,
    open: bool,
    disposed: bool,
}

impl<V: ItemValue, S: ItemSource<V>> RemoteSelect<V, S> {
    /// Build a selector over `source`.
    ///
    /// `template` supplies the scope and fixed filters; the typed text
    /// becomes its term. Returns every configuration violation at once.
    pub fn new(
        source: S,
        template: QueryInput,
        config: SelectorConfig,
    ) -> Result<Self, Vec<ConfigError>> {
        config.validate()?;
        Ok(Self {
            normalizer: config.normalizer(),
            debounce: DebounceScheduler::new(config.debounce),
            controller: RequestController::new(source, config.cache_capacity),
            virtualizer: Virtualizer::from_config(&config),
            selection: SelectionModel::uncontrolled(),
            results: None,
            input: String::new(),
            input_error: None,
            highlight: None,
            open: false,
            disposed: false,
            template,
            config,
        })
    }

    /// Replace the selection model (e.g. with a controlled one).
    #[must_use]
    pub fn with_selection(mut self, selection: SelectionModel<V>) -> Self {
        self.selection = selection;
        self
    }

    // --- open / close -----------------------------------------------------

    /// Open the list. Without an active query, the current input is queried
    /// right away (no debounce), so a cached list shows immediately.
    pub fn open(&mut self) {
        if self.disposed || self.open {
            return;
        }
        self.open = true;
        if self.controller.current_key().is_none() && !self.debounce.is_pending() {
            match self.key_for(&self.input) {
                Ok(key) => {
                    self.controller.query(key);
                }
                Err(error) => self.input_error = Some(error),
            }
        }
        self.sync_results();
    }

    /// Close the list; a pending debounced query still fires.
    pub fn close(&mut self) {
        self.open = false;
        self.highlight = None;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    // --- input / tick -----------------------------------------------------

    /// [`handle_input_at`](Self::handle_input_at) as of now.
    pub fn handle_input(&mut self, text: &str) -> Result<(), QueryError> {
        self.handle_input_at(text, Instant::now())
    }

    /// Record typed `text` and schedule its query after the quiet period.
    ///
    /// Malformed input cancels any pending query and is returned (and kept
    /// for `input_error`).
    pub fn handle_input_at(&mut self, text: &str, now: Instant) -> Result<(), QueryError> {
        if self.disposed {
            return Ok(());
        }
        self.input = text.to_owned();
        self.open = true;
        match self.key_for(text) {
            Ok(key) => {
                self.input_error = None;
                self.debounce.schedule_at(key, now);
                Ok(())
            }
            Err(error) => {
                debug!(%error, "input rejected");
                self.debounce.cancel();
                self.input_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// [`tick_at`](Self::tick_at) as of now.
    pub fn tick(&mut self) -> Vec<Settled> {
        self.tick_at(Instant::now())
    }

    /// Fire the debounced query if due and apply ready completions.
    pub fn tick_at(&mut self, now: Instant) -> Vec<Settled> {
        if let Some(key) = self.debounce.poll_at(now) {
            debug!(key = %key, "debounced query fired");
            self.controller.query(key);
        }
        let settled = self.controller.poll_completions();
        self.sync_results();
        settled
    }

    /// Await the next fetch completion and apply it.
    pub async fn settle_next(&mut self) -> Option<Settled> {
        let settled = self.controller.next_completion().await;
        self.sync_results();
        settled
    }

    /// How long the host may wait before the next `tick_at` matters.
    #[must_use]
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.debounce.time_until_fire(now)
    }

    // --- status -----------------------------------------------------------

    #[must_use]
    pub fn status(&self) -> FetchStatus {
        self.controller.status()
    }

    /// What the list area should render, `None` while idle.
    #[must_use]
    pub fn affordance(&self) -> Option<Affordance> {
        self.controller.observe().with(|answer| match answer {
            Answer::Idle => None,
            Answer::Pending { .. } => Some(Affordance::Loading),
            Answer::Resolved { items, .. } if items.is_empty() => Some(Affordance::Empty),
            Answer::Resolved { .. } => Some(Affordance::Results),
            Answer::Failed { .. } => Some(Affordance::Error),
        })
    }

    /// Published answer.
    #[must_use]
    pub fn answer(&self) -> Answer<V> {
        self.controller.answer()
    }

    /// Subscribe here to re-render on answer changes.
    #[must_use]
    pub fn observe_answer(&self) -> &Observable<Answer<V>> {
        self.controller.observe()
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn input_error(&self) -> Option<&QueryError> {
        self.input_error.as_ref()
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.controller.stats()
    }

    #[must_use]
    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    // --- rows / scrolling -------------------------------------------------

    /// Items of the current answer.
    #[must_use]
    pub fn results(&self) -> &[Item<V>] {
        self.results.as_deref().unwrap_or(&[])
    }

    /// Visible rows, overscan included.
    #[must_use]
    pub fn rows(&self) -> Vec<Row<V>> {
        let items = self.results();
        self.virtualizer
            .range()
            .items
            .into_iter()
            .filter_map(|v| {
                let item = items.get(v.index)?;
                Some(Row {
                    index: v.index,
                    item: item.clone(),
                    start: v.start,
                    size: v.size,
                    selected: self.selection.is_selected(item),
                    highlighted: self.highlight == Some(v.index),
                })
            })
            .collect()
    }

    /// Raw range for hosts that render from `results()` themselves.
    #[must_use]
    pub fn visible_range(&self) -> VisibleRange {
        self.virtualizer.range()
    }

    /// Scrollable extent.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.virtualizer.total_size()
    }

    pub fn set_viewport(&mut self, viewport: u32) {
        self.virtualizer.set_viewport(viewport);
    }

    pub fn set_scroll_offset(&mut self, offset: u64) {
        self.virtualizer.set_scroll_offset(offset);
    }

    pub fn scroll_by(&mut self, delta: i64) {
        self.virtualizer.scroll_by(delta);
    }

    /// Report a rendered row size.
    pub fn measure(&mut self, index: usize, size: u32) -> bool {
        self.virtualizer.measure(index, size)
    }

    #[must_use]
    pub fn virtualizer(&self) -> &Virtualizer {
        &self.virtualizer
    }

    // --- keyboard ---------------------------------------------------------

    #[must_use]
    pub fn highlighted(&self) -> Option<usize> {
        self.highlight
    }

    /// Move the highlight down, stopping at the last row.
    pub fn highlight_next(&mut self) -> Option<usize> {
        let last = self.results().len().checked_sub(1)?;
        let next = self.highlight.map_or(0, |h| (h + 1).min(last));
        self.set_highlight(next)
    }

    /// Move the highlight up, stopping at the first row.
    pub fn highlight_previous(&mut self) -> Option<usize> {
        let last = self.results().len().checked_sub(1)?;
        let prev = self.highlight.map_or(last, |h| h.saturating_sub(1));
        self.set_highlight(prev)
    }

    /// Select the highlighted row, if any.
    pub fn select_highlighted(&mut self) -> bool {
        match self.highlight {
            Some(index) => self.select_index(index),
            None => false,
        }
    }

    fn set_highlight(&mut self, index: usize) -> Option<usize> {
        self.highlight = Some(index);
        self.virtualizer.scroll_to_index(index);
        self.highlight
    }

    // --- selection --------------------------------------------------------

    /// Select the row at `index`, then close and clear the search.
    pub fn select_index(&mut self, index: usize) -> bool {
        let Some(item) = self.results().get(index).cloned() else {
            return false;
        };
        let changed = self.selection.select(&item);
        info!(label = item.label(), "item selected");
        self.finish_choice();
        changed
    }

    /// Toggle the row at `index`, then close and clear the search.
    pub fn toggle_index(&mut self, index: usize) -> bool {
        let Some(item) = self.results().get(index).cloned() else {
            return false;
        };
        let changed = self.selection.toggle(&item);
        self.finish_choice();
        changed
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionModel<V> {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionModel<V> {
        &mut self.selection
    }

    /// Text for the closed trigger: the selected label or `placeholder`.
    #[must_use]
    pub fn trigger_label<'a>(&'a self, placeholder: &'a str) -> &'a str {
        self.selection.selected_label().unwrap_or(placeholder)
    }

    // --- lifecycle --------------------------------------------------------

    /// Re-issue the current query after a failure.
    pub fn retry(&mut self) -> bool {
        let retried = self.controller.retry().is_some();
        self.sync_results();
        retried
    }

    /// Cancel the debounce and stop surfacing answers.
    ///
    /// Fetches already in flight still land in the cache if the host keeps
    /// ticking; none of them become visible.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.debounce.dispose();
        self.controller.detach();
        self.open = false;
        self.disposed = true;
        self.sync_results();
        debug!(in_flight = self.controller.in_flight_len(), "selector disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn finish_choice(&mut self) {
        self.open = false;
        self.highlight = None;
        self.input.clear();
        self.input_error = None;
        self.debounce.cancel();
        self.controller.detach();
        self.sync_results();
    }

    fn key_for(&self, text: &str) -> Result<QueryKey, QueryError> {
        let mut input = self.template.clone().with_term(text);
        if let Some(limit) = self.config.page_limit
            && !input.params.iter().any(|(name, _)| name.trim() == "limit")
        {
            input = input.with_param("limit", limit.to_string());
        }
        self.normalizer.normalize(&input)
    }

    /// Follow the published answer: a new item list resets the window.
    fn sync_results(&mut self) {
        let next = self.controller.observe().with(|a| a.items().cloned());
        let unchanged = match (&self.results, &next) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        let len = next.as_ref().map_or(0, |items| items.len());
        self.results = next;
        self.highlight = None;
        self.virtualizer.replace_items(len);
    }
}
