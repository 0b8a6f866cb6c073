//! End-to-end selector flows with a source whose completion order the test
//! controls.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::block_on;
use pretty_assertions::assert_eq;
use rsel_core::{FetchError, Item, QueryInput, QueryKey, SelectorConfig};
use rsel_runtime::{FetchFuture, FetchStatus, ItemSource};
use rsel_widgets::{Affordance, RemoteSelect};

type Reply = Result<Vec<Item<u32>>, FetchError>;

#[derive(Default)]
struct ScriptedSource {
    calls: RefCell<Vec<(QueryKey, oneshot::Sender<Reply>)>>,
    issued: RefCell<Vec<String>>,
}

impl ScriptedSource {
    fn respond(&self, term: &str, reply: Reply) {
        let mut calls = self.calls.borrow_mut();
        let pos = calls
            .iter()
            .position(|(k, _)| k.term() == term)
            .unwrap_or_else(|| panic!("no outstanding fetch for {term:?}"));
        let (_, tx) = calls.remove(pos);
        tx.send(reply).expect("selector dropped the fetch");
    }

    fn issued(&self) -> Vec<String> {
        self.issued.borrow().clone()
    }
}

impl ItemSource<u32> for ScriptedSource {
    fn fetch_items(&self, key: &QueryKey) -> FetchFuture<u32> {
        let (tx, rx) = oneshot::channel();
        self.calls.borrow_mut().push((key.clone(), tx));
        self.issued.borrow_mut().push(key.term().to_string());
        async move { rx.await.unwrap_or(Err(FetchError::Cancelled)) }.boxed_local()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn named(pairs: &[(u32, &str)]) -> Reply {
    Ok(pairs
        .iter()
        .map(|(v, label)| Item::new(*v, *label))
        .collect())
}

fn numbered(count: u32) -> Reply {
    Ok((0..count).map(|i| Item::new(i, format!("Row {i}"))).collect())
}

fn setup(config: SelectorConfig) -> (Rc<ScriptedSource>, RemoteSelect<u32, Rc<ScriptedSource>>) {
    init_tracing();
    let source = Rc::new(ScriptedSource::default());
    let select = RemoteSelect::new(
        Rc::clone(&source),
        QueryInput::new("bus-stations"),
        config.with_page_limit(None),
    )
    .expect("valid config");
    (source, select)
}

/// Type `text` at `at` and let the debounce fire.
fn type_and_fire(select: &mut RemoteSelect<u32, Rc<ScriptedSource>>, text: &str, at: Instant) {
    select.handle_input_at(text, at).expect("well-formed input");
    select.tick_at(at + ms(300));
}

#[test]
fn burst_of_keystrokes_issues_one_fetch_for_the_last() {
    let (source, mut select) = setup(SelectorConfig::default());
    let t0 = Instant::now();
    select.handle_input_at("m", t0).unwrap();
    select.tick_at(t0 + ms(100));
    select.handle_input_at("ma", t0 + ms(100)).unwrap();
    select.tick_at(t0 + ms(200));
    select.handle_input_at("mar", t0 + ms(200)).unwrap();
    select.tick_at(t0 + ms(450));
    assert!(source.issued().is_empty());

    select.tick_at(t0 + ms(500));
    assert_eq!(source.issued(), vec!["mar"]);
    assert_eq!(select.affordance(), Some(Affordance::Loading));
}

#[test]
fn equivalent_input_joins_the_pending_fetch() {
    let (source, mut select) = setup(SelectorConfig::default());
    let t0 = Instant::now();
    type_and_fire(&mut select, "ptuj", t0);
    type_and_fire(&mut select, "  PTUJ ", t0 + ms(400));
    assert_eq!(source.issued(), vec!["ptuj"]);
    assert_eq!(select.cache_stats().joins, 1);

    source.respond("ptuj", named(&[(3, "Ptuj")]));
    select.tick_at(t0 + ms(800));
    assert_eq!(select.results().len(), 1);
}

#[test]
fn slow_earlier_answer_never_replaces_the_current_one() {
    let (source, mut select) = setup(SelectorConfig::default());
    let t0 = Instant::now();
    type_and_fire(&mut select, "mar", t0);
    type_and_fire(&mut select, "mari", t0 + ms(400));

    source.respond("mari", named(&[(1, "Maribor AP")]));
    select.tick_at(t0 + ms(800));
    source.respond("mar", named(&[(1, "Maribor AP"), (2, "Marof")]));
    let settled = select.tick_at(t0 + ms(900));

    assert_eq!(settled.len(), 1);
    assert!(!settled[0].surfaced);
    let labels: Vec<_> = select.rows().iter().map(|r| r.item.label().to_string()).collect();
    assert_eq!(labels, vec!["Maribor AP"]);

    // Going back to the abandoned term is served from cache.
    type_and_fire(&mut select, "mar", t0 + ms(1_000));
    assert_eq!(source.issued(), vec!["mar", "mari"]);
    assert_eq!(select.status(), FetchStatus::Resolved);
    assert_eq!(select.results().len(), 2);
    assert_eq!(select.cache_stats().stale_discards, 1);
}

#[test]
fn large_list_materializes_only_the_window() {
    let config = SelectorConfig::default()
        .with_viewport_size(400)
        .with_overscan(2);
    let (source, mut select) = setup(config);
    let t0 = Instant::now();
    type_and_fire(&mut select, "row", t0);
    source.respond("row", numbered(1_000));
    select.tick_at(t0 + ms(400));

    select.set_scroll_offset(800);
    let rows = select.rows();
    assert_eq!(rows.first().map(|r| r.index), Some(18));
    assert_eq!(rows.last().map(|r| r.index), Some(31));
    assert_eq!(select.visible_range().visible, 20..30);
    assert_eq!(select.total_size(), 40_000);
    assert_eq!(rows[2].start, 800);
}

#[test]
fn selection_follows_value_across_relabelled_results() {
    let (source, mut select) = setup(SelectorConfig::default());
    let t0 = Instant::now();
    type_and_fire(&mut select, "ptuj", t0);
    source.respond("ptuj", named(&[(7, "Ptuj"), (8, "Ptujska Gora")]));
    select.tick_at(t0 + ms(400));
    assert!(select.select_index(0));
    assert_eq!(select.trigger_label("Choose"), "Ptuj");

    type_and_fire(&mut select, "pt", t0 + ms(1_000));
    source.respond("pt", named(&[(8, "Ptujska Gora"), (7, "Ptuj AP")]));
    select.tick_at(t0 + ms(1_400));

    let rows = select.rows();
    let flags: Vec<_> = rows.iter().map(|r| (*r.item.value(), r.selected)).collect();
    assert_eq!(flags, vec![(8, false), (7, true)]);
    assert_eq!(select.trigger_label("Choose"), "Ptuj");
}

#[test]
fn empty_and_failed_are_distinct_affordances() {
    let (source, mut select) = setup(SelectorConfig::default());
    let t0 = Instant::now();

    type_and_fire(&mut select, "zzz", t0);
    source.respond("zzz", Ok(Vec::new()));
    select.tick_at(t0 + ms(400));
    assert_eq!(select.affordance(), Some(Affordance::Empty));
    assert_eq!(select.status(), FetchStatus::Resolved);

    type_and_fire(&mut select, "ptuj", t0 + ms(500));
    source.respond(
        "ptuj",
        Err(FetchError::Status {
            code: 503,
            message: "unavailable".into(),
        }),
    );
    select.tick_at(t0 + ms(900));
    assert_eq!(select.affordance(), Some(Affordance::Error));
    assert!(select.rows().is_empty());

    assert!(select.retry());
    assert_eq!(select.affordance(), Some(Affordance::Loading));
    assert_eq!(source.issued(), vec!["zzz", "ptuj", "ptuj"]);
    source.respond("ptuj", named(&[(3, "Ptuj")]));
    select.tick_at(t0 + ms(1_000));
    assert_eq!(select.affordance(), Some(Affordance::Results));
}

#[test]
fn settle_next_drives_completion_with_an_executor() {
    let (source, mut select) = setup(SelectorConfig::default());
    let t0 = Instant::now();
    type_and_fire(&mut select, "ptuj", t0);
    source.respond("ptuj", named(&[(3, "Ptuj")]));

    let settled = block_on(select.settle_next()).expect("one fetch in flight");
    assert!(settled.surfaced);
    assert_eq!(select.results().len(), 1);
}

#[test]
fn dispose_hides_in_flight_answers() {
    let (source, mut select) = setup(SelectorConfig::default());
    let t0 = Instant::now();
    type_and_fire(&mut select, "ptuj", t0);
    select.dispose();
    source.respond("ptuj", named(&[(3, "Ptuj")]));
    let settled = select.tick_at(t0 + ms(400));

    assert_eq!(settled.len(), 1);
    assert!(!settled[0].surfaced);
    assert_eq!(select.affordance(), None);
    assert!(select.rows().is_empty());
}
