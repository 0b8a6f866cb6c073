#![forbid(unsafe_code)]

//! Request controller: turns query keys into at most one fetch per key and
//! decides which completion the widget gets to see.
//!
//! Every issued fetch is stamped with a strictly increasing sequence number.
//! The controller remembers the key the widget currently wants and the
//! sequence it is waiting on. A completion is always written to the cache,
//! but it reaches the published [`Answer`] only when its sequence is the one
//! being waited on. Late answers for abandoned keys therefore warm the cache
//! without ever overwriting what the user is looking at.
//!
//! # Invariants
//!
//! 1. At most one fetch per key is in flight.
//! 2. A cache hit issues no fetch and surfaces immediately.
//! 3. The published answer only ever carries data for the current key.
//! 4. Sequence numbers are never reused within one controller.
//!
//! Completions are driven by the host: [`RequestController::poll_completions`]
//! drains whatever is ready without blocking, and
//! [`RequestController::next_completion`] awaits the next one.

use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use rsel_core::{FetchError, Item, ItemValue, QueryKey};
use tracing::{debug, warn};

use crate::cache::{CacheStats, Lookup, QueryCache};
use crate::reactive::Observable;
use crate::source::ItemSource;

/// What the widget should currently display.
#[derive(Debug, Clone)]
pub enum Answer<V> {
    /// No query is active.
    Idle,
    /// Waiting on the fetch stamped `sequence`.
    Pending { key: QueryKey, sequence: u64 },
    /// Items for the current key.
    Resolved {
        key: QueryKey,
        sequence: u64,
        items: Rc<[Item<V>]>,
    },
    /// The fetch for the current key failed.
    Failed {
        key: QueryKey,
        sequence: u64,
        error: FetchError,
    },
}

impl<V> Answer<V> {
    /// Coarse status of this answer.
    #[must_use]
    pub fn status(&self) -> FetchStatus {
        match self {
            Self::Idle => FetchStatus::Idle,
            Self::Pending { .. } => FetchStatus::Pending,
            Self::Resolved { .. } => FetchStatus::Resolved,
            Self::Failed { .. } => FetchStatus::Failed,
        }
    }

    /// Key this answer belongs to.
    #[must_use]
    pub fn key(&self) -> Option<&QueryKey> {
        match self {
            Self::Idle => None,
            Self::Pending { key, .. } | Self::Resolved { key, .. } | Self::Failed { key, .. } => {
                Some(key)
            }
        }
    }

    /// Resolved items, if any.
    #[must_use]
    pub fn items(&self) -> Option<&Rc<[Item<V>]>> {
        match self {
            Self::Resolved { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl<V> PartialEq for Answer<V> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Idle, Self::Idle) => true,
            (
                Self::Pending { key: a, sequence: x },
                Self::Pending { key: b, sequence: y },
            ) => a == b && x == y,
            (
                Self::Resolved {
                    key: a,
                    sequence: x,
                    items: i,
                },
                Self::Resolved {
                    key: b,
                    sequence: y,
                    items: j,
                },
            ) => a == b && x == y && Rc::ptr_eq(i, j),
            (
                Self::Failed {
                    key: a,
                    sequence: x,
                    error: e,
                },
                Self::Failed {
                    key: b,
                    sequence: y,
                    error: f,
                },
            ) => a == b && x == y && e == f,
            _ => false,
        }
    }
}

/// Coarse lifecycle of the current query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    Idle,
    Pending,
    Resolved,
    Failed,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        })
    }
}

/// How [`RequestController::query`] satisfied a key.
#[derive(Debug, Clone)]
pub enum QueryOutcome<V> {
    /// Served from cache; nothing was fetched.
    Hit(Rc<[Item<V>]>),
    /// Attached to a fetch already in flight.
    Joined { sequence: u64 },
    /// Issued a new fetch.
    Issued { sequence: u64 },
}

impl<V> QueryOutcome<V> {
    /// Whether this call started a new fetch.
    #[must_use]
    pub fn issued_fetch(&self) -> bool {
        matches!(self, Self::Issued { .. })
    }
}

/// Report for one applied completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub key: QueryKey,
    pub sequence: u64,
    /// Whether the completion became the published answer.
    pub surfaced: bool,
    /// Whether the completion updated the cache entry.
    pub cached: bool,
}

struct Completion<V> {
    key: QueryKey,
    sequence: u64,
    result: Result<Vec<Item<V>>, FetchError>,
}

#[derive(Debug, Clone)]
struct Intent {
    key: QueryKey,
    awaiting: Option<u64>,
}

/// Owns the cache and every in-flight fetch for one selector.
pub struct RequestController<V: ItemValue, S> {
    source: S,
    cache: QueryCache<V>,
    in_flight: FuturesUnordered<LocalBoxFuture<'static, Completion<V>>>,
    latest_issued: u64,
    intent: Option<Intent>,
    answer: Observable<Answer<V>>,
}

impl<V: ItemValue, S> fmt::Debug for RequestController<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestController")
            .field("cache_len", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .field("latest_issued", &self.latest_issued)
            .field("intent", &self.intent)
            .finish_non_exhaustive()
    }
}

impl<V: ItemValue, S: ItemSource<V>> RequestController<V, S> {
    /// Controller over `source` with a cache of `cache_capacity` settled entries.
    #[must_use]
    pub fn new(source: S, cache_capacity: usize) -> Self {
        Self {
            source,
            cache: QueryCache::new(cache_capacity),
            in_flight: FuturesUnordered::new(),
            latest_issued: 0,
            intent: None,
            answer: Observable::new(Answer::Idle),
        }
    }

    /// Make `key` the current query.
    ///
    /// Serves a resolved entry from cache, attaches to an in-flight fetch for
    /// the same key, or issues a new fetch (also after a failure).
    pub fn query(&mut self, key: QueryKey) -> QueryOutcome<V> {
        match self.cache.lookup(&key) {
            Lookup::Hit { items, sequence } => {
                debug!(key = %key, sequence, "cache hit");
                self.intent = Some(Intent {
                    key: key.clone(),
                    awaiting: None,
                });
                self.answer.set(Answer::Resolved {
                    key,
                    sequence,
                    items: Rc::clone(&items),
                });
                QueryOutcome::Hit(items)
            }
            Lookup::InFlight { sequence } => {
                debug!(key = %key, sequence, "joined in-flight fetch");
                self.await_sequence(key, sequence);
                QueryOutcome::Joined { sequence }
            }
            Lookup::Miss => {
                let sequence = self.issue(key.clone());
                self.await_sequence(key, sequence);
                QueryOutcome::Issued { sequence }
            }
        }
    }

    /// Re-issue the current query after a failure.
    ///
    /// Returns `None` unless the published answer is `Failed`.
    pub fn retry(&mut self) -> Option<QueryOutcome<V>> {
        let Answer::Failed { key, .. } = self.answer.get() else {
            return None;
        };
        Some(self.query(key))
    }

    /// Stop surfacing anything; in-flight fetches still warm the cache.
    pub fn detach(&mut self) {
        self.intent = None;
        self.answer.set(Answer::Idle);
    }

    /// Drop every in-flight fetch and every cache entry.
    pub fn shutdown(&mut self) {
        let dropped = self.in_flight.len();
        self.in_flight.clear();
        self.cache = QueryCache::new(self.cache.capacity());
        self.detach();
        if dropped > 0 {
            debug!(dropped, "in-flight fetches dropped");
        }
    }

    /// Apply every completion that is ready right now.
    pub fn poll_completions(&mut self) -> Vec<Settled> {
        let mut settled = Vec::new();
        while let Some(Some(completion)) = self.in_flight.next().now_or_never() {
            settled.push(self.apply(completion));
        }
        settled
    }

    /// Wait for the next completion and apply it.
    ///
    /// Resolves to `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Settled> {
        let completion = self.in_flight.next().await?;
        Some(self.apply(completion))
    }

    /// Drop a settled cache entry so the next query for `key` refetches.
    pub fn invalidate(&mut self, key: &QueryKey) -> bool {
        self.cache.invalidate(key)
    }

    /// Published answer.
    #[must_use]
    pub fn answer(&self) -> Answer<V> {
        self.answer.get()
    }

    /// Observable handle on the published answer.
    #[must_use]
    pub fn observe(&self) -> &Observable<Answer<V>> {
        &self.answer
    }

    /// Status of the published answer.
    #[must_use]
    pub fn status(&self) -> FetchStatus {
        self.answer.with(Answer::status)
    }

    /// Key the widget currently wants.
    #[must_use]
    pub fn current_key(&self) -> Option<&QueryKey> {
        self.intent.as_ref().map(|i| &i.key)
    }

    /// Number of fetches not yet completed.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Sequence of the most recently issued fetch (0 before the first).
    #[must_use]
    pub fn latest_sequence(&self) -> u64 {
        self.latest_issued
    }

    /// The underlying cache.
    #[must_use]
    pub fn cache(&self) -> &QueryCache<V> {
        &self.cache
    }

    /// Cache usage counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn await_sequence(&mut self, key: QueryKey, sequence: u64) {
        self.intent = Some(Intent {
            key: key.clone(),
            awaiting: Some(sequence),
        });
        self.answer.set(Answer::Pending { key, sequence });
    }

    fn issue(&mut self, key: QueryKey) -> u64 {
        self.latest_issued += 1;
        let sequence = self.latest_issued;
        self.cache.begin(key.clone(), sequence);
        let fetch = self.source.fetch_items(&key);
        debug!(key = %key, sequence, "fetch issued");
        self.in_flight.push(
            async move {
                Completion {
                    key,
                    sequence,
                    result: fetch.await,
                }
            }
            .boxed_local(),
        );
        sequence
    }

    fn apply(&mut self, completion: Completion<V>) -> Settled {
        let Completion {
            key,
            sequence,
            result,
        } = completion;
        let result = result.map(Rc::<[Item<V>]>::from);
        if let Err(error) = &result {
            warn!(key = %key, sequence, %error, "fetch failed");
        }
        let cached = self.cache.settle(&key, sequence, result.clone());

        let surfaced = match &mut self.intent {
            Some(intent) if intent.awaiting == Some(sequence) => {
                intent.awaiting = None;
                true
            }
            _ => false,
        };
        if surfaced {
            let answer = match result {
                Ok(items) => Answer::Resolved {
                    key: key.clone(),
                    sequence,
                    items,
                },
                Err(error) => Answer::Failed {
                    key: key.clone(),
                    sequence,
                    error,
                },
            };
            self.answer.set(answer);
        } else {
            self.cache.note_stale_discard();
            debug!(key = %key, sequence, "stale response discarded");
        }
        Settled {
            key,
            sequence,
            surfaced,
            cached,
        }
    }
}
