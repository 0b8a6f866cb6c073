#![forbid(unsafe_code)]

//! Runtime: debounce scheduling, observable state and the request cache.
//!
//! Everything here runs on one logical thread. The only suspension point is
//! the [`ItemSource`] fetch future; debouncing and cache bookkeeping are plain
//! synchronous state transitions driven by the host's tick.
//!
//! - [`DebounceScheduler`]: coalesces bursts of input into one trigger.
//! - [`Observable`]: version-tracked value with change subscribers.
//! - [`QueryCache`]: bounded LRU of [`CacheEntry`] by `QueryKey`.
//! - [`RequestController`]: at-most-one fetch per key, sequence-matched
//!   surfacing of answers.

pub mod cache;
pub mod controller;
pub mod debounce;
pub mod reactive;
pub mod source;

pub use cache::{CacheEntry, CacheStats, EntryStatus, Lookup, QueryCache};
pub use controller::{Answer, FetchStatus, QueryOutcome, RequestController, Settled};
pub use debounce::DebounceScheduler;
pub use reactive::{Observable, Subscription};
pub use source::{FetchFuture, FnSource, ItemSource, StaticSource};
