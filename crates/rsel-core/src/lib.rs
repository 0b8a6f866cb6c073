#![forbid(unsafe_code)]

//! Core: items, query keys, error taxonomy and configuration.
//!
//! # Role in the selector
//! `rsel-core` is the vocabulary layer. It owns the value types every other
//! crate passes around and the single normalization function that turns raw
//! user input into a cache-safe [`QueryKey`].
//!
//! # Primary responsibilities
//! - **Item**: an `(value, label)` pair compared by value identity only.
//! - **QueryKey**: normalized, order-independent identity of a request.
//! - **Errors**: [`QueryError`] (rejected synchronously) and [`FetchError`]
//!   (terminal cache-entry state, never thrown at the caller).
//! - **SelectorConfig**: tunables with env overrides and validation.
//!
//! # How it fits in the system
//! `rsel-runtime` builds the debounce and request/cache machinery on these
//! types; `rsel-widgets` builds the virtualizer, selection model and the
//! composed `RemoteSelect` on top of the runtime.

pub mod config;
pub mod error;
pub mod item;
pub mod logging;
pub mod query_key;

pub use config::{ConfigError, ConfigParse, SelectorConfig};
pub use error::{FetchError, QueryError};
pub use item::{Item, ItemValue};
pub use query_key::{KeyNormalizer, QueryInput, QueryKey};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, error, info, info_span, trace, warn};
