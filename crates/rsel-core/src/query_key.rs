#![forbid(unsafe_code)]

//! Query key normalization.
//!
//! A [`QueryKey`] is the cache identity of a request. Two raw inputs that
//! would produce the same request must produce equal keys, so all shaping
//! happens in exactly one place: [`KeyNormalizer::normalize`].
//!
//! # Normalization
//!
//! 1. Scope is trimmed and must be non-empty.
//! 2. The term's whitespace runs are folded to one space, the ends trimmed,
//!    and the result lowercased.
//! 3. The folded term may not contain control characters and may not exceed
//!    the grapheme limit.
//! 4. Params are trimmed; empty values are dropped; names must match
//!    `[A-Za-z0-9_-]+`. Params live in a sorted map, so insertion order never
//!    reaches the key. A repeated name keeps its last value.
//! 5. The canonical form is the JSON serialization of
//!    `{scope, term, params}` and is the sole basis of equality and hashing.
//!
//! # Invariants
//!
//! 1. `normalize(a) == normalize(b)` iff the canonical strings are equal.
//! 2. A rejected input never yields a key.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::QueryError;

/// Default cap on the folded term length, in grapheme clusters.
pub const DEFAULT_MAX_QUERY_GRAPHEMES: usize = 64;

/// Raw, unnormalized request: a resource scope, the typed term and any
/// fixed filter parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryInput {
    /// Resource the query targets (e.g. `"bus-stations"`).
    pub scope: String,
    /// What the user typed.
    pub term: String,
    /// Extra filters, in any order.
    pub params: Vec<(String, String)>,
}

impl QueryInput {
    /// Start an input for `scope` with an empty term.
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    /// Set the search term.
    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    /// Add a filter parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

#[derive(Serialize)]
struct Canonical<'a> {
    scope: &'a str,
    term: &'a str,
    params: &'a BTreeMap<String, String>,
}

/// Normalized identity of a search request.
#[derive(Debug, Clone)]
pub struct QueryKey {
    scope: String,
    term: String,
    params: BTreeMap<String, String>,
    canonical: String,
}

impl QueryKey {
    /// Normalize `input` with the default grapheme limit.
    pub fn normalize(input: &QueryInput) -> Result<Self, QueryError> {
        KeyNormalizer::default().normalize(input)
    }

    /// Resource scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Folded search term.
    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Value of a filter parameter, if present.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Filter parameters in name order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical serialization; equal keys have equal canonical strings.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for QueryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Turns [`QueryInput`] into [`QueryKey`]s.
///
/// Hoisting a cache across selectors requires all of them to share one
/// normalizer configuration, otherwise equal requests may miss each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyNormalizer {
    max_graphemes: usize,
}

impl Default for KeyNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUERY_GRAPHEMES)
    }
}

impl KeyNormalizer {
    /// Create a normalizer with the given term length cap.
    #[must_use]
    pub fn new(max_graphemes: usize) -> Self {
        Self { max_graphemes }
    }

    /// Maximum folded term length in grapheme clusters.
    #[must_use]
    pub fn max_graphemes(&self) -> usize {
        self.max_graphemes
    }

    /// Normalize a raw input into a key, or reject it.
    pub fn normalize(&self, input: &QueryInput) -> Result<QueryKey, QueryError> {
        let scope = input.scope.trim();
        if scope.is_empty() {
            return Err(QueryError::EmptyScope);
        }

        let term = fold_term(&input.term);
        if let Some(position) = term.chars().position(char::is_control) {
            return Err(QueryError::ControlCharacter { position });
        }
        let graphemes = term.graphemes(true).count();
        if graphemes > self.max_graphemes {
            return Err(QueryError::TooLong {
                graphemes,
                max: self.max_graphemes,
            });
        }

        let mut params = BTreeMap::new();
        for (name, value) in &input.params {
            let name = name.trim();
            if !is_valid_param_name(name) {
                return Err(QueryError::InvalidParamName(name.to_string()));
            }
            let value = value.trim();
            if value.is_empty() {
                params.remove(name);
                continue;
            }
            params.insert(name.to_string(), value.to_string());
        }

        let canonical = serde_json::to_string(&Canonical {
            scope,
            term: &term,
            params: &params,
        })
        .map_err(|e| QueryError::Serialize(e.to_string()))?;

        Ok(QueryKey {
            scope: scope.to_string(),
            term,
            params,
            canonical,
        })
    }
}

fn fold_term(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_valid_param_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn key(input: QueryInput) -> QueryKey {
        QueryKey::normalize(&input).expect("input should normalize")
    }

    #[test]
    fn whitespace_and_case_fold() {
        let a = key(QueryInput::new("bus-stations").with_term("  Maribor   AP "));
        let b = key(QueryInput::new("bus-stations").with_term("maribor ap"));
        assert_eq!(a, b);
        assert_eq!(a.term(), "maribor ap");
    }

    #[test]
    fn canonical_is_json() {
        let k = key(
            QueryInput::new("bus-stations")
                .with_term("Ptuj")
                .with_param("limit", "10"),
        );
        assert_eq!(
            k.canonical(),
            r#"{"scope":"bus-stations","term":"ptuj","params":{"limit":"10"}}"#
        );
    }

    #[test]
    fn param_order_does_not_matter() {
        let a = key(
            QueryInput::new("s")
                .with_param("line", "6")
                .with_param("limit", "10"),
        );
        let b = key(
            QueryInput::new("s")
                .with_param("limit", "10")
                .with_param("line", "6"),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn empty_param_values_are_dropped() {
        let a = key(QueryInput::new("s").with_param("line", "  "));
        let b = key(QueryInput::new("s"));
        assert_eq!(a, b);
        assert_eq!(a.param("line"), None);
    }

    #[test]
    fn repeated_param_keeps_last_value() {
        let k = key(
            QueryInput::new("s")
                .with_param("line", "6")
                .with_param("line", "7"),
        );
        assert_eq!(k.param("line"), Some("7"));
    }

    #[test]
    fn scopes_do_not_collide() {
        let a = key(QueryInput::new("bus-stations").with_term("x"));
        let b = key(QueryInput::new("departures").with_term("x"));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_term_is_allowed() {
        let k = key(QueryInput::new("bus-stations"));
        assert_eq!(k.term(), "");
    }

    #[test]
    fn rejects_empty_scope() {
        let err = KeyNormalizer::default()
            .normalize(&QueryInput::new("   "))
            .unwrap_err();
        assert_eq!(err, QueryError::EmptyScope);
    }

    #[test]
    fn rejects_control_characters() {
        let err = KeyNormalizer::default()
            .normalize(&QueryInput::new("s").with_term("ab\u{7}c"))
            .unwrap_err();
        assert_eq!(err, QueryError::ControlCharacter { position: 2 });
    }

    #[test]
    fn tabs_and_newlines_fold_instead_of_failing() {
        let k = key(QueryInput::new("s").with_term("a\tb\nc"));
        assert_eq!(k.term(), "a b c");
    }

    #[test]
    fn rejects_overlong_terms_by_grapheme() {
        let normalizer = KeyNormalizer::new(3);
        // Three family emoji are three graphemes but many chars.
        let ok = normalizer.normalize(&QueryInput::new("s").with_term("👨‍👩‍👧👨‍👩‍👧👨‍👩‍👧"));
        assert!(ok.is_ok());
        let err = normalizer
            .normalize(&QueryInput::new("s").with_term("abcd"))
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::TooLong {
                graphemes: 4,
                max: 3
            }
        );
    }

    #[test]
    fn rejects_bad_param_names() {
        let err = KeyNormalizer::default()
            .normalize(&QueryInput::new("s").with_param("a b", "1"))
            .unwrap_err();
        assert_eq!(err, QueryError::InvalidParamName("a b".into()));
    }

    proptest! {
        #[test]
        fn param_order_never_changes_key(
            (ordered, shuffled) in proptest::collection::btree_map("[a-z_]{1,6}", "[a-z0-9]{1,6}", 0..6)
                .prop_flat_map(|map| {
                    let ordered: Vec<(String, String)> = map.into_iter().collect();
                    (Just(ordered.clone()), Just(ordered).prop_shuffle())
                })
        ) {
            let normalizer = KeyNormalizer::default();
            let mut a = QueryInput::new("scope");
            a.params = ordered;
            let mut b = QueryInput::new("scope");
            b.params = shuffled;
            prop_assert_eq!(normalizer.normalize(&a).unwrap(), normalizer.normalize(&b).unwrap());
        }

        #[test]
        fn padding_and_case_never_change_key(term in "[a-z]{0,8}( [a-z]{1,8}){0,3}") {
            let normalizer = KeyNormalizer::default();
            let plain = normalizer.normalize(&QueryInput::new("s").with_term(term.clone())).unwrap();
            let noisy = normalizer
                .normalize(&QueryInput::new("s").with_term(format!("  {}  ", term.to_uppercase().replace(' ', "   "))))
                .unwrap();
            prop_assert_eq!(plain, noisy);
        }
    }
}
