#![forbid(unsafe_code)]

//! Error taxonomy.
//!
//! | Kind | Type | Surfaced as |
//! |------|------|-------------|
//! | Malformed query | [`QueryError`] | `Err` from key normalization, never reaches the cache |
//! | Transient fetch failure | [`FetchError`] | `Failed` cache entry + status, retryable |
//! | Stale response | (none) | `debug!` log line, no state change |

use std::fmt;

/// Why raw input could not become a [`QueryKey`](crate::QueryKey).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The resource scope was empty.
    EmptyScope,
    /// A filter parameter name was empty or used characters outside `[A-Za-z0-9_-]`.
    InvalidParamName(String),
    /// The search term contained a control character (after whitespace folding).
    ControlCharacter {
        /// Char index of the offending character in the folded term.
        position: usize,
    },
    /// The search term was longer than the configured limit.
    TooLong {
        /// Grapheme clusters in the folded term.
        graphemes: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The canonical form could not be serialized.
    Serialize(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyScope => write!(f, "malformed query: empty scope"),
            Self::InvalidParamName(name) => {
                write!(f, "malformed query: invalid parameter name '{name}'")
            }
            Self::ControlCharacter { position } => {
                write!(f, "malformed query: control character at {position}")
            }
            Self::TooLong { graphemes, max } => {
                write!(f, "malformed query: {graphemes} graphemes exceeds {max}")
            }
            Self::Serialize(msg) => write!(f, "malformed query: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}

/// A failed fetch. Every variant is transient: re-querying the same key
/// issues a fresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The transport failed (connection refused, reset, DNS...).
    Transport(String),
    /// The server answered with a non-success status.
    Status {
        /// HTTP-like status code.
        code: u16,
        /// Server-provided reason.
        message: String,
    },
    /// The source gave up waiting.
    Timeout,
    /// The payload could not be decoded into items.
    Decode(String),
    /// The source dropped the request without answering.
    Cancelled,
}

impl FetchError {
    /// Whether re-issuing the same query may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Status { code, message } => write!(f, "server returned {code}: {message}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Decode(msg) => write!(f, "could not decode response: {msg}"),
            Self::Cancelled => write!(f, "request cancelled by source"),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_messages() {
        assert_eq!(
            QueryError::TooLong {
                graphemes: 90,
                max: 64
            }
            .to_string(),
            "malformed query: 90 graphemes exceeds 64"
        );
        assert_eq!(
            QueryError::InvalidParamName("a b".into()).to_string(),
            "malformed query: invalid parameter name 'a b'"
        );
    }

    #[test]
    fn fetch_error_messages() {
        let err = FetchError::Status {
            code: 503,
            message: "unavailable".into(),
        };
        assert_eq!(err.to_string(), "server returned 503: unavailable");
        assert_eq!(FetchError::Timeout.to_string(), "request timed out");
    }

    #[test]
    fn fetch_errors_are_retryable() {
        assert!(FetchError::Cancelled.is_retryable());
        assert!(FetchError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn errors_are_std_errors() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&QueryError::EmptyScope);
        assert_error(&FetchError::Timeout);
    }
}
