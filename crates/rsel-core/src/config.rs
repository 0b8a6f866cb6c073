#![forbid(unsafe_code)]

//! Selector configuration.
//!
//! Defaults mirror the timetable front-end's combobox: 300 ms debounce,
//! 40-unit rows in a 300-unit viewport, 10 rows of overscan and 10 results
//! per request.
//!
//! # Environment Variables
//!
//! - `RSEL_DEBOUNCE_MS` (u64)
//! - `RSEL_CACHE_CAPACITY` (usize, > 0)
//! - `RSEL_ITEM_SIZE` (u32, > 0): size estimate for unmeasured rows
//! - `RSEL_VIEWPORT_SIZE` (u32)
//! - `RSEL_OVERSCAN` (usize)
//! - `RSEL_MAX_QUERY_GRAPHEMES` (usize, > 0)
//! - `RSEL_PAGE_LIMIT` (usize, 0 disables the limit param)

use std::env;
use std::fmt;
use std::time::Duration;

use crate::query_key::{DEFAULT_MAX_QUERY_GRAPHEMES, KeyNormalizer};

const ENV_DEBOUNCE_MS: &str = "RSEL_DEBOUNCE_MS";
const ENV_CACHE_CAPACITY: &str = "RSEL_CACHE_CAPACITY";
const ENV_ITEM_SIZE: &str = "RSEL_ITEM_SIZE";
const ENV_VIEWPORT_SIZE: &str = "RSEL_VIEWPORT_SIZE";
const ENV_OVERSCAN: &str = "RSEL_OVERSCAN";
const ENV_MAX_QUERY_GRAPHEMES: &str = "RSEL_MAX_QUERY_GRAPHEMES";
const ENV_PAGE_LIMIT: &str = "RSEL_PAGE_LIMIT";

/// Tunables for one selector instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Quiet period before a typed query is issued.
    pub debounce: Duration,
    /// Maximum number of cache entries kept per selector.
    pub cache_capacity: usize,
    /// Size estimate for rows that were never measured.
    pub item_size: u32,
    /// Height of the scrollable list.
    pub viewport_size: u32,
    /// Rows materialized beyond each edge of the viewport.
    pub overscan: usize,
    /// Longest accepted search term, in grapheme clusters.
    pub max_query_graphemes: usize,
    /// `limit` parameter attached to every request, if any.
    pub page_limit: Option<usize>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            cache_capacity: 32,
            item_size: 40,
            viewport_size: 300,
            overscan: 10,
            max_query_graphemes: DEFAULT_MAX_QUERY_GRAPHEMES,
            page_limit: Some(10),
        }
    }
}

/// Configuration parse diagnostics (env + validation).
#[derive(Debug, Clone)]
pub struct ConfigParse {
    pub config: SelectorConfig,
    pub errors: Vec<ConfigError>,
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl SelectorConfig {
    /// Set the debounce quiet period.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the cache capacity.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the row size estimate.
    #[must_use]
    pub fn with_item_size(mut self, size: u32) -> Self {
        self.item_size = size;
        self
    }

    /// Set the viewport size.
    #[must_use]
    pub fn with_viewport_size(mut self, size: u32) -> Self {
        self.viewport_size = size;
        self
    }

    /// Set the overscan row count.
    #[must_use]
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    /// Set the page limit (`None` sends no `limit` param).
    #[must_use]
    pub fn with_page_limit(mut self, limit: Option<usize>) -> Self {
        self.page_limit = limit;
        self
    }

    /// Set the term length cap.
    #[must_use]
    pub fn with_max_query_graphemes(mut self, max: usize) -> Self {
        self.max_query_graphemes = max;
        self
    }

    /// Key normalizer matching this configuration.
    #[must_use]
    pub fn normalizer(&self) -> KeyNormalizer {
        KeyNormalizer::new(self.max_query_graphemes)
    }

    /// Parse config from environment variables.
    #[must_use]
    pub fn from_env() -> SelectorConfig {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> ConfigParse {
        Self::from_env_with(|key| env::var(key).ok())
    }

    /// Parse config through an arbitrary lookup (tests inject a map here).
    pub fn from_env_with<F>(mut get: F) -> ConfigParse
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = SelectorConfig::default();
        let mut errors = Vec::new();

        if let Some(value) = get(ENV_DEBOUNCE_MS) {
            match value.trim().parse::<u64>() {
                Ok(ms) => config.debounce = Duration::from_millis(ms),
                Err(_) => errors.push(ConfigError::new(
                    "debounce",
                    value,
                    "expected milliseconds as integer",
                )),
            }
        }

        if let Some(value) = get(ENV_CACHE_CAPACITY) {
            match parse_usize(&value) {
                Some(parsed) => config.cache_capacity = parsed,
                None => errors.push(ConfigError::new(
                    "cache_capacity",
                    value,
                    "expected positive integer",
                )),
            }
        }

        if let Some(value) = get(ENV_ITEM_SIZE) {
            match value.trim().parse::<u32>() {
                Ok(parsed) => config.item_size = parsed,
                Err(_) => errors.push(ConfigError::new(
                    "item_size",
                    value,
                    "expected positive integer",
                )),
            }
        }

        if let Some(value) = get(ENV_VIEWPORT_SIZE) {
            match value.trim().parse::<u32>() {
                Ok(parsed) => config.viewport_size = parsed,
                Err(_) => errors.push(ConfigError::new(
                    "viewport_size",
                    value,
                    "expected integer",
                )),
            }
        }

        if let Some(value) = get(ENV_OVERSCAN) {
            match parse_usize(&value) {
                Some(parsed) => config.overscan = parsed,
                None => errors.push(ConfigError::new("overscan", value, "expected integer")),
            }
        }

        if let Some(value) = get(ENV_MAX_QUERY_GRAPHEMES) {
            match parse_usize(&value) {
                Some(parsed) => config.max_query_graphemes = parsed,
                None => errors.push(ConfigError::new(
                    "max_query_graphemes",
                    value,
                    "expected positive integer",
                )),
            }
        }

        if let Some(value) = get(ENV_PAGE_LIMIT) {
            match parse_usize(&value) {
                Some(0) => config.page_limit = None,
                Some(parsed) => config.page_limit = Some(parsed),
                None => errors.push(ConfigError::new(
                    "page_limit",
                    value,
                    "expected integer (0 disables)",
                )),
            }
        }

        if let Err(mut invalid) = config.validate() {
            errors.append(&mut invalid);
        }

        ConfigParse { config, errors }
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        validate_positive("cache_capacity", self.cache_capacity, &mut errors);
        validate_positive("item_size", self.item_size as usize, &mut errors);
        validate_positive("max_query_graphemes", self.max_query_graphemes, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse().ok()
}

fn validate_positive(field: &'static str, value: usize, errors: &mut Vec<ConfigError>) {
    if value == 0 {
        errors.push(ConfigError::new(field, "0", "must be greater than zero"));
    }
}
