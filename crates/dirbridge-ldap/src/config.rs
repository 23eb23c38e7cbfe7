//! Host-supplied cache configuration.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::Result;

/// Default capacity of the canonical-name cache.
pub const DEFAULT_CANONICAL_CAPACITY: usize = 4096;
/// Default TTL of the canonical-name cache (seconds).
pub const DEFAULT_CANONICAL_TTL_SECS: u64 = 1200;
/// Default capacity of the search result store.
pub const DEFAULT_SEARCH_RESULTS_CAPACITY: usize = 2000;
/// Default TTL of the search result store (seconds).
pub const DEFAULT_SEARCH_RESULTS_TTL_SECS: u64 = 600;
/// Default maximum number of entries in a cacheable search result.
pub const DEFAULT_RESULT_SIZE_LIMIT: usize = 2000;

/// Capacity and expiry policy for one memoization cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    /// Whether the cache is used at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of entries
    #[validate(range(min = 1, max = 1_000_000))]
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entry time to live in seconds
    #[validate(range(min = 1, max = 86_400))]
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

const fn default_enabled() -> bool {
    true
}

const fn default_capacity() -> usize {
    DEFAULT_CANONICAL_CAPACITY
}

const fn default_ttl_secs() -> u64 {
    DEFAULT_CANONICAL_TTL_SECS
}

impl CacheConfig {
    /// Defaults for the canonical-name cache.
    #[must_use]
    pub const fn canonical() -> Self {
        Self {
            enabled: default_enabled(),
            capacity: DEFAULT_CANONICAL_CAPACITY,
            ttl_secs: DEFAULT_CANONICAL_TTL_SECS,
        }
    }

    /// Defaults for the search result store.
    #[must_use]
    pub const fn search_results() -> Self {
        Self {
            enabled: default_enabled(),
            capacity: DEFAULT_SEARCH_RESULTS_CAPACITY,
            ttl_secs: DEFAULT_SEARCH_RESULTS_TTL_SECS,
        }
    }

    /// Disable the cache.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set the capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the TTL in seconds.
    #[must_use]
    pub const fn with_ttl_secs(mut self, seconds: u64) -> Self {
        self.ttl_secs = seconds;
        self
    }

    /// Get the TTL as a Duration.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Fields present in a cache block; the rest come from the cache's own defaults.
#[derive(Deserialize)]
struct CacheOverrides {
    enabled: Option<bool>,
    capacity: Option<usize>,
    ttl_secs: Option<u64>,
}

impl CacheOverrides {
    fn apply(self, base: CacheConfig) -> CacheConfig {
        CacheConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            capacity: self.capacity.unwrap_or(base.capacity),
            ttl_secs: self.ttl_secs.unwrap_or(base.ttl_secs),
        }
    }
}

fn search_results_cache<'de, D>(deserializer: D) -> std::result::Result<CacheConfig, D::Error>
where
    D: Deserializer<'de>,
{
    CacheOverrides::deserialize(deserializer)
        .map(|overrides| overrides.apply(CacheConfig::search_results()))
}

/// Search result store policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SearchResultsConfig {
    /// Store capacity and expiry
    #[validate(nested)]
    #[serde(
        default = "CacheConfig::search_results",
        deserialize_with = "search_results_cache"
    )]
    pub cache: CacheConfig,

    /// Results with this many entries or more are not stored; 0 means no limit
    #[serde(default = "default_result_size_limit")]
    pub result_size_limit: usize,
}

const fn default_result_size_limit() -> usize {
    DEFAULT_RESULT_SIZE_LIMIT
}

impl SearchResultsConfig {
    /// Set the result size limit.
    #[must_use]
    pub const fn with_result_size_limit(mut self, limit: usize) -> Self {
        self.result_size_limit = limit;
        self
    }

    /// Returns true if a result of `count` entries may be stored.
    #[must_use]
    pub const fn admits(&self, count: usize) -> bool {
        self.result_size_limit == 0 || count < self.result_size_limit
    }
}

impl Default for SearchResultsConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::search_results(),
            result_size_limit: default_result_size_limit(),
        }
    }
}

/// Configuration for [`crate::DnNormalizer`] and [`crate::SearchResultStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NormalizerConfig {
    /// Cache of raw names to canonical names
    #[validate(nested)]
    #[serde(default = "CacheConfig::canonical")]
    pub canonical_cache: CacheConfig,

    /// Cache of completed searches
    #[validate(nested)]
    #[serde(default)]
    pub search_results: SearchResultsConfig,
}

impl NormalizerConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`dirbridge_core::Error::ConfigError`] for malformed JSON or values out of range.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.checked()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`dirbridge_core::Error::ConfigError`] describing the invalid fields.
    pub fn checked(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Set the canonical-name cache policy.
    #[must_use]
    pub fn with_canonical_cache(mut self, cache: CacheConfig) -> Self {
        self.canonical_cache = cache;
        self
    }

    /// Set the search result store policy.
    #[must_use]
    pub fn with_search_results(mut self, search_results: SearchResultsConfig) -> Self {
        self.search_results = search_results;
        self
    }
}
