//! Store of completed searches keyed by their request.

use std::sync::Arc;

use tracing::debug;

use crate::config::SearchResultsConfig;
use crate::memo::{CacheStats, ExpiringCache};
use crate::search_cache::SearchResultCache;
use crate::url::SearchScope;

/// Identifies a search request. Base and attribute names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    base: String,
    filter: String,
    scope: SearchScope,
    attributes: Vec<String>,
}

impl SearchKey {
    /// Builds a key; the attribute list is order-insensitive.
    #[must_use]
    pub fn new<S: AsRef<str>>(base: &str, filter: &str, scope: SearchScope, attributes: &[S]) -> Self {
        let mut attributes: Vec<String> = attributes
            .iter()
            .map(|name| name.as_ref().trim().to_ascii_lowercase())
            .collect();
        attributes.sort();
        attributes.dedup();
        Self {
            base: base.trim().to_lowercase(),
            filter: filter.trim().to_string(),
            scope,
            attributes,
        }
    }

    /// Normalized search base.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Search filter.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Search scope.
    #[must_use]
    pub const fn scope(&self) -> SearchScope {
        self.scope
    }
}

/// Completed searches, bounded in count and age.
#[derive(Debug)]
pub struct SearchResultStore {
    results: Option<ExpiringCache<SearchKey, Arc<SearchResultCache>>>,
    config: SearchResultsConfig,
}

impl SearchResultStore {
    /// Creates a store with the given policy.
    #[must_use]
    pub fn new(config: SearchResultsConfig) -> Self {
        let results = config
            .cache
            .enabled
            .then(|| ExpiringCache::new(config.cache.capacity, config.cache.ttl()));
        Self { results, config }
    }

    /// Stores a completed search. Returns false if the store is disabled or the result is too large.
    pub fn insert(&self, key: SearchKey, results: SearchResultCache) -> bool {
        let Some(cache) = &self.results else {
            return false;
        };
        if !self.config.admits(results.len()) {
            debug!(
                base = key.base(),
                entries = results.len(),
                limit = self.config.result_size_limit,
                "search result too large to store"
            );
            return false;
        }
        cache.insert(key, Arc::new(results));
        true
    }

    /// Returns a private copy of the stored result, positioned at its first entry.
    #[must_use]
    pub fn get(&self, key: &SearchKey) -> Option<SearchResultCache> {
        let stored = self.results.as_ref()?.get(key)?;
        debug!(base = key.base(), filter = key.filter(), "search result store hit");
        Some(SearchResultCache::clone(&stored))
    }

    /// Forgets one search.
    pub fn invalidate(&self, key: &SearchKey) {
        if let Some(cache) = &self.results {
            cache.remove(key);
        }
    }

    /// Forgets every search.
    pub fn clear(&self) {
        if let Some(cache) = &self.results {
            cache.clear();
        }
    }

    /// Number of stored searches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.as_ref().map_or(0, ExpiringCache::len)
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.results
            .as_ref()
            .map(ExpiringCache::stats)
            .unwrap_or_default()
    }
}

impl Default for SearchResultStore {
    fn default() -> Self {
        Self::new(SearchResultsConfig::default())
    }
}
