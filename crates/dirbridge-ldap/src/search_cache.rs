//! Replayable, forward-only sequence of search result entries.
//!
//! A cache is filled once from a completed search and then read front to back. Each consumer must
//! get its own [`Clone`]; clones have a fresh cursor and their own copies of every attribute
//! collection, while entry names are shared.

use thiserror::Error;
use tracing::warn;

use dirbridge_core::error::Error as CoreError;

use crate::entry::{CachedEntry, DeepCopy};

/// Errors raised by [`SearchResultCache`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchCacheError {
    /// `next_entry` was called after the last entry.
    #[error("no more search results")]
    Exhausted,
    /// `push` was called after reading started.
    #[error("cannot append search results after reading has started")]
    AppendAfterRead,
}

impl From<SearchCacheError> for CoreError {
    fn from(err: SearchCacheError) -> Self {
        match err {
            SearchCacheError::Exhausted => CoreError::Exhausted(err.to_string()),
            SearchCacheError::AppendAfterRead => CoreError::InvalidState(err.to_string()),
        }
    }
}

/// Entries of one completed search with an independent read cursor.
#[derive(Debug, Default)]
pub struct SearchResultCache {
    entries: Vec<CachedEntry>,
    cursor: usize,
    reading: bool,
}

impl SearchResultCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Only allowed before the first read.
    ///
    /// # Errors
    ///
    /// Returns [`SearchCacheError::AppendAfterRead`] once [`next_entry`](Self::next_entry) has been
    /// called.
    pub fn push(&mut self, entry: CachedEntry) -> std::result::Result<(), SearchCacheError> {
        if self.reading {
            warn!(entry = entry.name(), "append to search results after read");
            return Err(SearchCacheError::AppendAfterRead);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Returns true if another entry is available. Does not move the cursor.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Advances the cursor and returns the entry it passed.
    ///
    /// # Errors
    ///
    /// Returns [`SearchCacheError::Exhausted`] when no entries remain.
    pub fn next_entry(&mut self) -> std::result::Result<&CachedEntry, SearchCacheError> {
        self.reading = true;
        let entry = self
            .entries
            .get(self.cursor)
            .ok_or(SearchCacheError::Exhausted)?;
        self.cursor += 1;
        Ok(entry)
    }

    /// Total number of entries, independent of the cursor.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the search produced no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.cursor
    }

    /// All entries, independent of the cursor.
    #[must_use]
    pub fn entries(&self) -> &[CachedEntry] {
        &self.entries
    }

    /// Mutable access to every entry, e.g. to rewrite attributes before handing results out.
    pub fn entries_mut(&mut self) -> &mut [CachedEntry] {
        &mut self.entries
    }

    /// Releases nothing; kept so callers can treat every result sequence alike.
    pub fn close(&mut self) {}
}

impl Clone for SearchResultCache {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.iter().map(DeepCopy::deep_copy).collect(),
            cursor: 0,
            reading: false,
        }
    }
}

/// Yields deep copies so items outlive the cache.
impl Iterator for SearchResultCache {
    type Item = CachedEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().ok().map(DeepCopy::deep_copy)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl FromIterator<CachedEntry> for SearchResultCache {
    fn from_iter<I: IntoIterator<Item = CachedEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            cursor: 0,
            reading: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Attributes;
    use std::sync::Arc;

    fn entry(name: &str, mail: &str) -> CachedEntry {
        let mut attributes = Attributes::new();
        attributes.add_value("mail", mail);
        CachedEntry::new(name, attributes)
    }

    fn sample_cache() -> SearchResultCache {
        let mut cache = SearchResultCache::new();
        cache.push(entry("uid=a", "a@example.com")).unwrap();
        cache.push(entry("uid=b", "b@example.com")).unwrap();
        cache.push(entry("uid=c", "c@example.com")).unwrap();
        cache
    }

    #[test]
    fn reads_in_order_then_exhausts() {
        let mut cache = sample_cache();
        assert!(cache.has_next());
        assert!(cache.has_next());
        assert_eq!(cache.next_entry().unwrap().name(), "uid=a");
        assert_eq!(cache.next_entry().unwrap().name(), "uid=b");
        assert_eq!(cache.next_entry().unwrap().name(), "uid=c");
        assert!(!cache.has_next());
        assert_eq!(cache.next_entry().unwrap_err(), SearchCacheError::Exhausted);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn empty_cache_is_exhausted() {
        let mut cache = SearchResultCache::new();
        assert!(!cache.has_next());
        let err = cache.next_entry().unwrap_err();
        assert_eq!(err, SearchCacheError::Exhausted);
        assert_eq!(CoreError::from(err).error_code(), "EXHAUSTED");
    }

    #[test]
    fn append_after_read_is_rejected() {
        let mut cache = sample_cache();
        cache.next_entry().unwrap();
        assert_eq!(
            cache.push(entry("uid=d", "d@example.com")).unwrap_err(),
            SearchCacheError::AppendAfterRead
        );
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn has_next_does_not_block_appends() {
        let mut cache = SearchResultCache::new();
        assert!(!cache.has_next());
        cache.push(entry("uid=a", "a@example.com")).unwrap();
        assert!(cache.has_next());
    }

    #[test]
    fn clone_has_fresh_cursor_and_own_attributes() {
        let mut source = sample_cache();
        source.next_entry().unwrap();

        let mut first = source.clone();
        let second = source.clone();
        assert_eq!(first.remaining(), 3);
        assert_eq!(source.remaining(), 2);

        first.entries[0]
            .attributes_mut()
            .put("mail", vec!["changed@example.com".into()]);

        assert_eq!(
            source.entries()[0].attributes().first_text("mail"),
            Some("a@example.com")
        );
        assert_eq!(
            second.entries()[0].attributes().first_text("mail"),
            Some("a@example.com")
        );
        assert!(Arc::ptr_eq(
            source.entries()[0].shared_name(),
            first.entries()[0].shared_name()
        ));
        assert_eq!(first.next_entry().unwrap().name(), "uid=a");
    }

    #[test]
    fn iterator_yields_remaining_entries() {
        let mut cache = sample_cache();
        cache.next_entry().unwrap();
        let names: Vec<String> = cache.by_ref().map(|e| e.name().to_string()).collect();
        assert_eq!(names, ["uid=b", "uid=c"]);
        cache.close();
        assert!(!cache.has_next());
    }

    #[test]
    fn collects_from_entries() {
        let cache: SearchResultCache = vec![entry("uid=x", "x@example.com")]
            .into_iter()
            .collect();
        assert_eq!(cache.len(), 1);
        assert!(cache.has_next());
    }
}
