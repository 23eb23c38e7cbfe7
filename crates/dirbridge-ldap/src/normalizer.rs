//! Memoizing front for the name normalization functions.

use crate::config::CacheConfig;
use crate::memo::{CacheStats, ExpiringCache};
use crate::normalize;

/// Canonicalizes entry names, remembering recent answers.
///
/// Safe to share between threads. The cache may be cleared at any time; results never depend on
/// its contents.
#[derive(Debug)]
pub struct DnNormalizer {
    prepared: Option<ExpiringCache<(String, String), String>>,
    validated: Option<ExpiringCache<String, Option<String>>>,
}

impl DnNormalizer {
    /// Creates a normalizer with the given cache policy.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::uncached();
        }
        Self {
            prepared: Some(ExpiringCache::new(config.capacity, config.ttl())),
            validated: Some(ExpiringCache::new(config.capacity, config.ttl())),
        }
    }

    /// Creates a normalizer that recomputes every answer.
    #[must_use]
    pub const fn uncached() -> Self {
        Self {
            prepared: None,
            validated: None,
        }
    }

    /// Memoized [`normalize::prepare_dn`].
    #[must_use]
    pub fn prepare_dn(&self, dn: &str, search_root: &str) -> String {
        match &self.prepared {
            Some(cache) => cache.get_or_insert_with((dn.to_string(), search_root.to_string()), || {
                normalize::prepare_dn(dn, search_root)
            }),
            None => normalize::prepare_dn(dn, search_root),
        }
    }

    /// Memoized [`normalize::get_valid_dn`].
    #[must_use]
    pub fn valid_dn(&self, dn: &str) -> Option<String> {
        match &self.validated {
            Some(cache) => cache.get_or_insert_with(dn.to_string(), || normalize::get_valid_dn(dn)),
            None => normalize::get_valid_dn(dn),
        }
    }

    /// Discards every memoized answer.
    pub fn clear(&self) {
        if let Some(cache) = &self.prepared {
            cache.clear();
        }
        if let Some(cache) = &self.validated {
            cache.clear();
        }
    }

    /// Hit/miss counters of the `prepare_dn` cache.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.prepared
            .as_ref()
            .map(ExpiringCache::stats)
            .unwrap_or_default()
    }
}

impl Default for DnNormalizer {
    fn default() -> Self {
        Self::new(&CacheConfig::canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn memoizes_prepare_dn() {
        let normalizer = DnNormalizer::default();
        let first = normalizer.prepare_dn("uid=a,ou=People", "o=acme");
        let second = normalizer.prepare_dn("uid=a,ou=People", "o=acme");
        assert_eq!(first, "uid=a,ou=People,o=acme");
        assert_eq!(first, second);
        assert_eq!(normalizer.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn root_is_part_of_the_key() {
        let normalizer = DnNormalizer::default();
        assert_eq!(normalizer.prepare_dn("cn=x", "o=a"), "cn=x,o=a");
        assert_eq!(normalizer.prepare_dn("cn=x", "o=b"), "cn=x,o=b");
    }

    #[test]
    fn clearing_does_not_change_answers() {
        let normalizer = DnNormalizer::default();
        let before = normalizer.prepare_dn("ldap://h:389/cn=x,o=acme", "o=acme");
        normalizer.clear();
        assert_eq!(normalizer.stats(), CacheStats::default());
        assert_eq!(
            normalizer.prepare_dn("ldap://h:389/cn=x,o=acme", "o=acme"),
            before
        );
    }

    #[test]
    fn uncached_and_disabled_behave_the_same() {
        let disabled = DnNormalizer::new(&CacheConfig::canonical().disabled());
        let uncached = DnNormalizer::uncached();
        for normalizer in [&disabled, &uncached] {
            assert_eq!(normalizer.prepare_dn("", "o=acme"), "o=acme");
            assert_eq!(normalizer.valid_dn("cn = x ,o=y").as_deref(), Some("cn=x,o=y"));
            assert_eq!(normalizer.valid_dn("bogus"), None);
            assert_eq!(normalizer.stats(), CacheStats::default());
        }
    }

    #[test]
    fn shared_between_threads() {
        let normalizer = Arc::new(DnNormalizer::new(&CacheConfig::canonical().with_capacity(4)));
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let normalizer = Arc::clone(&normalizer);
                thread::spawn(move || {
                    for i in 0..50 {
                        let dn = format!("uid=u{},ou=People", (worker + i) % 10);
                        assert_eq!(
                            normalizer.prepare_dn(&dn, "o=acme"),
                            format!("{dn},o=acme")
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
