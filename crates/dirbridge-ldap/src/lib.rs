//! Directory name handling for the dirbridge identity adapter.
//!
//! This crate canonicalizes distinguished names returned by LDAP servers (including referral
//! URLs), parses `ldap://` URLs, expands search filter templates and replays completed search
//! results to independent readers.

#![deny(missing_docs)]

mod config;
mod dn;
mod entry;
mod filter;
mod memo;
pub mod normalize;
mod normalizer;
mod result_store;
mod search_cache;
mod url;

pub use config::{
    CacheConfig, NormalizerConfig, SearchResultsConfig, DEFAULT_CANONICAL_CAPACITY,
    DEFAULT_CANONICAL_TTL_SECS, DEFAULT_RESULT_SIZE_LIMIT, DEFAULT_SEARCH_RESULTS_CAPACITY,
    DEFAULT_SEARCH_RESULTS_TTL_SECS,
};
pub use dn::{
    escape_value, unescape_value, DistinguishedName, DistinguishedNameError,
    RelativeDistinguishedName,
};
pub use entry::{Attribute, AttributeValue, Attributes, CachedEntry, ChangeType, DeepCopy};
pub use filter::{FilterTemplate, Segment, TokenRange};
pub use memo::{CacheStats, ExpiringCache};
pub use normalize::with_fallback;
pub use normalizer::DnNormalizer;
pub use result_store::{SearchKey, SearchResultStore};
pub use search_cache::{SearchCacheError, SearchResultCache};
pub use url::{get_ldap_urls, DirectoryUrl, DirectoryUrlError, SearchScope, DEFAULT_FILTER};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = dirbridge_core::Result<T>;
