//! Integration tests for name normalization, URL parsing and search result replay.
//!
//! These tests exercise the public API end to end, including a fixture of entry names in the
//! shapes directory servers return them.

use std::fs;
use std::path::PathBuf;

use dirbridge_ldap::normalize::{get_parent_dn, get_rdn, prepare_dn, replace_rdn};
use dirbridge_ldap::{
    get_ldap_urls, Attributes, CachedEntry, DirectoryUrl, DnNormalizer, FilterTemplate,
    NormalizerConfig, SearchKey, SearchResultCache, SearchResultStore, SearchScope,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PrepareCase {
    dn: String,
    root: String,
    expected: String,
}

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_prepare_cases() -> Vec<PrepareCase> {
    let fixture_path = fixtures_dir().join("prepare_dn_cases.json");
    let json_data = fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    });
    serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize fixture: {}", e))
}

fn person(name: &str, mail: &str) -> CachedEntry {
    let mut attributes = Attributes::new();
    attributes.add_value("objectClass", "inetOrgPerson");
    attributes.add_value("mail", mail);
    CachedEntry::new(name, attributes)
}

#[test]
fn test_prepare_dn_fixture() {
    let cases = load_prepare_cases();
    assert!(!cases.is_empty(), "Expected fixture cases");

    let normalizer = DnNormalizer::default();
    for case in &cases {
        assert_eq!(
            prepare_dn(&case.dn, &case.root),
            case.expected,
            "prepare_dn({:?}, {:?})",
            case.dn,
            case.root
        );
        assert_eq!(normalizer.prepare_dn(&case.dn, &case.root), case.expected);
    }
    assert_eq!(normalizer.stats().misses, cases.len() as u64);
}

#[test]
fn test_prepare_dn_is_idempotent_under_root() {
    let root = "dc=example,dc=com";
    for dn in [
        "cn=admin,dc=example,dc=com",
        "uid=jdoe,ou=People",
        "ldap://host:389/cn=svc,ou=Services",
    ] {
        let once = prepare_dn(dn, root);
        assert_eq!(prepare_dn(&once, root), once, "not idempotent for {dn}");
    }
}

#[test]
fn test_rdn_and_parent_reassemble_simple_names() {
    for dn in [
        "uid=jdoe,ou=People,o=acme",
        "cn=admin,dc=example,dc=com",
        "ou=Groups,o=acme",
    ] {
        assert_eq!(format!("{},{}", get_rdn(dn), get_parent_dn(dn)), dn);
    }
    assert_eq!(get_parent_dn("o=acme"), "");
}

#[test]
fn test_replace_rdn_keeps_parent() {
    assert_eq!(
        replace_rdn("uid=jdoe,ou=People,o=acme", &["cn"], &[Some("Doe, John")]),
        "cn=Doe\\, John,ou=People,o=acme"
    );
}

#[test]
fn test_filter_template_expansion() {
    assert_eq!(
        FilterTemplate::compile("%v1-2").expand("alice bob carol"),
        "alice bob"
    );
    assert_eq!(FilterTemplate::compile("(cn=%v)").expand("x y"), "(cn=x y)");
}

#[test]
fn test_url_parse_and_rejection() {
    let url = DirectoryUrl::new("ldap://host:389/dc=example,dc=com?cn,sn?sub?(uid=bob)");
    assert_eq!(url.parsed_ok(), Ok(true));
    assert_eq!(url.host(), Some("host"));
    assert_eq!(url.port(), Some("389"));
    assert_eq!(url.dn(), Some("dc=example,dc=com"));
    assert_eq!(url.attributes(), ["cn", "sn"]);
    assert_eq!(url.search_scope(), SearchScope::Subtree);
    assert_eq!(url.filter(), Some("(uid=bob)"));

    let bad = DirectoryUrl::new("ftp://bad");
    assert_eq!(bad.parsed_ok(), Ok(false));
    assert!(bad.message().is_some_and(|m| m.contains("invalid scheme")));

    let members = get_ldap_urls(&[
        "ldap:///ou=People,o=acme??sub?(department=eng)",
        "ftp://bad",
        "ldap://host/cn=%zz",
    ]);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].dn(), Some("ou=People,o=acme"));
}

#[test]
fn test_clone_isolates_attributes() {
    let source: SearchResultCache = (0..5)
        .map(|i| person(&format!("uid=u{i}"), &format!("u{i}@example.com")))
        .collect();

    let mut copy = source.clone();
    copy.entries_mut()[0]
        .attributes_mut()
        .put("mail", vec!["changed@example.com".into()]);

    assert_eq!(
        source.entries()[0].attributes().first_text("mail"),
        Some("u0@example.com")
    );
    let first = copy.next().expect("clone should yield entries");
    assert_eq!(first.attributes().first_text("mail"), Some("changed@example.com"));
    assert_eq!(copy.remaining(), 4);
    assert_eq!(source.len(), 5);
}

#[test]
fn test_empty_results_are_exhausted() {
    let mut empty = SearchResultCache::new();
    let err = dirbridge_core::Error::from(empty.next_entry().unwrap_err());
    assert_eq!(err.error_code(), "EXHAUSTED");
}

#[test]
fn test_store_serves_independent_readers() {
    let config = NormalizerConfig::from_json_str(r#"{"search_results": {"result_size_limit": 10}}"#)
        .expect("valid configuration");
    let store = SearchResultStore::new(config.search_results);
    let key = SearchKey::new("ou=People,o=acme", "(mail=*)", SearchScope::OneLevel, &["mail"]);

    let results: SearchResultCache = vec![
        person("uid=a", "a@example.com"),
        person("uid=b", "b@example.com"),
    ]
    .into_iter()
    .collect();
    assert!(store.insert(key.clone(), results));

    let mut reader = store.get(&key).expect("stored result");
    reader.next_entry().expect("first entry");
    let fresh = store.get(&key).expect("stored result");
    assert_eq!(fresh.remaining(), 2);
    assert_eq!(reader.remaining(), 1);
}
