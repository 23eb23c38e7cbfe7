//! String-level distinguished-name normalization.
//!
//! These functions never fail. Each one tries the structured parser in [`crate::dn`] first and
//! falls back to a manual scan over the raw string when the name does not parse, so callers always
//! get a best-effort answer for names returned by directory servers in odd shapes.

use std::fmt::Display;

use tracing::debug;

use crate::dn::{escape_value, unescape_value, DistinguishedName};
use crate::url::DirectoryUrl;

const COMPONENT_SEPARATOR: char = ',';
const MULTI_VALUE_SEPARATOR: char = '+';

/// Runs `structured`, and on failure logs the reason and returns `manual(input)` instead.
pub fn with_fallback<T, E, S, M>(operation: &str, input: &str, structured: S, manual: M) -> T
where
    E: Display,
    S: FnOnce(&str) -> std::result::Result<T, E>,
    M: FnOnce(&str) -> T,
{
    match structured(input) {
        Ok(value) => value,
        Err(err) => {
            debug!(operation, input, error = %err, "structured parse failed, scanning manually");
            manual(input)
        }
    }
}

/// Byte offsets of every `delimiter` not consumed by a preceding backslash escape.
fn unescaped_positions(input: &str, delimiter: char) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut escape = false;

    for (idx, ch) in input.char_indices() {
        if escape {
            escape = false;
        } else if ch == '\\' {
            escape = true;
        } else if ch == delimiter {
            positions.push(idx);
        }
    }

    positions
}

fn split_unescaped(input: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for idx in unescaped_positions(input, delimiter) {
        parts.push(&input[start..idx]);
        start = idx + delimiter.len_utf8();
    }
    parts.push(&input[start..]);
    parts
}

fn last_component(dn: &str) -> &str {
    unescaped_positions(dn, COMPONENT_SEPARATOR)
        .last()
        .map_or(dn, |&idx| &dn[idx + 1..])
        .trim()
}

/// Collapses `\\`, `\"` and `\ ` escapes introduced by composite-name encoding.
fn unescape_composite(dn: &str) -> String {
    let mut result = String::with_capacity(dn.len());
    let mut chars = dn.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '\\' | '"' | ' ') {
                    result.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        result.push(ch);
    }

    result
}

fn strip_enclosing_quotes(dn: &str) -> &str {
    if dn.len() >= 2 && dn.starts_with('"') && dn.ends_with('"') {
        &dn[1..dn.len() - 1]
    } else {
        dn
    }
}

/// Name portion of a `/host:port/name` referral, if the shape matches.
fn strip_host_port(rest: &str) -> Option<&str> {
    let colon = rest.find(':');
    let search_from = colon.map_or(0, |idx| idx + 1);
    rest[search_from..]
        .find('/')
        .map(|slash| &rest[search_from + slash + 1..])
}

fn referral_scheme_len(dn: &str) -> Option<usize> {
    let lower = dn.get(..8).unwrap_or(dn).to_ascii_lowercase();
    if lower.starts_with("ldap://") {
        Some("ldap://".len())
    } else if lower.starts_with("ldaps://") {
        Some("ldaps://".len())
    } else {
        None
    }
}

fn extract_referral_name(dn: &str) -> String {
    if let Some(rest) = dn.strip_prefix('/') {
        if rest.contains(':') {
            if let Some(name) = strip_host_port(rest) {
                return name.to_string();
            }
        }
        return dn.to_string();
    }

    let Some(scheme_len) = referral_scheme_len(dn) else {
        return dn.to_string();
    };

    with_fallback(
        "prepare_dn",
        dn,
        |raw| {
            let url = DirectoryUrl::new(raw);
            match url.parsed_ok() {
                Ok(true) => Ok(url.dn().unwrap_or_default().to_string()),
                Ok(false) => Err(url.message().unwrap_or("unparseable").to_string()),
                Err(err) => Err(err.to_string()),
            }
        },
        |raw| {
            strip_host_port(&raw[scheme_len..])
                .unwrap_or_default()
                .to_string()
        },
    )
}

/// Normalizes a raw entry name against the root of the search that produced it.
///
/// Blank names resolve to `search_root`. Composite escapes and one layer of enclosing quotes are
/// removed, and referral forms (`/host:port/name`, `ldap://…`, `ldaps://…`) are reduced to the
/// name they carry. If the name's trailing component differs from the root's trailing component
/// the root is appended.
#[must_use]
pub fn prepare_dn(dn: &str, search_root: &str) -> String {
    if dn.trim().is_empty() {
        return search_root.to_string();
    }

    let unescaped = unescape_composite(dn);
    let name = extract_referral_name(strip_enclosing_quotes(&unescaped));

    if name.trim().is_empty() {
        return search_root.to_string();
    }
    if search_root.trim().is_empty() {
        return name;
    }

    if last_component(&name).to_lowercase() == last_component(search_root).to_lowercase() {
        name
    } else {
        format!("{name}{COMPONENT_SEPARATOR}{search_root}")
    }
}

/// Returns the leading component of `dn`.
#[must_use]
pub fn get_rdn(dn: &str) -> String {
    with_fallback(
        "get_rdn",
        dn,
        |raw| DistinguishedName::parse(raw).map(|parsed| parsed.leading_rdn()),
        |raw| {
            unescaped_positions(raw, COMPONENT_SEPARATOR)
                .first()
                .map_or(raw, |&idx| &raw[..idx])
                .to_string()
        },
    )
}

/// Returns `dn` without its leading component; empty for single-component or empty input.
#[must_use]
pub fn get_parent_dn(dn: &str) -> String {
    if dn.trim().is_empty() {
        return String::new();
    }

    with_fallback(
        "get_parent_dn",
        dn,
        |raw| DistinguishedName::parse(raw).map(|parsed| parsed.parent()),
        |raw| {
            unescaped_positions(raw, COMPONENT_SEPARATOR)
                .first()
                .map(|&idx| raw[idx + 1..].trim_start().to_string())
                .unwrap_or_default()
        },
    )
}

/// Lowercase attribute types of the leading component, in order.
#[must_use]
pub fn get_rdn_attributes(dn: &str) -> Vec<String> {
    let rdn = get_rdn(dn);
    split_unescaped(&rdn, MULTI_VALUE_SEPARATOR)
        .into_iter()
        .filter_map(|segment| segment.split_once('='))
        .map(|(attribute, _)| attribute.trim().to_lowercase())
        .collect()
}

/// Unescaped values of a (possibly `+`-joined) component, in order.
#[must_use]
pub fn get_rdn_values(rdn: &str) -> Vec<String> {
    split_unescaped(rdn, MULTI_VALUE_SEPARATOR)
        .into_iter()
        .filter_map(|segment| segment.split_once('='))
        .map(|(_, value)| {
            let value = value.trim();
            unescape_value(value).unwrap_or_else(|_| value.to_string())
        })
        .collect()
}

/// Splits an RDN property list such as `uid+cn` into lowercase attribute names.
#[must_use]
pub fn get_rdns(rdn_property: &str) -> Vec<String> {
    rdn_property
        .split(MULTI_VALUE_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Rebuilds the leading component of `dn` from the supplied attribute types and values.
///
/// A `None` value keeps the value currently held by that attribute (or by the same position when
/// the attribute is new). Returns `dn` unchanged when the slices are empty or differ in length.
#[must_use]
pub fn replace_rdn(dn: &str, new_types: &[&str], new_values: &[Option<&str>]) -> String {
    if new_types.is_empty() || new_types.len() != new_values.len() {
        return dn.to_string();
    }

    let rdn = get_rdn(dn);
    let old_types = get_rdn_attributes(&rdn);
    let old_values = get_rdn_values(&rdn);

    let mut pairs = Vec::with_capacity(new_types.len());
    for (position, (attribute, value)) in new_types.iter().zip(new_values).enumerate() {
        let value = value.map(str::to_string).or_else(|| {
            old_types
                .iter()
                .position(|old| old.eq_ignore_ascii_case(attribute.trim()))
                .or(Some(position))
                .and_then(|idx| old_values.get(idx).cloned())
        });

        match value {
            Some(value) => pairs.push(format!("{}={}", attribute.trim(), escape_value(&value))),
            None => debug!(dn, attribute, "no value available for RDN attribute, skipping"),
        }
    }

    if pairs.is_empty() {
        return dn.to_string();
    }

    let new_rdn = pairs.join("+");
    let parent = get_parent_dn(dn);
    if parent.is_empty() {
        new_rdn
    } else {
        format!("{new_rdn}{COMPONENT_SEPARATOR}{parent}")
    }
}

/// Uppercases `dn` without changing its character count.
///
/// Characters whose uppercase form is more than one character (`ß`, `ﬁ`, `ŉ`) are left as is.
#[must_use]
pub fn to_upper_case(dn: &str) -> String {
    dn.chars()
        .map(|ch| {
            let mut upper = ch.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(single), None) => single,
                _ => ch,
            }
        })
        .collect()
}

/// Canonical structured rendering of `dn`, or `None` if it does not parse.
#[must_use]
pub fn get_valid_dn(dn: &str) -> Option<String> {
    DistinguishedName::parse(dn).ok().map(String::from)
}

/// Returns true if `dn` sits at or below any of `bases`. An empty base matches everything.
pub fn is_under_bases<S: AsRef<str>>(dn: &str, bases: &[S]) -> bool {
    let parsed = DistinguishedName::parse(dn).ok();
    bases.iter().map(AsRef::as_ref).any(|base| {
        if base.trim().is_empty() {
            return true;
        }
        match (&parsed, DistinguishedName::parse(base)) {
            (Some(name), Ok(base)) => name.ends_with(&base),
            _ => dn
                .trim()
                .to_lowercase()
                .ends_with(&base.trim().to_lowercase()),
        }
    })
}
