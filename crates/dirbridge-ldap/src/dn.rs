//! Structured distinguished-name model.
//!
//! This is the strict half of DN handling: anything it rejects is handed to the manual-scan
//! heuristics in [`crate::normalize`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use dirbridge_core::error::Error as CoreError;

/// Errors that can occur when parsing or manipulating distinguished names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistinguishedNameError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component in the distinguished name was invalid.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component was missing the attribute name to the left of the `=`.
    #[error("distinguished name component missing attribute: {0}")]
    MissingAttribute(String),
    /// A component was missing the value to the right of the `=`.
    #[error("distinguished name component missing value for attribute {0}")]
    MissingValue(String),
    /// The distinguished name ended with an escape character.
    #[error("distinguished name contains an unterminated escape sequence")]
    UnterminatedEscape,
    /// Hex-pair escapes decoded to bytes that are not UTF-8.
    #[error("distinguished name value is not valid UTF-8 after unescaping: {0}")]
    InvalidEncoding(String),
}

impl From<DistinguishedNameError> for CoreError {
    fn from(err: DistinguishedNameError) -> Self {
        CoreError::InvalidDn(err.to_string())
    }
}

/// Relative distinguished name (single attribute/value pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeDistinguishedName {
    attribute: String,
    value: String,
}

impl RelativeDistinguishedName {
    /// Create a new relative distinguished name.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute portion of the RDN (e.g. `cn`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Attribute value portion of the RDN, unescaped.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true if this RDN matches the provided attribute name (case-insensitive).
    #[must_use]
    pub fn matches_attribute(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute)
    }

    /// Case-insensitive comparison of both attribute and value.
    #[must_use]
    pub fn eq_ignore_case(&self, other: &Self) -> bool {
        self.matches_attribute(&other.attribute)
            && self.value.to_lowercase() == other.value.to_lowercase()
    }
}

/// Strongly-typed distinguished name wrapper.
///
/// Components are kept leaf first, exactly as written. Each entry of [`rdns`](Self::rdns) is one
/// `+`-joined group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinguishedName {
    raw: String,
    rdns: Vec<Vec<RelativeDistinguishedName>>,
}

impl DistinguishedName {
    /// Parses a distinguished name from a string.
    ///
    /// # Errors
    ///
    /// Returns [`DistinguishedNameError`] if the distinguished name is empty or contains invalid
    /// syntax.
    pub fn parse(input: impl AsRef<str>) -> std::result::Result<Self, DistinguishedNameError> {
        let raw = input.as_ref().trim();
        if raw.is_empty() {
            return Err(DistinguishedNameError::Empty);
        }

        let mut rdns = Vec::new();
        for component in split_escaped(raw, ',')? {
            let mut rdn_components = Vec::new();
            for part in split_escaped(&component, '+')? {
                let (attribute, value) = split_attribute_value(&part)?;
                rdn_components.push(RelativeDistinguishedName::new(attribute, value));
            }
            rdns.push(rdn_components);
        }

        Ok(Self {
            raw: rdns_to_string(&rdns),
            rdns,
        })
    }

    /// Borrows the canonical distinguished name string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the RDN sets in order (each set represents a `+`-joined group).
    #[must_use]
    pub fn rdns(&self) -> &[Vec<RelativeDistinguishedName>] {
        &self.rdns
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    /// A parsed name always has at least one component.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Returns an iterator over all relative distinguished names in order.
    pub fn components(&self) -> impl Iterator<Item = &RelativeDistinguishedName> + '_ {
        self.rdns.iter().flat_map(|rdn| rdn.iter())
    }

    /// Looks up the value for the first attribute that matches `attribute` (case-insensitive).
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.components()
            .find(|rdn| rdn.matches_attribute(attribute))
            .map(RelativeDistinguishedName::value)
    }

    /// Leading (leaf) component rendered in canonical form.
    #[must_use]
    pub fn leading_rdn(&self) -> String {
        self.rdns.first().map(|rdn| rdn_to_string(rdn)).unwrap_or_default()
    }

    /// Everything after the leading component, or an empty string for a single component.
    #[must_use]
    pub fn parent(&self) -> String {
        rdns_to_string(self.rdns.get(1..).unwrap_or_default())
    }

    /// Returns true if the trailing components of `self` equal `suffix` (case-insensitive).
    #[must_use]
    pub fn ends_with(&self, suffix: &DistinguishedName) -> bool {
        if suffix.len() > self.len() {
            return false;
        }
        let offset = self.len() - suffix.len();
        self.rdns[offset..]
            .iter()
            .zip(&suffix.rdns)
            .all(|(ours, theirs)| {
                ours.len() == theirs.len()
                    && ours.iter().zip(theirs).all(|(a, b)| a.eq_ignore_case(b))
            })
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for DistinguishedName {
    type Err = DistinguishedNameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DistinguishedName> for String {
    fn from(value: DistinguishedName) -> Self {
        value.raw
    }
}

impl TryFrom<&str> for DistinguishedName {
    type Error = DistinguishedNameError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Splits on unescaped `delimiter`, keeping escape sequences intact in each part.
fn split_escaped(
    input: &str,
    delimiter: char,
) -> std::result::Result<Vec<String>, DistinguishedNameError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let next = chars
                .next()
                .ok_or(DistinguishedNameError::UnterminatedEscape)?;
            current.push(ch);
            current.push(next);
            continue;
        }

        if ch == delimiter {
            parts.push(current.trim().to_string());
            current.clear();
            continue;
        }

        current.push(ch);
    }

    parts.push(current.trim().to_string());
    if parts.iter().any(String::is_empty) {
        return Err(DistinguishedNameError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

fn split_attribute_value(
    component: &str,
) -> std::result::Result<(String, String), DistinguishedNameError> {
    let mut escape = false;
    let mut index = None;

    for (i, ch) in component.char_indices() {
        if escape {
            escape = false;
            continue;
        }

        if ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '=' {
            index = Some(i);
            break;
        }
    }

    let idx =
        index.ok_or_else(|| DistinguishedNameError::InvalidComponent(component.to_string()))?;
    let attribute = component[..idx].trim();
    let value_part = component[idx + 1..].trim_start();

    if attribute.is_empty() {
        return Err(DistinguishedNameError::MissingAttribute(
            component.to_string(),
        ));
    }

    if value_part.is_empty() {
        return Err(DistinguishedNameError::MissingValue(attribute.to_string()));
    }

    Ok((attribute.to_string(), unescape_value(value_part)?))
}

/// Removes backslash escapes from an attribute value.
///
/// `\XX` hex pairs decode to single bytes, so multi-byte characters may be written as a run of
/// pairs (`\C3\A9`). Any other escaped character stands for itself.
///
/// # Errors
///
/// Returns [`DistinguishedNameError::UnterminatedEscape`] if the value ends in a lone `\`, and
/// [`DistinguishedNameError::InvalidEncoding`] if the decoded bytes are not UTF-8.
pub fn unescape_value(value: &str) -> std::result::Result<String, DistinguishedNameError> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    let mut buf = [0_u8; 4];

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let next = chars
            .next()
            .ok_or(DistinguishedNameError::UnterminatedEscape)?;
        let pair = next
            .to_digit(16)
            .zip(chars.peek().and_then(|low| low.to_digit(16)));
        match pair {
            Some((high, low)) => {
                chars.next();
                bytes.push(u8::try_from(high * 16 + low).unwrap_or_default());
            }
            None => bytes.extend_from_slice(next.encode_utf8(&mut buf).as_bytes()),
        }
    }

    String::from_utf8(bytes)
        .map_err(|err| DistinguishedNameError::InvalidEncoding(err.to_string()))
}

/// Escapes an attribute value for use inside a distinguished name.
#[must_use]
pub fn escape_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = value.chars().collect();
    let mut escaped = String::with_capacity(value.len());

    for (idx, ch) in chars.iter().enumerate() {
        let is_first = idx == 0;
        let is_last = idx == chars.len() - 1;
        if *ch == '\0' {
            escaped.push_str("\\00");
            continue;
        }
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || (is_first && (*ch == ' ' || *ch == '#'))
            || (is_last && *ch == ' ');

        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(*ch);
    }

    escaped
}

fn rdn_to_string(rdn: &[RelativeDistinguishedName]) -> String {
    rdn.iter()
        .map(|component| {
            format!(
                "{}={}",
                component.attribute(),
                escape_value(component.value())
            )
        })
        .collect::<Vec<_>>()
        .join("+")
}

fn rdns_to_string(rdns: &[Vec<RelativeDistinguishedName>]) -> String {
    rdns.iter()
        .map(|rdn| rdn_to_string(rdn))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_dn() {
        let dn = DistinguishedName::parse("cn=John Doe,ou=People,dc=example,dc=com").unwrap();
        assert_eq!(dn.get("cn"), Some("John Doe"));
        assert_eq!(dn.get("OU"), Some("People"));
        assert_eq!(dn.len(), 4);
        assert_eq!(dn.to_string(), "cn=John Doe,ou=People,dc=example,dc=com");
    }

    #[test]
    fn parse_dn_with_escape() {
        let dn = DistinguishedName::parse("cn=Smith\\, John,ou=People,dc=example,dc=com").unwrap();
        assert_eq!(dn.get("cn"), Some("Smith, John"));
        assert_eq!(dn.len(), 4);
        assert!(dn.to_string().starts_with("cn=Smith\\, John,ou=People"));
    }

    #[test]
    fn escaped_backslash_is_unescaped_once() {
        let dn = DistinguishedName::parse("cn=a\\\\b,dc=com").unwrap();
        assert_eq!(dn.get("cn"), Some("a\\b"));
        assert_eq!(dn.as_str(), "cn=a\\\\b,dc=com");
    }

    #[test]
    fn hex_pair_escapes_decode_to_bytes() {
        assert_eq!(unescape_value("a\\2Cb").unwrap(), "a,b");
        assert_eq!(unescape_value("Caf\\C3\\A9").unwrap(), "Café");
        assert_eq!(unescape_value("\\2").unwrap(), "2");
        assert_eq!(unescape_value("x\\=y").unwrap(), "x=y");
        assert!(matches!(
            unescape_value("\\FF").unwrap_err(),
            DistinguishedNameError::InvalidEncoding(_)
        ));

        let dn = DistinguishedName::parse("cn=a\\2Cb,ou=x\\2cy,o=acme").unwrap();
        assert_eq!(dn.get("cn"), Some("a,b"));
        assert_eq!(dn.leading_rdn(), "cn=a\\,b");
        assert_eq!(dn.parent(), "ou=x\\,y,o=acme");
    }

    #[test]
    fn parse_multi_valued_rdn() {
        let dn = DistinguishedName::parse("cn=John+uid=1234,ou=People,dc=example,dc=com").unwrap();
        assert_eq!(dn.rdns()[0].len(), 2);
        assert_eq!(dn.get("uid"), Some("1234"));
        assert_eq!(dn.leading_rdn(), "cn=John+uid=1234");
        assert_eq!(dn.parent(), "ou=People,dc=example,dc=com");
    }

    #[test]
    fn single_component_has_empty_parent() {
        let dn = DistinguishedName::parse("o=root").unwrap();
        assert_eq!(dn.leading_rdn(), "o=root");
        assert_eq!(dn.parent(), "");
    }

    #[test]
    fn invalid_inputs() {
        assert!(matches!(
            DistinguishedName::parse("cn=John,").unwrap_err(),
            DistinguishedNameError::InvalidComponent(_)
        ));
        assert_eq!(
            DistinguishedName::parse("   ").unwrap_err(),
            DistinguishedNameError::Empty
        );
        assert_eq!(
            DistinguishedName::parse("cn=x\\").unwrap_err(),
            DistinguishedNameError::UnterminatedEscape
        );
        assert!(matches!(
            DistinguishedName::parse("=x").unwrap_err(),
            DistinguishedNameError::MissingAttribute(_)
        ));
        assert!(matches!(
            DistinguishedName::parse("cn=").unwrap_err(),
            DistinguishedNameError::MissingValue(_)
        ));
    }

    #[test]
    fn ends_with_is_case_insensitive() {
        let dn = DistinguishedName::parse("uid=jane,ou=People,DC=Example,dc=COM").unwrap();
        let base = DistinguishedName::parse("dc=example,dc=com").unwrap();
        let other = DistinguishedName::parse("dc=example,dc=org").unwrap();
        assert!(dn.ends_with(&base));
        assert!(!dn.ends_with(&other));
        assert!(!base.ends_with(&dn));
    }

    #[test]
    fn escape_value_boundaries() {
        assert_eq!(escape_value(" lead"), "\\ lead");
        assert_eq!(escape_value("trail "), "trail\\ ");
        assert_eq!(escape_value("#x"), "\\#x");
        assert_eq!(escape_value("a=b"), "a=b");
        assert_eq!(escape_value("a+b,c"), "a\\+b\\,c");
        assert_eq!(escape_value("a\0b"), "a\\00b");
    }
}
