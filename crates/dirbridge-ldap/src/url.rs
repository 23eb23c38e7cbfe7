//! Directory URL references (`ldap://host:port/dn?attributes?scope?filter?extensions`).
//!
//! Only the subset used for referrals and dynamic group membership is understood. Parsing happens
//! on first access and the outcome is kept for the lifetime of the value.

use std::borrow::Cow;
use std::str::Utf8Error;
use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::{debug, warn};

use dirbridge_core::error::Error as CoreError;

/// Filter used when a URL carries none.
pub const DEFAULT_FILTER: &str = "(objectClass=*)";

const SCHEME_SEPARATOR: &str = "://";

/// Represents the search scope for LDAP queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchScope {
    /// Base object only.
    #[default]
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl SearchScope {
    /// Maps a URL scope token (`base`, `one`, `sub`); anything else is [`SearchScope::Base`].
    #[must_use]
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::to_ascii_lowercase).as_deref() {
            Some("one") => Self::OneLevel,
            Some("sub") => Self::Subtree,
            _ => Self::Base,
        }
    }
}

/// Caller-visible decoding failures. Structural problems are reported through
/// [`DirectoryUrl::parsed_ok`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryUrlError {
    /// A `%` was not followed by two hexadecimal digits.
    #[error("malformed percent escape in {field} at byte {position}")]
    MalformedEscape {
        /// URL field being decoded.
        field: &'static str,
        /// Byte offset of the `%` inside the field.
        position: usize,
    },
    /// The decoded bytes were not valid UTF-8.
    #[error("{field} is not valid UTF-8 after percent-decoding")]
    InvalidUtf8 {
        /// URL field being decoded.
        field: &'static str,
        /// Underlying decoding error.
        #[source]
        source: Utf8Error,
    },
}

impl From<DirectoryUrlError> for CoreError {
    fn from(err: DirectoryUrlError) -> Self {
        CoreError::Encoding(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct UrlParts {
    scheme: String,
    host: Option<String>,
    port: Option<String>,
    dn: Option<String>,
    attributes: Vec<String>,
    scope: Option<String>,
    filter: Option<String>,
    extensions: Vec<String>,
}

#[derive(Debug, Clone)]
enum ParseOutcome {
    Parsed(UrlParts),
    Rejected(String),
    Undecodable(DirectoryUrlError),
}

/// A lazily parsed directory URL.
#[derive(Debug, Clone)]
pub struct DirectoryUrl {
    raw: String,
    outcome: OnceLock<ParseOutcome>,
}

impl DirectoryUrl {
    /// Wraps a raw URL string. Nothing is parsed until a query method is called.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            outcome: OnceLock::new(),
        }
    }

    /// The URL as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn outcome(&self) -> &ParseOutcome {
        self.outcome.get_or_init(|| match parse(&self.raw) {
            Ok(parts) => ParseOutcome::Parsed(parts),
            Err(ParseFailure::Rejected(message)) => {
                debug!(url = %self.raw, %message, "directory URL rejected");
                ParseOutcome::Rejected(message)
            }
            Err(ParseFailure::Undecodable(err)) => ParseOutcome::Undecodable(err),
        })
    }

    fn parts(&self) -> Option<&UrlParts> {
        match self.outcome() {
            ParseOutcome::Parsed(parts) => Some(parts),
            _ => None,
        }
    }

    /// Whether the URL parsed. Triggers the parse on first call.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryUrlError`] if the host, name or filter field is not decodable.
    pub fn parsed_ok(&self) -> std::result::Result<bool, DirectoryUrlError> {
        match self.outcome() {
            ParseOutcome::Parsed(_) => Ok(true),
            ParseOutcome::Rejected(_) => Ok(false),
            ParseOutcome::Undecodable(err) => Err(err.clone()),
        }
    }

    /// Like [`parsed_ok`](Self::parsed_ok), folded into the core error type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUrl`] for a rejected URL and [`CoreError::Encoding`] for one
    /// that does not decode.
    pub fn check(&self) -> crate::Result<()> {
        match self.outcome() {
            ParseOutcome::Parsed(_) => Ok(()),
            ParseOutcome::Rejected(message) => Err(CoreError::InvalidUrl(message.clone())),
            ParseOutcome::Undecodable(err) => Err(err.clone().into()),
        }
    }

    /// Diagnostic for a rejected URL.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self.outcome() {
            ParseOutcome::Rejected(message) => Some(message),
            _ => None,
        }
    }

    /// `ldap` or `ldaps`, as written.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.parts().map(|parts| parts.scheme.as_str())
    }

    /// Decoded host.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.parts().and_then(|parts| parts.host.as_deref())
    }

    /// Port, undecoded.
    #[must_use]
    pub fn port(&self) -> Option<&str> {
        self.parts().and_then(|parts| parts.port.as_deref())
    }

    /// Decoded base name.
    #[must_use]
    pub fn dn(&self) -> Option<&str> {
        self.parts().and_then(|parts| parts.dn.as_deref())
    }

    /// Requested attribute names; empty when none were listed.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        self.parts()
            .map(|parts| parts.attributes.as_slice())
            .unwrap_or_default()
    }

    /// Raw scope token.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.parts().and_then(|parts| parts.scope.as_deref())
    }

    /// Scope token mapped to a [`SearchScope`].
    #[must_use]
    pub fn search_scope(&self) -> SearchScope {
        SearchScope::from_token(self.scope())
    }

    /// Decoded filter.
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.parts().and_then(|parts| parts.filter.as_deref())
    }

    /// The filter, or [`DEFAULT_FILTER`] when absent.
    #[must_use]
    pub fn search_filter_or_default(&self) -> &str {
        self.filter().unwrap_or(DEFAULT_FILTER)
    }

    /// Extensions, split on `,`.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        self.parts()
            .map(|parts| parts.extensions.as_slice())
            .unwrap_or_default()
    }
}

/// Parses every value of a member-URL attribute, keeping the URLs that parse.
pub fn get_ldap_urls<S: AsRef<str>>(values: &[S]) -> Vec<DirectoryUrl> {
    values
        .iter()
        .map(|value| DirectoryUrl::new(value.as_ref()))
        .filter(|url| match url.parsed_ok() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(url = url.as_str(), error = %err, "skipping undecodable directory URL");
                false
            }
        })
        .collect()
}

enum ParseFailure {
    Rejected(String),
    Undecodable(DirectoryUrlError),
}

impl From<DirectoryUrlError> for ParseFailure {
    fn from(err: DirectoryUrlError) -> Self {
        Self::Undecodable(err)
    }
}

/// Walks the delimited fields left to right. A field runs to the next delimiter or to the end.
struct FieldScanner<'a> {
    rest: Option<&'a str>,
}

impl<'a> FieldScanner<'a> {
    fn next_field(&mut self, delimiter: char) -> Option<&'a str> {
        let rest = self.rest?;
        match rest.find(delimiter) {
            Some(idx) => {
                self.rest = Some(&rest[idx + delimiter.len_utf8()..]);
                Some(&rest[..idx])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }

    fn remainder(&mut self) -> Option<&'a str> {
        self.rest.take()
    }
}

fn non_empty(field: Option<&str>) -> Option<&str> {
    field.filter(|value| !value.is_empty())
}

fn split_list(field: Option<&str>) -> Vec<String> {
    non_empty(field)
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn decode(field: &'static str, value: &str) -> std::result::Result<String, DirectoryUrlError> {
    let bytes = value.as_bytes();
    for (position, byte) in bytes.iter().enumerate() {
        if *byte == b'%' {
            let well_formed = bytes
                .get(position + 1..position + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return Err(DirectoryUrlError::MalformedEscape { field, position });
            }
        }
    }

    percent_decode_str(value)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|source| DirectoryUrlError::InvalidUtf8 { field, source })
}

fn decode_opt(
    field: &'static str,
    value: Option<&str>,
) -> std::result::Result<Option<String>, DirectoryUrlError> {
    non_empty(value).map(|v| decode(field, v)).transpose()
}

fn split_host_port(authority: &str) -> (&str, Option<&str>) {
    if let Some(bracketed) = authority.strip_prefix('[') {
        if let Some((host, after)) = bracketed.split_once(']') {
            return (host, after.strip_prefix(':'));
        }
    }
    match authority.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    }
}

fn parse(raw: &str) -> std::result::Result<UrlParts, ParseFailure> {
    let raw = raw.trim();
    let (scheme, rest) = raw.split_once(SCHEME_SEPARATOR).ok_or_else(|| {
        ParseFailure::Rejected(format!("missing `{SCHEME_SEPARATOR}` in `{raw}`"))
    })?;
    if !scheme.eq_ignore_ascii_case("ldap") && !scheme.eq_ignore_ascii_case("ldaps") {
        return Err(ParseFailure::Rejected(format!("invalid scheme `{scheme}`")));
    }

    let mut parts = UrlParts {
        scheme: scheme.to_string(),
        ..UrlParts::default()
    };
    let mut scanner = FieldScanner { rest: Some(rest) };

    if let Some(authority) = non_empty(scanner.next_field('/')) {
        let (host, port) = split_host_port(authority);
        parts.host = decode_opt("host", Some(host))?;
        parts.port = non_empty(port).map(str::to_string);
    }
    parts.dn = decode_opt("dn", scanner.next_field('?'))?;
    parts.attributes = split_list(scanner.next_field('?'));
    parts.scope = non_empty(scanner.next_field('?')).map(str::to_string);
    parts.filter = decode_opt("filter", scanner.next_field('?'))?;
    parts.extensions = split_list(scanner.remainder());

    Ok(parts)
}
