//! Search filter templates with `%v` token placeholders.
//!
//! A template such as `(&(objectClass=person)(cn=%v1)(sn=%v2-))` is compiled once and expanded
//! against whitespace-separated user input:
//!
//! | placeholder | expands to                     |
//! |-------------|--------------------------------|
//! | `%v`        | every token                    |
//! | `%vN`       | token `N` (1-based)            |
//! | `%vN-`      | token `N` through the last one |
//! | `%vN-M`     | tokens `N` through `M`         |
//!
//! Ranges are copied verbatim from the input, so whitespace between tokens is preserved.

use std::fmt;
use std::str::FromStr;

const TOKEN_DELIMITERS: [char; 4] = [' ', '\t', '\r', '\n'];

/// Inclusive, 1-based token range. An `end` of `None` means "through the last token".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRange {
    /// First token.
    pub start: usize,
    /// Last token, or `None` for all remaining tokens.
    pub end: Option<usize>,
}

impl TokenRange {
    /// Every token.
    pub const ALL: Self = Self {
        start: 1,
        end: None,
    };

    /// Byte span of the input covered by this range, if any token falls inside it.
    fn resolve(self, tokens: &[(usize, usize)]) -> Option<(usize, usize)> {
        let count = tokens.len();
        if self.start > count {
            return None;
        }
        let end = self.end.map_or(count, |end| end.min(count));
        if end < self.start {
            return None;
        }
        Some((tokens[self.start - 1].0, tokens[end - 1].1))
    }
}

/// One piece of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Copied to the output unchanged.
    Literal(String),
    /// Replaced by a token range of the input.
    Placeholder(TokenRange),
}

/// A compiled filter template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FilterTemplate {
    /// Compiles `template` into literal and placeholder segments.
    #[must_use]
    pub fn compile(template: &str) -> Self {
        let bytes = template.as_bytes();
        let mut segments = Vec::new();
        let mut literal_start = 0;
        let mut idx = 0;

        while idx < bytes.len() {
            if bytes[idx] == b'%' && bytes.get(idx + 1) == Some(&b'v') {
                if literal_start < idx {
                    segments.push(Segment::Literal(template[literal_start..idx].to_string()));
                }
                let (range, consumed) = parse_placeholder(&bytes[idx + 2..]);
                segments.push(Segment::Placeholder(range));
                idx += 2 + consumed;
                literal_start = idx;
            } else {
                idx += 1;
            }
        }
        if literal_start < bytes.len() {
            segments.push(Segment::Literal(template[literal_start..].to_string()));
        }

        Self {
            source: template.to_string(),
            segments,
        }
    }

    /// The template text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Compiled segments in template order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true if the template contains at least one `%v` placeholder.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Placeholder(_)))
    }

    /// Substitutes token ranges of `input` into the template.
    ///
    /// Placeholders that start past the last token expand to nothing.
    #[must_use]
    pub fn expand(&self, input: &str) -> String {
        self.expand_with(input, str::to_string)
    }

    /// Like [`expand`](Self::expand), but escapes filter metacharacters in substituted text.
    #[must_use]
    pub fn expand_escaped(&self, input: &str) -> String {
        self.expand_with(input, escape_filter_value)
    }

    fn expand_with(&self, input: &str, substitute: impl Fn(&str) -> String) -> String {
        let tokens = tokenize(input);
        let mut output = String::with_capacity(self.source.len() + input.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder(range) => {
                    if let Some((start, end)) = range.resolve(&tokens) {
                        output.push_str(&substitute(&input[start..end]));
                    }
                }
            }
        }

        output
    }
}

impl fmt::Display for FilterTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for FilterTemplate {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::compile(s))
    }
}

/// Parses the suffix after `%v`; returns the range and the number of bytes consumed.
fn parse_placeholder(rest: &[u8]) -> (TokenRange, usize) {
    let (start, start_len) = parse_number(rest);
    let Some(start) = start else {
        return (TokenRange::ALL, 0);
    };
    let start = start.max(1);

    if rest.get(start_len) != Some(&b'-') {
        return (
            TokenRange {
                start,
                end: Some(start),
            },
            start_len,
        );
    }

    let (end, end_len) = parse_number(&rest[start_len + 1..]);
    (TokenRange { start, end }, start_len + 1 + end_len)
}

fn parse_number(bytes: &[u8]) -> (Option<usize>, usize) {
    let len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return (None, 0);
    }
    let value = bytes[..len]
        .iter()
        .fold(0usize, |acc, digit| {
            acc.saturating_mul(10).saturating_add(usize::from(digit - b'0'))
        });
    (Some(value), len)
}

/// Byte spans of the whitespace-separated tokens of `input`.
fn tokenize(input: &str) -> Vec<(usize, usize)> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (idx, ch) in input.char_indices() {
        if TOKEN_DELIMITERS.contains(&ch) {
            if let Some(begin) = start.take() {
                tokens.push((begin, idx));
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(begin) = start {
        tokens.push((begin, input.len()));
    }

    tokens
}

fn escape_filter_value(value: &str) -> String {
    value
        .chars()
        .flat_map(|ch| match ch {
            '*' => "\\2a".chars().collect::<Vec<_>>(),
            '(' => "\\28".chars().collect(),
            ')' => "\\29".chars().collect(),
            '\\' => "\\5c".chars().collect(),
            '\0' => "\\00".chars().collect(),
            _ => vec![ch],
        })
        .collect::<String>()
}
