//! Search result entries held by [`crate::SearchResultCache`].

use std::fmt;
use std::sync::Arc;

/// Explicit deep copy. Implementors guarantee that mutating the copy never affects the source.
pub trait DeepCopy {
    /// Returns an independent copy of `self`.
    #[must_use]
    fn deep_copy(&self) -> Self;
}

/// A single attribute value as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    /// String syntax value.
    Text(String),
    /// Binary syntax value (certificates, GUIDs, photos).
    Binary(Vec<u8>),
}

impl AttributeValue {
    /// The value as text, if it has string syntax.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Raw bytes of the value; UTF-8 bytes for text values.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

/// A named, ordered list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    values: Vec<AttributeValue>,
}

impl Attribute {
    /// Creates an attribute from its name and values.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Attribute name as first supplied.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values in server order.
    #[must_use]
    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// Appends a value.
    pub fn push(&mut self, value: impl Into<AttributeValue>) {
        self.values.push(value.into());
    }
}

/// Attribute collection keyed by case-insensitive name, preserving insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<Attribute>,
}

impl Attributes {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|attribute| attribute.name.eq_ignore_ascii_case(name))
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.position(name).map(|idx| &self.entries[idx])
    }

    /// Mutable lookup by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.position(name).map(move |idx| &mut self.entries[idx])
    }

    /// Replaces (or inserts) the attribute and returns the previous one.
    pub fn put(&mut self, name: impl Into<String>, values: Vec<AttributeValue>) -> Option<Attribute> {
        let attribute = Attribute::new(name, values);
        match self.position(&attribute.name) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx], attribute)),
            None => {
                self.entries.push(attribute);
                None
            }
        }
    }

    /// Appends a value, creating the attribute if needed.
    pub fn add_value(&mut self, name: &str, value: impl Into<AttributeValue>) {
        match self.get_mut(name) {
            Some(attribute) => attribute.push(value),
            None => self.entries.push(Attribute::new(name, vec![value.into()])),
        }
    }

    /// Removes an attribute by name.
    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.position(name).map(|idx| self.entries.remove(idx))
    }

    /// First value of the attribute if present.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&AttributeValue> {
        self.get(name).and_then(|attribute| attribute.values.first())
    }

    /// First value of the attribute as text.
    #[must_use]
    pub fn first_text(&self, name: &str) -> Option<&str> {
        self.first(name).and_then(AttributeValue::as_text)
    }

    /// Parses the attribute as boolean (`true` / `1`).
    #[must_use]
    pub fn bool_value(&self, name: &str) -> bool {
        self.first_text(name)
            .map(|value| value.eq_ignore_ascii_case("true") || value == "1")
            .unwrap_or(false)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> + '_ {
        self.entries.iter()
    }
}

impl DeepCopy for Attributes {
    fn deep_copy(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|attribute| Attribute {
                    name: attribute.name.clone(),
                    values: attribute.values.to_vec(),
                })
                .collect(),
        }
    }
}

impl FromIterator<Attribute> for Attributes {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        let mut attributes = Self::new();
        for attribute in iter {
            attributes.put(attribute.name, attribute.values);
        }
        attributes
    }
}

/// Kind of change an entry describes when it comes from a change log search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    /// Entry was added.
    Add,
    /// Entry was deleted.
    Delete,
    /// Entry attributes changed.
    Modify,
    /// Entry was renamed or moved.
    Rename,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Modify => "modify",
            Self::Rename => "rename",
        })
    }
}

/// One entry of a completed search.
///
/// The name is immutable and shared between copies; attributes are owned per copy.
#[derive(Debug, PartialEq, Eq)]
pub struct CachedEntry {
    name: Arc<str>,
    attributes: Attributes,
    change_type: Option<ChangeType>,
}

impl CachedEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
            change_type: None,
        }
    }

    /// Tags the entry with a change type.
    #[must_use]
    pub fn with_change_type(mut self, change_type: ChangeType) -> Self {
        self.change_type = Some(change_type);
        self
    }

    /// Entry name as returned by the directory (often relative to the search base).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the entry name.
    #[must_use]
    pub fn shared_name(&self) -> &Arc<str> {
        &self.name
    }

    /// Entry attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Mutable entry attributes.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Change type, if any.
    #[must_use]
    pub fn change_type(&self) -> Option<ChangeType> {
        self.change_type
    }
}

impl DeepCopy for CachedEntry {
    fn deep_copy(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            attributes: self.attributes.deep_copy(),
            change_type: self.change_type,
        }
    }
}
