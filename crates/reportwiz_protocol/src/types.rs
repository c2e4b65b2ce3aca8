//! Value types passed between wizard controllers.
//!
//! Everything here is a plain value: controllers hand out owned snapshots and
//! never expose their live state.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::defaults::TAG_PALETTE;
use crate::error::{Result, WizardError};

// ============================================================================
// Session ID
// ============================================================================

/// Wizard session identifier (UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ============================================================================
// Hints
// ============================================================================

/// Opaque key identifying a resolved filter value (a city code, a tag id...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterValue(String);

impl FilterValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A suggestion offered while typing into a filter field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HintCandidate {
    pub value: FilterValue,
    pub display: String,
}

impl HintCandidate {
    pub fn new(value: impl Into<FilterValue>, display: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            display: display.into(),
        }
    }
}

// ============================================================================
// Field state
// ============================================================================

/// Observable state of one free-text search field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldState {
    /// Raw typed text
    pub query: String,
    /// Resolved selection, if any
    pub selected_value: Option<FilterValue>,
    /// Hints most recently shown, in provider order
    pub hints: Vec<HintCandidate>,
    /// A hint fetch is in flight
    pub pending: bool,
}

impl FieldState {
    /// Whether `value` is among the hints currently shown.
    pub fn shows(&self, value: &FilterValue) -> bool {
        self.hints.iter().any(|hint| &hint.value == value)
    }
}

// ============================================================================
// Composite filter
// ============================================================================

/// Several jointly-resolved sub-fields (e.g. city and state).
///
/// Field names are fixed at construction; only their values change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeFilter {
    fields: BTreeMap<String, Option<FilterValue>>,
}

impl CompositeFilter {
    /// Create a filter with every field unset.
    pub fn new<I, S>(field_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: field_names.into_iter().map(|name| (name.into(), None)).collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.fields.get(field).and_then(Option::as_ref)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Return a copy with `field` set to `value`; every other field is kept.
    pub fn with_field(&self, field: &str, value: Option<FilterValue>) -> Option<Self> {
        if !self.fields.contains_key(field) {
            return None;
        }
        let mut next = self.clone();
        next.fields.insert(field.to_string(), value);
        Some(next)
    }

    /// True when no field has a value.
    pub fn is_unset(&self) -> bool {
        self.fields.values().all(Option::is_none)
    }

    pub fn is_complete(&self) -> bool {
        self.fields.values().all(Option::is_some)
    }
}

impl Serialize for CompositeFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let set: Vec<_> = self
            .fields
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name, v)))
            .collect();
        let mut map = serializer.serialize_map(Some(set.len()))?;
        for (name, value) in set {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ============================================================================
// Tags
// ============================================================================

/// A selected tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub value: FilterValue,
    pub display: String,
    pub color: String,
}

impl Tag {
    /// Build a tag from a hint, deriving its color from the tag value.
    pub fn from_candidate(candidate: &HintCandidate) -> Self {
        Self {
            value: candidate.value.clone(),
            display: candidate.display.clone(),
            color: tag_color(&candidate.value).to_string(),
        }
    }
}

/// Stable palette color for a tag value.
pub fn tag_color(value: &FilterValue) -> &'static str {
    let hash = blake3::hash(value.as_str().as_bytes());
    let index = hash.as_bytes()[0] as usize % TAG_PALETTE.len();
    TAG_PALETTE[index]
}

/// Ordered set of selected tags, unique by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: &FilterValue) -> bool {
        self.tags.iter().any(|tag| &tag.value == value)
    }

    /// Append `tag` unless its value is already present. Returns whether the set changed.
    pub fn insert(&mut self, tag: Tag) -> bool {
        if self.contains(&tag.value) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Remove the tag with `value`. Returns whether the set changed.
    pub fn remove(&mut self, value: &FilterValue) -> bool {
        let before = self.tags.len();
        self.tags.retain(|tag| &tag.value != value);
        self.tags.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &FilterValue> {
        self.tags.iter().map(|tag| &tag.value)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

// ============================================================================
// Report configuration
// ============================================================================

/// The resolved value of one report-configuration category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CategoryValue {
    Composite(CompositeFilter),
    Tags(TagSet),
    Scalar(FilterValue),
}

impl CategoryValue {
    pub fn kind(&self) -> &'static str {
        match self {
            CategoryValue::Composite(_) => "composite",
            CategoryValue::Tags(_) => "tags",
            CategoryValue::Scalar(_) => "scalar",
        }
    }
}

impl From<FilterValue> for CategoryValue {
    fn from(value: FilterValue) -> Self {
        CategoryValue::Scalar(value)
    }
}

impl From<&str> for CategoryValue {
    fn from(value: &str) -> Self {
        CategoryValue::Scalar(FilterValue::from(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfigEntry {
    category: Arc<str>,
    value: Option<Arc<CategoryValue>>,
}

/// Immutable snapshot of every category's latest value.
///
/// Snapshots are cheap to clone. Producing a new snapshot with one changed
/// category reuses the `Arc`s of all other entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfiguration {
    entries: Arc<Vec<ConfigEntry>>,
}

impl ReportConfiguration {
    /// Create a configuration with every category absent, in declaration order.
    pub fn empty<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = categories
            .into_iter()
            .map(|category| ConfigEntry {
                category: Arc::from(category.as_ref()),
                value: None,
            })
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Return a new snapshot with `category` replaced by `value`.
    pub fn with_value(&self, category: &str, value: Option<CategoryValue>) -> Result<Self> {
        if !self.has_category(category) {
            return Err(WizardError::unknown_category(category));
        }
        let value = value.map(Arc::new);
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                if &*entry.category == category {
                    ConfigEntry {
                        category: Arc::clone(&entry.category),
                        value: value.clone(),
                    }
                } else {
                    entry.clone()
                }
            })
            .collect();
        Ok(Self {
            entries: Arc::new(entries),
        })
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.entries.iter().any(|entry| &*entry.category == category)
    }

    pub fn get(&self, category: &str) -> Option<&CategoryValue> {
        self.entries
            .iter()
            .find(|entry| &*entry.category == category)
            .and_then(|entry| entry.value.as_deref())
    }

    pub fn is_set(&self, category: &str) -> bool {
        self.get(category).is_some()
    }

    /// Category names in declaration order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| &*entry.category)
    }

    /// Set categories and their values, in declaration order.
    pub fn iter_set(&self) -> impl Iterator<Item = (&str, &CategoryValue)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.value.as_deref().map(|v| (&*entry.category, v)))
    }

    pub fn set_count(&self) -> usize {
        self.iter_set().count()
    }

    pub fn is_empty(&self) -> bool {
        self.set_count() == 0
    }

    /// Whether both snapshots hold the very same allocation for `category`.
    pub fn shares_value_with(&self, other: &ReportConfiguration, category: &str) -> bool {
        let find = |config: &ReportConfiguration| {
            config
                .entries
                .iter()
                .find(|entry| &*entry.category == category)
                .and_then(|entry| entry.value.clone())
        };
        match (find(self), find(other)) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    /// JSON object of the set categories, as sent to the report backend.
    pub fn to_filters_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for ReportConfiguration {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.set_count()))?;
        for (category, value) in self.iter_set() {
            map.serialize_entry(category, value)?;
        }
        map.end()
    }
}
