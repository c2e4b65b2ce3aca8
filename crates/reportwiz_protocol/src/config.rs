//! Wizard configuration loaded from TOML.
//!
//! A config declares the fixed category list, which of them are required for
//! submission, and how each category's inputs behave.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::defaults::{DEFAULT_DEBOUNCE_MS, TAG_HINT_CATEGORY};
use crate::error::ConfigError;
use crate::report::ReportTarget;

/// How a category collects its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    /// Several search fields merged into one object (city + state)
    Composite,
    /// Ordered tag set with tag hints
    Tags,
    /// One search field with autocomplete
    Search,
    /// Plain dropdown value, set directly without hints
    Choice,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Composite => "composite",
            CategoryKind::Tags => "tags",
            CategoryKind::Search => "search",
            CategoryKind::Choice => "choice",
        }
    }
}

/// One search field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// Category passed to the hint provider (defaults to the field name)
    #[serde(default)]
    pub hint_category: Option<String>,
    /// Clearing the text clears the selection
    #[serde(default)]
    pub select_on_empty: bool,
    /// Per-field override of the wizard debounce window
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint_category: None,
            select_on_empty: false,
            debounce_ms: None,
        }
    }

    pub fn hint_category(&self) -> &str {
        self.hint_category.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub kind: CategoryKind,
    /// Sub-fields of a composite category
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub hint_category: Option<String>,
    #[serde(default)]
    pub select_on_empty: bool,
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

impl CategoryConfig {
    pub fn hint_category(&self) -> &str {
        match (&self.hint_category, self.kind) {
            (Some(category), _) => category.as_str(),
            (None, CategoryKind::Tags) => TAG_HINT_CATEGORY,
            (None, _) => self.name.as_str(),
        }
    }

    /// Search-field settings of a standalone search or tag category.
    pub fn as_field(&self) -> FieldConfig {
        FieldConfig {
            name: self.name.clone(),
            hint_category: Some(self.hint_category().to_string()),
            select_on_empty: self.select_on_empty,
            debounce_ms: self.debounce_ms,
        }
    }
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Categories that must be set before the wizard may submit
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub report: Option<ReportTarget>,
    pub categories: Vec<CategoryConfig>,
}

impl WizardConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: WizardConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        if self.debounce_ms == 0 {
            return Err(ConfigError::ZeroDebounce("wizard".to_string()));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            check_name(&category.name)?;
            if !seen.insert(category.name.as_str()) {
                return Err(ConfigError::DuplicateCategory(category.name.clone()));
            }
            validate_category(category)?;
        }

        for required in &self.required {
            if !seen.contains(required.as_str()) {
                return Err(ConfigError::UnknownRequired(required.clone()));
            }
        }
        Ok(())
    }

    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Category names in declaration order.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn is_required(&self, category: &str) -> bool {
        self.required.iter().any(|r| r == category)
    }

    /// Debounce window for `field`, falling back to the wizard default.
    pub fn debounce_for(&self, field: &FieldConfig) -> Duration {
        Duration::from_millis(field.debounce_ms.unwrap_or(self.debounce_ms))
    }
}

fn check_name(name: &str) -> Result<(), ConfigError> {
    if name.contains('.') {
        return Err(ConfigError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn validate_category(category: &CategoryConfig) -> Result<(), ConfigError> {
    let unexpected = |what: &'static str| ConfigError::UnexpectedSetting {
        category: category.name.clone(),
        kind: category.kind.as_str(),
        what,
    };

    if category.debounce_ms == Some(0) {
        return Err(ConfigError::ZeroDebounce(category.name.clone()));
    }

    match category.kind {
        CategoryKind::Composite => {
            if category.fields.is_empty() {
                return Err(ConfigError::EmptyComposite(category.name.clone()));
            }
            if category.hint_category.is_some() {
                return Err(unexpected("hint_category (set it per field)"));
            }
            let mut fields = HashSet::new();
            for field in &category.fields {
                check_name(&field.name)?;
                if !fields.insert(field.name.as_str()) {
                    return Err(ConfigError::DuplicateField {
                        category: category.name.clone(),
                        field: field.name.clone(),
                    });
                }
                if field.debounce_ms == Some(0) {
                    return Err(ConfigError::ZeroDebounce(format!(
                        "{}.{}",
                        category.name, field.name
                    )));
                }
            }
        }
        CategoryKind::Tags | CategoryKind::Search => {
            if !category.fields.is_empty() {
                return Err(unexpected("fields"));
            }
        }
        CategoryKind::Choice => {
            if !category.fields.is_empty() {
                return Err(unexpected("fields"));
            }
            if category.hint_category.is_some() {
                return Err(unexpected("hint_category"));
            }
            if category.select_on_empty {
                return Err(unexpected("select_on_empty"));
            }
        }
    }
    Ok(())
}
