//! Error types for the wizard filter core.

use thiserror::Error;

/// Wizard operation result type.
pub type Result<T> = std::result::Result<T, WizardError>;

/// Failure reported by a hint provider.
///
/// These never reach the user; the owning field clears its pending flag and
/// shows an empty hint list instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HintFetchError {
    #[error("Hint provider failed: {0}")]
    Provider(String),

    #[error("No hints available for category: {0}")]
    UnknownCategory(String),

    #[error("Hint provider unavailable")]
    Unavailable,
}

/// Failure reported by the report-building backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportBuildError {
    #[error("Report rejected: {0}")]
    Rejected(String),

    #[error("Report backend unreachable: {0}")]
    Transport(String),
}

/// Wizard configuration errors, raised while loading or validating TOML.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid wizard config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Wizard config declares no categories")]
    NoCategories,

    #[error("Duplicate category: {0}")]
    DuplicateCategory(String),

    #[error("Duplicate field '{field}' in category '{category}'")]
    DuplicateField { category: String, field: String },

    /// Names address fields as `category.field`, so they cannot contain a dot.
    #[error("Invalid name '{0}': category and field names must not contain '.'")]
    InvalidName(String),

    #[error("Composite category '{0}' has no fields")]
    EmptyComposite(String),

    #[error("Category '{category}' of kind '{kind}' does not accept {what}")]
    UnexpectedSetting {
        category: String,
        kind: &'static str,
        what: &'static str,
    },

    #[error("Required category is not declared: {0}")]
    UnknownRequired(String),

    #[error("Debounce window must be positive (category '{0}')")]
    ZeroDebounce(String),
}

/// Errors returned by wizard controllers and the accumulator.
#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown field '{field}' in category '{category}'")]
    UnknownField { category: String, field: String },

    #[error("Category '{category}' does not accept {operation}")]
    UnsupportedOperation {
        category: String,
        operation: &'static str,
    },

    /// Submit attempted while required categories are unset.
    #[error("Report configuration is not submittable; missing: {}", missing.join(", "))]
    SubmissionPrecondition { missing: Vec<String> },

    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),

    #[error(transparent)]
    ReportBuild(#[from] ReportBuildError),

    #[error("Wizard session closed")]
    SessionClosed,
}

impl WizardError {
    /// Create an unknown field error.
    pub fn unknown_field(category: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            category: category.into(),
            field: field.into(),
        }
    }

    /// Create an unknown category error.
    pub fn unknown_category(category: impl Into<String>) -> Self {
        Self::UnknownCategory(category.into())
    }
}
