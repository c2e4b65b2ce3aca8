//! User-facing CLI errors.
//!
//! A [`HelpfulError`] says what failed, where, and what to try next. In
//! `--json` mode the same three parts are printed as an object on stdout.

use reportwiz_protocol::ConfigError;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    /// Lines starting with `TRY:`
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            ..self
        }
    }

    pub fn with_suggestion(self, suggestion: impl Into<String>) -> Self {
        self.with_suggestions([suggestion])
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn file_not_found(path: &Path) -> Self {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self::new(format!("No such file: {}", path.display())).with_suggestions([
            format!("TRY: ls {}", dir.display()),
            "TRY: Use the samples in demos/ as a starting point".to_string(),
        ])
    }

    /// Wizard config failed to parse or validate
    pub fn invalid_config(path: &Path, err: &ConfigError) -> Self {
        let suggestion = match err {
            ConfigError::Parse(_) => "TRY: Check the TOML syntax near the reported position",
            ConfigError::NoCategories => "TRY: Declare at least one [[categories]] table",
            ConfigError::DuplicateCategory(_) | ConfigError::DuplicateField { .. } => {
                "TRY: Give every category, and every field within a composite, a unique name"
            }
            ConfigError::InvalidName(_) => {
                "TRY: Rename it without '.'; fields are addressed as category.field"
            }
            ConfigError::EmptyComposite(_) => {
                "TRY: Add fields = [{ name = \"...\" }] to the composite category"
            }
            ConfigError::UnexpectedSetting { .. } => {
                "TRY: Remove the setting or change the category kind"
            }
            ConfigError::UnknownRequired(_) => {
                "TRY: Only list declared category names in `required`"
            }
            ConfigError::ZeroDebounce(_) => "TRY: Use a positive debounce_ms (default 300)",
            ConfigError::Io(_) => "TRY: Verify you have read permissions for this file",
        };

        Self::new(format!("Invalid wizard config: {}", err))
            .with_context(format!("While loading {}", path.display()))
            .with_suggestions([
                suggestion.to_string(),
                format!("TRY: reportwiz validate {}", path.display()),
            ])
    }

    /// JSON input failed to parse
    pub fn json_parse_error(path: &Path, what: &str, details: &str) -> Self {
        Self::new(format!("Invalid {} JSON: {}", what, details))
            .with_context(format!("While loading {}", path.display()))
            .with_suggestion(format!("TRY: Compare with demos/{}.json", what))
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;
        if let Some(context) = &self.context {
            writeln!(f, "CONTEXT: {}", context)?;
        }
        for (index, suggestion) in self.suggestions.iter().enumerate() {
            if index == 0 {
                writeln!(f)?;
            }
            writeln!(f, "  {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print `err` as a JSON object on stdout.
pub fn print_json_error(err: &anyhow::Error) {
    let value = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "error": helpful.message,
            "context": helpful.context,
            "suggestions": helpful.suggestions,
        }),
        None => serde_json::json!({ "error": format!("{:#}", err) }),
    };
    println!("{}", value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Session closed")
            .with_context("While replaying script.json")
            .with_suggestion("TRY: Run with --verbose");

        let display = err.to_string();
        assert!(display.starts_with("ERROR: Session closed\n"));
        assert!(display.contains("CONTEXT: While replaying script.json"));
        assert!(display.ends_with("  TRY: Run with --verbose\n"));
    }

    #[test]
    fn test_invalid_config_suggests_fix() {
        let path = PathBuf::from("wizard.toml");
        let err = HelpfulError::invalid_config(&path, &ConfigError::UnknownRequired("zip".into()));

        let display = format!("{}", err);
        assert!(display.contains("zip"));
        assert!(display.contains("required"));
        assert!(display.contains("reportwiz validate wizard.toml"));
    }

    #[test]
    fn test_file_not_found() {
        let err = HelpfulError::file_not_found(&PathBuf::from("/nonexistent/script.json"));
        let display = format!("{}", err);
        assert!(display.contains("/nonexistent/script.json"));
        assert!(display.contains("TRY:"));
    }
}
