//! Report Configuration Accumulator
//!
//! Top-level holder of the latest value of every category. Categories are
//! fixed at construction and start absent. Each update produces a new
//! [`ReportConfiguration`] snapshot and hands it to every subscriber; the
//! internal state is never exposed mutably.

use reportwiz_protocol::{
    CategoryValue, ConfigError, ReportConfiguration, Result, WizardConfig, WizardError,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Callback receiving every rebuilt configuration.
pub type Subscriber = Box<dyn FnMut(&ReportConfiguration) + Send + Sync>;

/// Where the wizard stands with respect to submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationPhase {
    /// No category set
    Empty,
    /// Some categories set, a required one still missing
    Partial,
    /// Every required category set
    Submittable,
}

impl ConfigurationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigurationPhase::Empty => "empty",
            ConfigurationPhase::Partial => "partial",
            ConfigurationPhase::Submittable => "submittable",
        }
    }
}

impl fmt::Display for ConfigurationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ReportConfigurationAccumulator {
    required: Vec<String>,
    snapshot: ReportConfiguration,
    subscribers: Vec<Subscriber>,
}

impl fmt::Debug for ReportConfigurationAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfigurationAccumulator")
            .field("required", &self.required)
            .field("snapshot", &self.snapshot)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl ReportConfigurationAccumulator {
    /// Create an accumulator over `categories`, all absent.
    ///
    /// `required` must be a subset of `categories`.
    pub fn new<C, R, S, T>(categories: C, required: R) -> Result<Self>
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
        R: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let categories: Vec<String> = categories.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for category in &categories {
            if !seen.insert(category.as_str()) {
                return Err(ConfigError::DuplicateCategory(category.clone()).into());
            }
        }

        let required: Vec<String> = required.into_iter().map(Into::into).collect();
        if let Some(unknown) = required.iter().find(|r| !seen.contains(r.as_str())) {
            return Err(ConfigError::UnknownRequired(unknown.clone()).into());
        }

        Ok(Self {
            required,
            snapshot: ReportConfiguration::empty(&categories),
            subscribers: Vec::new(),
        })
    }

    pub fn from_config(config: &WizardConfig) -> Result<Self> {
        Self::new(config.category_names(), config.required.iter().cloned())
    }

    /// Register a callback for every rebuilt configuration.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&ReportConfiguration) + Send + Sync + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Replace the value of `category` (`None` resets it to absent).
    pub fn update_category(
        &mut self,
        category: &str,
        value: Option<CategoryValue>,
    ) -> Result<ReportConfiguration> {
        self.snapshot = self.snapshot.with_value(category, value)?;
        for subscriber in &mut self.subscribers {
            subscriber(&self.snapshot);
        }
        Ok(self.snapshot.clone())
    }

    pub fn phase(&self) -> ConfigurationPhase {
        if self.snapshot.is_empty() {
            ConfigurationPhase::Empty
        } else if self.missing_required().is_empty() {
            ConfigurationPhase::Submittable
        } else {
            ConfigurationPhase::Partial
        }
    }

    pub fn is_submittable(&self) -> bool {
        self.phase() == ConfigurationPhase::Submittable
    }

    /// Required categories that are still absent, in declaration order of `required`.
    pub fn missing_required(&self) -> Vec<String> {
        self.required
            .iter()
            .filter(|category| !self.snapshot.is_set(category.as_str()))
            .cloned()
            .collect()
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Immutable snapshot of the current configuration.
    pub fn build_configuration(&self) -> ReportConfiguration {
        self.snapshot.clone()
    }

    /// Snapshot for submission, or the reason it is not allowed yet.
    pub fn submit(&self) -> Result<ReportConfiguration> {
        match self.phase() {
            ConfigurationPhase::Submittable => Ok(self.build_configuration()),
            ConfigurationPhase::Empty | ConfigurationPhase::Partial => {
                let mut missing = self.missing_required();
                if missing.is_empty() {
                    // Nothing required, but nothing set either
                    missing = self.snapshot.categories().map(String::from).collect();
                }
                Err(WizardError::SubmissionPrecondition { missing })
            }
        }
    }
}
