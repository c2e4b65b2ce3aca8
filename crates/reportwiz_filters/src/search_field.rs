//! Search Field Controller
//!
//! One free-text input bound to a hint provider. The controller is a plain
//! state machine: it never sleeps or fetches by itself. The owner (usually
//! [`crate::session::WizardSession`]) performs the effects it asks for and
//! feeds the results back, tagged with the generation they were issued for.
//!
//! Every keystroke and every selection bumps the field generation. A debounce
//! timer or hint fetch whose generation is no longer current is ignored when
//! it completes, so only the latest fetch can change the field.

use reportwiz_protocol::{FieldConfig, FieldState, FilterValue, HintCandidate, HintFetchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use reportwiz_protocol::defaults::DEFAULT_DEBOUNCE_MS;

/// Address of one search field inside a wizard: `category` or `category.field`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct FieldKey {
    pub category: String,
    pub field: Option<String>,
}

impl FieldKey {
    /// Key of a standalone search or tag input.
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            field: None,
        }
    }

    /// Key of a sub-field of a composite category.
    pub fn composite(category: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            field: Some(field.into()),
        }
    }

    /// Parse `category` or `category.field`.
    pub fn parse(key: &str) -> Self {
        match key.split_once('.') {
            Some((category, field)) => Self::composite(category, field),
            None => Self::category(key),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}", self.category, field),
            None => f.write_str(&self.category),
        }
    }
}

impl From<String> for FieldKey {
    fn from(key: String) -> Self {
        Self::parse(&key)
    }
}

impl From<&str> for FieldKey {
    fn from(key: &str) -> Self {
        Self::parse(key)
    }
}

impl From<FieldKey> for String {
    fn from(key: FieldKey) -> Self {
        key.to_string()
    }
}

/// Per-field behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOptions {
    /// Category passed to the hint provider
    pub hint_category: String,
    /// An empty query clears the selection immediately
    pub select_on_empty: bool,
    pub debounce: Duration,
}

impl FieldOptions {
    pub fn new(hint_category: impl Into<String>) -> Self {
        Self {
            hint_category: hint_category.into(),
            select_on_empty: false,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }

    pub fn with_select_on_empty(mut self, enabled: bool) -> Self {
        self.select_on_empty = enabled;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn from_config(field: &FieldConfig, debounce: Duration) -> Self {
        Self::new(field.hint_category())
            .with_select_on_empty(field.select_on_empty)
            .with_debounce(debounce)
    }
}

/// What the owner must do after a keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeEffect {
    /// The selection was resolved without a fetch; notify the parent.
    Resolved(Option<FilterValue>),
    /// Wait `delay`, then call [`SearchField::on_debounce_elapsed`] with `generation`.
    ScheduleFetch { generation: u64, delay: Duration },
    /// Nothing to do.
    Ignored,
}

/// A fetch the owner must issue against the hint provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRequest {
    pub generation: u64,
    pub category: String,
    pub query: String,
}

/// Result of feeding a completed fetch back into the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintOutcome {
    /// Hints replaced the shown list.
    Applied,
    /// Provider failed; the shown list is now empty.
    Failed(HintFetchError),
    /// Superseded by a newer keystroke or selection; discarded.
    Stale,
    /// Field is unmounted; discarded.
    Disregarded,
}

/// Result of selecting a hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Selection changed; notify the parent.
    Resolved(FilterValue),
    /// Same value as before; nothing to notify.
    Unchanged,
    /// The candidate is not among the shown hints.
    Rejected,
    Disregarded,
}

#[derive(Debug, Clone)]
pub struct SearchField {
    key: FieldKey,
    options: FieldOptions,
    state: FieldState,
    generation: u64,
    /// Generation of the fetch currently in flight, if any
    in_flight: Option<u64>,
    mounted: bool,
}

impl SearchField {
    pub fn new(key: FieldKey, options: FieldOptions) -> Self {
        Self {
            key,
            options,
            state: FieldState::default(),
            generation: 0,
            in_flight: None,
            mounted: true,
        }
    }

    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    pub fn state(&self) -> &FieldState {
        &self.state
    }

    pub fn selected_value(&self) -> Option<&FilterValue> {
        self.state.selected_value.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Record typed text.
    pub fn on_type(&mut self, raw: &str) -> TypeEffect {
        if !self.mounted {
            return TypeEffect::Ignored;
        }
        self.generation += 1;
        self.state.query = raw.to_string();

        if raw.is_empty() && self.options.select_on_empty {
            self.drop_hints();
            return match self.state.selected_value.take() {
                Some(_) => TypeEffect::Resolved(None),
                None => TypeEffect::Ignored,
            };
        }

        TypeEffect::ScheduleFetch {
            generation: self.generation,
            delay: self.options.debounce,
        }
    }

    /// The debounce timer for `generation` fired.
    ///
    /// Returns the fetch to issue, or `None` if more typing happened since.
    pub fn on_debounce_elapsed(&mut self, generation: u64) -> Option<HintRequest> {
        if !self.mounted || generation != self.generation || self.in_flight == Some(generation) {
            return None;
        }
        self.in_flight = Some(generation);
        self.state.pending = true;
        Some(HintRequest {
            generation,
            category: self.options.hint_category.clone(),
            query: self.state.query.clone(),
        })
    }

    /// A fetch issued for `generation` completed.
    pub fn on_hints(
        &mut self,
        generation: u64,
        result: Result<Vec<HintCandidate>, HintFetchError>,
    ) -> HintOutcome {
        if !self.mounted {
            return HintOutcome::Disregarded;
        }
        if self.in_flight == Some(generation) {
            self.in_flight = None;
            self.state.pending = false;
        }
        if generation != self.generation {
            debug!(field = %self.key, generation, current = self.generation, "discarding stale hints");
            return HintOutcome::Stale;
        }

        match result {
            Ok(hints) => {
                self.state.hints = hints;
                HintOutcome::Applied
            }
            Err(err) => {
                self.state.hints.clear();
                HintOutcome::Failed(err)
            }
        }
    }

    /// The user picked `candidate` from the shown hints.
    pub fn on_select(&mut self, candidate: &HintCandidate) -> SelectOutcome {
        if !self.mounted {
            return SelectOutcome::Disregarded;
        }
        if !self.state.shows(&candidate.value) {
            debug!(field = %self.key, value = %candidate.value, "ignoring selection of a hint that is not shown");
            return SelectOutcome::Rejected;
        }

        self.generation += 1;
        self.drop_hints();
        self.state.query = candidate.display.clone();

        if self.state.selected_value.as_ref() == Some(&candidate.value) {
            return SelectOutcome::Unchanged;
        }
        self.state.selected_value = Some(candidate.value.clone());
        SelectOutcome::Resolved(candidate.value.clone())
    }

    /// Reset text and selection, e.g. after a tag input turned its selection into a tag.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.drop_hints();
        self.state.query.clear();
        self.state.selected_value = None;
    }

    /// Keep only the shown hints matching `keep`. Returns whether any were dropped.
    pub fn retain_hints<F>(&mut self, keep: F) -> bool
    where
        F: FnMut(&HintCandidate) -> bool,
    {
        let before = self.state.hints.len();
        self.state.hints.retain(keep);
        self.state.hints.len() != before
    }

    /// Every later timer, fetch result or input is disregarded.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.in_flight = None;
        self.state.pending = false;
    }

    fn drop_hints(&mut self) {
        self.in_flight = None;
        self.state.pending = false;
        self.state.hints.clear();
    }
}
