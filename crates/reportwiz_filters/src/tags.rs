//! Tag Filter Controller
//!
//! Ordered set of selected tags plus the search input used to find more.
//! Hints offered for the input never include tags that are already selected.

use reportwiz_protocol::{FilterValue, HintCandidate, HintFetchError, HintProvider, Tag, TagSet};

use crate::search_field::{FieldKey, FieldOptions, HintOutcome, SearchField, SelectOutcome};

#[derive(Debug, Clone)]
pub struct TagFilterController {
    category: String,
    tags: TagSet,
    input: SearchField,
}

impl TagFilterController {
    pub fn new(category: impl Into<String>, options: FieldOptions) -> Self {
        let category = category.into();
        Self {
            input: SearchField::new(FieldKey::category(category.clone()), options),
            category,
            tags: TagSet::new(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn input(&self) -> &SearchField {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut SearchField {
        &mut self.input
    }

    /// Append the tag for `candidate` and drop it from the shown hints.
    ///
    /// Returns the updated set, or `None` if the value was already selected.
    pub fn add_tag(&mut self, candidate: &HintCandidate) -> Option<TagSet> {
        if !self.tags.insert(Tag::from_candidate(candidate)) {
            return None;
        }
        self.prune_hints();
        Some(self.tags.clone())
    }

    /// Remove the tag with `value`. Returns `None` if it was not selected.
    pub fn remove_tag(&mut self, value: &FilterValue) -> Option<TagSet> {
        if self.tags.remove(value) {
            Some(self.tags.clone())
        } else {
            None
        }
    }

    /// Turn a hint picked in the tag input into a tag and reset the input.
    pub fn select(&mut self, candidate: &HintCandidate) -> Option<TagSet> {
        match self.input.on_select(candidate) {
            SelectOutcome::Resolved(_) | SelectOutcome::Unchanged => {
                self.input.clear();
                self.add_tag(candidate)
            }
            SelectOutcome::Rejected | SelectOutcome::Disregarded => None,
        }
    }

    /// Feed a completed input fetch back, dropping already-selected tags.
    pub fn apply_hints(
        &mut self,
        generation: u64,
        result: Result<Vec<HintCandidate>, HintFetchError>,
    ) -> HintOutcome {
        let result = result.map(|hints| self.exclude_selected(hints).collect());
        self.input.on_hints(generation, result)
    }

    /// Ask `provider` for tag suggestions matching `partial`.
    ///
    /// The returned iterator skips tags selected at the time of the call.
    pub async fn get_hints<P>(
        &self,
        provider: &P,
        partial: &str,
    ) -> Result<TagHints<'_>, HintFetchError>
    where
        P: HintProvider + ?Sized,
    {
        let hints = provider
            .fetch_hints(&self.input.options().hint_category, partial)
            .await?;
        Ok(self.exclude_selected(hints))
    }

    /// Remove selected tags from the hints currently shown by the input.
    ///
    /// Returns whether the shown hints changed.
    pub fn prune_hints(&mut self) -> bool {
        let selected = &self.tags;
        self.input.retain_hints(|hint| !selected.contains(&hint.value))
    }

    fn exclude_selected(&self, hints: Vec<HintCandidate>) -> TagHints<'_> {
        TagHints {
            hints: hints.into_iter(),
            selected: &self.tags,
        }
    }
}

/// Lazy sequence of tag hints that skips selected tags.
#[derive(Debug)]
pub struct TagHints<'a> {
    hints: std::vec::IntoIter<HintCandidate>,
    selected: &'a TagSet,
}

impl Iterator for TagHints<'_> {
    type Item = HintCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        let selected = self.selected;
        self.hints.find(|hint| !selected.contains(&hint.value))
    }
}
