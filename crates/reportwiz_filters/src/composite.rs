//! Composite Filter Controller
//!
//! Owns the search fields of one composite category (city + state) and merges
//! their independently resolved values. Every change republishes the whole
//! [`CompositeFilter`], never a diff, so consumers always see a consistent
//! snapshot regardless of the order in which sibling fields resolved.

use reportwiz_protocol::{CompositeFilter, FilterValue, Result, WizardError};

use crate::search_field::{FieldKey, FieldOptions, SearchField};

#[derive(Debug, Clone)]
pub struct CompositeFilterController {
    category: String,
    /// Sub-fields in declaration order
    fields: Vec<SearchField>,
    filter: CompositeFilter,
}

impl CompositeFilterController {
    pub fn new<I, S>(category: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldOptions)>,
        S: Into<String>,
    {
        let category = category.into();
        let fields: Vec<SearchField> = fields
            .into_iter()
            .map(|(name, options)| {
                SearchField::new(FieldKey::composite(category.clone(), name), options)
            })
            .collect();
        let filter = CompositeFilter::new(fields.iter().filter_map(|f| f.key().field.clone()));
        Self {
            category,
            fields,
            filter,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn filter(&self) -> &CompositeFilter {
        &self.filter
    }

    pub fn field(&self, name: &str) -> Option<&SearchField> {
        self.fields
            .iter()
            .find(|f| f.key().field.as_deref() == Some(name))
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut SearchField> {
        self.fields
            .iter_mut()
            .find(|f| f.key().field.as_deref() == Some(name))
    }

    pub fn fields(&self) -> impl Iterator<Item = &SearchField> {
        self.fields.iter()
    }

    /// Merge the resolution of `field` and return the complete filter.
    pub fn on_field_resolved(
        &mut self,
        field: &str,
        value: Option<FilterValue>,
    ) -> Result<CompositeFilter> {
        let next = self
            .filter
            .with_field(field, value)
            .ok_or_else(|| WizardError::unknown_field(&self.category, field))?;
        self.filter = next;
        Ok(self.filter.clone())
    }
}
