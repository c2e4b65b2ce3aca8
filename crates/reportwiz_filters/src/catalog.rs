//! Static hint catalog.
//!
//! In-memory [`HintProvider`] over a fixed list of candidates per category.
//! Used by `reportwiz replay` and by tests that need deterministic hints.

use async_trait::async_trait;
use reportwiz_protocol::defaults::DEFAULT_HINT_LIMIT;
use reportwiz_protocol::{HintCandidate, HintFetchError, HintProvider};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct CatalogHintProvider {
    categories: HashMap<String, Vec<HintCandidate>>,
    limit: usize,
}

impl Default for CatalogHintProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogHintProvider {
    pub fn new() -> Self {
        Self {
            categories: HashMap::new(),
            limit: DEFAULT_HINT_LIMIT,
        }
    }

    pub fn from_map(categories: HashMap<String, Vec<HintCandidate>>) -> Self {
        Self {
            categories,
            limit: DEFAULT_HINT_LIMIT,
        }
    }

    /// Append candidates to `category`, keeping catalog order.
    pub fn with_hints<I>(mut self, category: impl Into<String>, hints: I) -> Self
    where
        I: IntoIterator<Item = HintCandidate>,
    {
        self.categories
            .entry(category.into())
            .or_default()
            .extend(hints);
        self
    }

    /// Maximum number of candidates returned per fetch.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn len(&self, category: &str) -> usize {
        self.categories.get(category).map_or(0, Vec::len)
    }

    /// Candidates of `category` whose value or display contains `query`, ignoring case.
    pub fn lookup(&self, category: &str, query: &str) -> Option<Vec<HintCandidate>> {
        let entries = self.categories.get(category)?;
        let needle = query.to_lowercase();
        Some(
            entries
                .iter()
                .filter(|hint| {
                    needle.is_empty()
                        || hint.value.as_str().to_lowercase().contains(&needle)
                        || hint.display.to_lowercase().contains(&needle)
                })
                .take(self.limit)
                .cloned()
                .collect(),
        )
    }
}

#[async_trait]
impl HintProvider for CatalogHintProvider {
    async fn fetch_hints(
        &self,
        category: &str,
        query: &str,
    ) -> Result<Vec<HintCandidate>, HintFetchError> {
        self.lookup(category, query)
            .ok_or_else(|| HintFetchError::UnknownCategory(category.to_string()))
    }
}
