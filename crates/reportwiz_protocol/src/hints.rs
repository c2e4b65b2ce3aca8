//! Hint provider contract consumed by search and tag fields.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::HintFetchError;
use crate::types::HintCandidate;

/// Backend source of autocomplete suggestions.
///
/// Implementations must accept any category string; `city`, `state` and
/// `tag` are common, dropdown filters add their own.
#[async_trait]
pub trait HintProvider: Send + Sync {
    async fn fetch_hints(
        &self,
        category: &str,
        query: &str,
    ) -> Result<Vec<HintCandidate>, HintFetchError>;
}

#[async_trait]
impl<T: HintProvider + ?Sized> HintProvider for Arc<T> {
    async fn fetch_hints(
        &self,
        category: &str,
        query: &str,
    ) -> Result<Vec<HintCandidate>, HintFetchError> {
        (**self).fetch_hints(category, query).await
    }
}

/// Provider that never suggests anything. Used for categories without a backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHints;

#[async_trait]
impl HintProvider for NoHints {
    async fn fetch_hints(
        &self,
        _category: &str,
        _query: &str,
    ) -> Result<Vec<HintCandidate>, HintFetchError> {
        Ok(Vec::new())
    }
}
