//! Test hint providers.

use async_trait::async_trait;
use reportwiz_protocol::{HintCandidate, HintFetchError, HintProvider};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::{oneshot, Notify};
use tracing::debug;

type HintResult = Result<Vec<HintCandidate>, HintFetchError>;

/// One recorded `fetch_hints` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintCall {
    pub category: String,
    pub query: String,
}

impl HintCall {
    pub fn new(category: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            query: query.into(),
        }
    }
}

/// Delegates to `inner` and records each call in order.
pub struct CountingHintProvider<P> {
    inner: P,
    calls: Mutex<Vec<HintCall>>,
}

impl<P: HintProvider> CountingHintProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<HintCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl<P: HintProvider> HintProvider for CountingHintProvider<P> {
    async fn fetch_hints(&self, category: &str, query: &str) -> HintResult {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(HintCall::new(category, query));
        self.inner.fetch_hints(category, query).await
    }
}

/// Parks every fetch until [`GatedHintProvider::release`] is called for its query.
#[derive(Default)]
pub struct GatedHintProvider {
    pending: Mutex<HashMap<String, oneshot::Sender<HintResult>>>,
    arrived: Notify,
}

impl GatedHintProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a fetch for `query` is parked.
    pub async fn wait_for_request(&self, query: &str) {
        loop {
            let arrived = self.arrived.notified();
            if self.is_pending(query) {
                return;
            }
            arrived.await;
        }
    }

    pub fn is_pending(&self, query: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(query)
    }

    /// Complete the parked fetch for `query`. Returns false if none is parked.
    pub fn release(&self, query: &str, result: HintResult) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(query);
        match sender {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl HintProvider for GatedHintProvider {
    async fn fetch_hints(&self, category: &str, query: &str) -> HintResult {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(query.to_string(), tx);
        debug!(category, query, "fetch parked");
        self.arrived.notify_waiters();

        rx.await.unwrap_or(Err(HintFetchError::Unavailable))
    }
}

/// Every fetch fails with [`HintFetchError::Provider`].
#[derive(Debug, Clone)]
pub struct FailingHintProvider {
    message: String,
}

impl FailingHintProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl HintProvider for FailingHintProvider {
    async fn fetch_hints(&self, _category: &str, _query: &str) -> HintResult {
        Err(HintFetchError::Provider(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportwiz_protocol::NoHints;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_counting_records_calls_in_order() {
        let provider = CountingHintProvider::new(NoHints);
        provider.fetch_hints("city", "n").await.unwrap();
        provider.fetch_hints("city", "ne").await.unwrap();

        assert_eq!(
            provider.calls(),
            vec![HintCall::new("city", "n"), HintCall::new("city", "ne")]
        );
    }

    #[tokio::test]
    async fn test_gated_releases_out_of_order() {
        let provider = Arc::new(GatedHintProvider::new());

        let first = tokio::spawn({
            let provider = Arc::clone(&provider);
            async move { provider.fetch_hints("city", "a").await }
        });
        let second = tokio::spawn({
            let provider = Arc::clone(&provider);
            async move { provider.fetch_hints("city", "ab").await }
        });
        provider.wait_for_request("a").await;
        provider.wait_for_request("ab").await;

        assert!(provider.release("ab", Ok(vec![HintCandidate::new("AB", "ab")])));
        assert_eq!(second.await.unwrap().unwrap().len(), 1);

        assert!(provider.release("a", Ok(Vec::new())));
        assert!(first.await.unwrap().unwrap().is_empty());
        assert!(!provider.release("a", Ok(Vec::new())));
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let err = FailingHintProvider::new("down")
            .fetch_hints("tag", "x")
            .await
            .unwrap_err();
        assert_eq!(err, HintFetchError::Provider("down".to_string()));
    }
}
