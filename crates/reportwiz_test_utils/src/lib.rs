//! Reportwiz Test Utilities
//!
//! Hint providers and report builders whose behavior a test controls:
//!
//! - [`CountingHintProvider`]: wraps another provider and records every fetch
//! - [`GatedHintProvider`]: holds each fetch until the test releases it, so
//!   tests can complete fetches out of order
//! - [`FailingHintProvider`]: every fetch fails
//! - [`RecordingReportBuilder`]: records build requests, answers with a
//!   canned response or error
//!
//! # Usage
//!
//! ```rust,ignore
//! let provider = Arc::new(GatedHintProvider::new());
//! // ... type "a", then "ab" after the debounce window
//! provider.wait_for_request("ab").await;
//! provider.release("ab", Ok(vec![]));
//! ```

pub mod builders;
pub mod providers;

pub use builders::RecordingReportBuilder;
pub use providers::{CountingHintProvider, FailingHintProvider, GatedHintProvider, HintCall};
