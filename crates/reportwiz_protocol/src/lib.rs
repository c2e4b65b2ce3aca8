//! Report wizard protocol: value types and external interfaces.
//!
//! Shared by the filter controllers, the session tape and the CLI. Nothing in
//! this crate performs I/O besides reading a wizard config file.

pub mod config;
pub mod defaults;
pub mod error;
pub mod hints;
pub mod report;
pub mod types;

pub use config::{CategoryConfig, CategoryKind, FieldConfig, WizardConfig};
pub use error::{ConfigError, HintFetchError, ReportBuildError, Result, WizardError};
pub use hints::{HintProvider, NoHints};
pub use report::{BuildReportRequest, BuildReportResponse, ReportBuilder, ReportTarget};
pub use types::{
    tag_color, CategoryValue, CompositeFilter, FieldState, FilterValue, HintCandidate,
    ReportConfiguration, SessionId, Tag, TagSet,
};
