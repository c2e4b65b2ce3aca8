//! Report wizard filter core.
//!
//! Controllers for the filter inputs of a report wizard and the accumulator
//! that merges their values into one submittable configuration:
//!
//! - [`search_field`]: debounced free-text input with hint lookup
//! - [`composite`]: several search fields resolving one category together
//! - [`tags`]: multi-valued tag selection
//! - [`accumulator`]: latest value of every category, submission gate
//! - [`session`]: async loop wiring all of the above to a hint provider
//!   and a report builder

pub mod accumulator;
pub mod catalog;
pub mod composite;
pub mod search_field;
pub mod session;
pub mod tags;

pub use accumulator::{ConfigurationPhase, ReportConfigurationAccumulator, Subscriber};
pub use catalog::CatalogHintProvider;
pub use composite::CompositeFilterController;
pub use search_field::{
    FieldKey, FieldOptions, HintOutcome, HintRequest, SearchField, SelectOutcome, TypeEffect,
};
pub use session::{SessionSnapshot, WizardEvent, WizardHandle, WizardInput, WizardSession};
pub use tags::{TagFilterController, TagHints};
