//! Wizard session: the async loop that owns every controller of one wizard.
//!
//! Inputs arrive on a [`WizardHandle`]; observable changes leave as
//! [`WizardEvent`]s. Debounce timers and hint fetches run as spawned tasks
//! that report back on an internal channel, tagged with the field generation
//! they were started for. The controllers decide whether a late report still
//! counts.

use reportwiz_protocol::defaults::SESSION_CHANNEL_CAPACITY;
use reportwiz_protocol::{
    BuildReportRequest, BuildReportResponse, CategoryKind, CategoryValue, FieldState,
    FilterValue, HintCandidate, HintFetchError, HintProvider, ReportBuildError, ReportBuilder,
    ReportConfiguration, ReportTarget, Result, SessionId, TagSet, WizardConfig, WizardError,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::accumulator::{ConfigurationPhase, ReportConfigurationAccumulator};
use crate::composite::CompositeFilterController;
use crate::search_field::{
    FieldKey, FieldOptions, HintOutcome, HintRequest, SearchField, SelectOutcome, TypeEffect,
};
use crate::tags::TagFilterController;

/// Something the user did.
#[derive(Debug)]
pub enum WizardInput {
    Type {
        field: FieldKey,
        text: String,
    },
    /// Pick one of the hints shown for `field`
    Select {
        field: FieldKey,
        candidate: HintCandidate,
    },
    AddTag {
        category: String,
        candidate: HintCandidate,
    },
    RemoveTag {
        category: String,
        value: FilterValue,
    },
    /// Set or clear a choice category (dropdown without hints)
    SetChoice {
        category: String,
        value: Option<FilterValue>,
    },
    Unmount {
        field: FieldKey,
    },
    Submit,
    Inspect {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}

/// Something observable changed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WizardEvent {
    HintsUpdated {
        field: FieldKey,
        hints: Vec<HintCandidate>,
    },
    FilterChanged {
        category: String,
        value: Option<CategoryValue>,
    },
    ConfigurationRebuilt {
        configuration: ReportConfiguration,
        phase: ConfigurationPhase,
    },
    Submitted {
        configuration: ReportConfiguration,
        response: BuildReportResponse,
    },
    SubmitRejected {
        missing: Vec<String>,
    },
    SubmitFailed {
        message: String,
    },
    /// An input named an unknown field or an operation the category does not support
    InputRejected {
        message: String,
    },
}

/// Point-in-time view of a running session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub configuration: ReportConfiguration,
    pub phase: ConfigurationPhase,
    pub missing: Vec<String>,
    pub fields: BTreeMap<FieldKey, FieldState>,
    pub tags: BTreeMap<String, TagSet>,
}

enum Internal {
    DebounceElapsed {
        field: FieldKey,
        generation: u64,
    },
    HintsArrived {
        field: FieldKey,
        generation: u64,
        result: std::result::Result<Vec<HintCandidate>, HintFetchError>,
    },
    ReportBuilt {
        configuration: ReportConfiguration,
        result: std::result::Result<BuildReportResponse, ReportBuildError>,
    },
}

enum CategoryController {
    Composite(CompositeFilterController),
    Tags(TagFilterController),
    Search(SearchField),
    Choice,
}

pub struct WizardSession {
    session_id: SessionId,
    target: Option<ReportTarget>,
    controllers: HashMap<String, CategoryController>,
    accumulator: ReportConfigurationAccumulator,
    hints: Arc<dyn HintProvider>,
    builder: Arc<dyn ReportBuilder>,
    timers: HashMap<FieldKey, JoinHandle<()>>,
    internal_tx: mpsc::Sender<Internal>,
    internal_rx: mpsc::Receiver<Internal>,
    events: Option<mpsc::Sender<WizardEvent>>,
}

impl WizardSession {
    /// Build every controller declared by `config`.
    pub fn new(
        config: &WizardConfig,
        hints: Arc<dyn HintProvider>,
        builder: Arc<dyn ReportBuilder>,
    ) -> Result<Self> {
        config.validate()?;

        let mut controllers = HashMap::new();
        for category in &config.categories {
            let controller = match category.kind {
                CategoryKind::Composite => {
                    CategoryController::Composite(CompositeFilterController::new(
                        category.name.clone(),
                        category.fields.iter().map(|field| {
                            let options = FieldOptions::from_config(field, config.debounce_for(field));
                            (field.name.clone(), options)
                        }),
                    ))
                }
                CategoryKind::Tags => {
                    let field = category.as_field();
                    let options = FieldOptions::from_config(&field, config.debounce_for(&field));
                    CategoryController::Tags(TagFilterController::new(category.name.clone(), options))
                }
                CategoryKind::Search => {
                    let field = category.as_field();
                    let options = FieldOptions::from_config(&field, config.debounce_for(&field));
                    CategoryController::Search(SearchField::new(
                        FieldKey::category(category.name.clone()),
                        options,
                    ))
                }
                CategoryKind::Choice => CategoryController::Choice,
            };
            controllers.insert(category.name.clone(), controller);
        }

        let (internal_tx, internal_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        Ok(Self {
            session_id: SessionId::new(),
            target: config.report.clone(),
            controllers,
            accumulator: ReportConfigurationAccumulator::from_config(config)?,
            hints,
            builder,
            timers: HashMap::new(),
            internal_tx,
            internal_rx,
            events: None,
        })
    }

    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_target(mut self, target: ReportTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Register a callback for every rebuilt configuration.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&ReportConfiguration) + Send + Sync + 'static,
    {
        self.accumulator.subscribe(subscriber);
    }

    /// Spawn the session loop on the current tokio runtime.
    pub fn start(mut self) -> (WizardHandle, mpsc::Receiver<WizardEvent>) {
        let (input_tx, input_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        self.events = Some(event_tx);

        let handle = WizardHandle {
            session_id: self.session_id,
            tx: input_tx,
        };
        tokio::spawn(self.run(input_rx));
        (handle, event_rx)
    }

    /// Main event loop - consumes self
    async fn run(mut self, mut inputs: mpsc::Receiver<WizardInput>) {
        info!(session = %self.session_id, "wizard session started");

        loop {
            tokio::select! {
                biased;

                Some(internal) = self.internal_rx.recv() => {
                    self.handle_internal(internal);
                }

                input = inputs.recv() => match input {
                    Some(WizardInput::Shutdown) | None => break,
                    Some(input) => self.handle_input(input),
                },
            }
        }

        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        info!(session = %self.session_id, "wizard session stopped");
    }

    fn handle_input(&mut self, input: WizardInput) {
        let result = match input {
            WizardInput::Type { field, text } => self.on_type(&field, &text),
            WizardInput::Select { field, candidate } => self.on_select(&field, &candidate),
            WizardInput::AddTag { category, candidate } => {
                self.on_add_tag(&category, &candidate)
            }
            WizardInput::RemoveTag { category, value } => self.on_remove_tag(&category, &value),
            WizardInput::SetChoice { category, value } => self.on_set_choice(&category, value),
            WizardInput::Unmount { field } => self.on_unmount(&field),
            WizardInput::Submit => {
                self.on_submit();
                Ok(())
            }
            WizardInput::Inspect { reply } => {
                let _ = reply.send(self.snapshot());
                Ok(())
            }
            WizardInput::Shutdown => Ok(()),
        };

        if let Err(err) = result {
            debug!(session = %self.session_id, "rejected input: {}", err);
            self.emit(WizardEvent::InputRejected {
                message: err.to_string(),
            });
        }
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::DebounceElapsed { field, generation } => {
                let request = self
                    .search_field_mut(&field)
                    .ok()
                    .and_then(|search| search.on_debounce_elapsed(generation));
                if let Some(request) = request {
                    self.spawn_fetch(field, request);
                }
            }
            Internal::HintsArrived {
                field,
                generation,
                result,
            } => self.on_hints(field, generation, result),
            Internal::ReportBuilt {
                configuration,
                result,
            } => match result {
                Ok(response) => {
                    info!(
                        session = %self.session_id,
                        report_data_id = response.report_data_id,
                        "report configuration submitted"
                    );
                    self.emit(WizardEvent::Submitted {
                        configuration,
                        response,
                    });
                }
                Err(err) => {
                    let err = WizardError::from(err);
                    warn!(session = %self.session_id, "report build failed: {}", err);
                    self.emit(WizardEvent::SubmitFailed {
                        message: err.to_string(),
                    });
                }
            },
        }
    }

    // ------------------------------------------------------------------
    // Typing and hints
    // ------------------------------------------------------------------

    fn on_type(&mut self, field: &FieldKey, text: &str) -> Result<()> {
        match self.search_field_mut(field)?.on_type(text) {
            TypeEffect::ScheduleFetch { generation, delay } => {
                self.schedule_debounce(field.clone(), generation, delay);
                Ok(())
            }
            TypeEffect::Resolved(value) => {
                self.emit_hints(field);
                self.resolve(field, value)
            }
            TypeEffect::Ignored => Ok(()),
        }
    }

    fn schedule_debounce(&mut self, field: FieldKey, generation: u64, delay: Duration) {
        let tx = self.internal_tx.clone();
        let key = field.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx
                .send(Internal::DebounceElapsed {
                    field: key,
                    generation,
                })
                .await;
        });
        if let Some(previous) = self.timers.insert(field, timer) {
            previous.abort();
        }
    }

    fn spawn_fetch(&self, field: FieldKey, request: HintRequest) {
        debug!(field = %field, generation = request.generation, "fetching hints");
        let hints = Arc::clone(&self.hints);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = hints.fetch_hints(&request.category, &request.query).await;
            let _ = tx
                .send(Internal::HintsArrived {
                    field,
                    generation: request.generation,
                    result,
                })
                .await;
        });
    }

    fn on_hints(
        &mut self,
        field: FieldKey,
        generation: u64,
        result: std::result::Result<Vec<HintCandidate>, HintFetchError>,
    ) {
        let outcome = match self.controllers.get_mut(&field.category) {
            Some(CategoryController::Tags(tags)) => tags.apply_hints(generation, result),
            Some(CategoryController::Search(search)) => search.on_hints(generation, result),
            Some(CategoryController::Composite(composite)) => {
                match field.field.as_deref().and_then(|name| composite.field_mut(name)) {
                    Some(search) => search.on_hints(generation, result),
                    None => return,
                }
            }
            Some(CategoryController::Choice) | None => return,
        };

        match outcome {
            HintOutcome::Applied => self.emit_hints(&field),
            HintOutcome::Failed(err) => {
                warn!(field = %field, "hint provider failed: {}", err);
                self.emit_hints(&field);
            }
            HintOutcome::Stale => {}
            HintOutcome::Disregarded => {
                debug!(field = %field, generation, "field unmounted, hints disregarded");
            }
        }
    }

    fn emit_hints(&self, field: &FieldKey) {
        let hints = self
            .field_state(field)
            .map(|state| state.hints.clone())
            .unwrap_or_default();
        self.emit(WizardEvent::HintsUpdated {
            field: field.clone(),
            hints,
        });
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    fn on_select(&mut self, field: &FieldKey, candidate: &HintCandidate) -> Result<()> {
        if let (Some(CategoryController::Tags(tags)), None) =
            (self.controllers.get_mut(&field.category), field.field.as_deref())
        {
            let changed = tags.select(candidate);
            self.emit_hints(field);
            if let Some(tags) = changed {
                self.publish(&field.category, tag_value(tags))?;
            }
            return Ok(());
        }

        match self.search_field_mut(field)?.on_select(candidate) {
            SelectOutcome::Resolved(value) => {
                self.emit_hints(field);
                self.resolve(field, Some(value))
            }
            SelectOutcome::Unchanged => {
                self.emit_hints(field);
                Ok(())
            }
            SelectOutcome::Rejected | SelectOutcome::Disregarded => Ok(()),
        }
    }

    /// Route a search field's new selection to its category.
    fn resolve(&mut self, field: &FieldKey, value: Option<FilterValue>) -> Result<()> {
        let category_value = match (self.controllers.get_mut(&field.category), field.field.as_deref()) {
            (Some(CategoryController::Composite(composite)), Some(name)) => {
                let filter = composite.on_field_resolved(name, value)?;
                // Set as soon as any sub-field resolves
                (!filter.is_unset()).then_some(CategoryValue::Composite(filter))
            }
            (Some(CategoryController::Search(_)), None) => value.map(CategoryValue::Scalar),
            (Some(_), _) => {
                return Err(WizardError::UnsupportedOperation {
                    category: field.category.clone(),
                    operation: "search selections",
                })
            }
            (None, _) => return Err(WizardError::unknown_category(&field.category)),
        };
        self.publish(&field.category, category_value)
    }

    // ------------------------------------------------------------------
    // Tags and choices
    // ------------------------------------------------------------------

    fn on_add_tag(&mut self, category: &str, candidate: &HintCandidate) -> Result<()> {
        let controller = self.tags_mut(category, "tags")?;
        let shown = controller.input().state().hints.len();
        if let Some(tags) = controller.add_tag(candidate) {
            // The new tag may have been on offer in the input
            let input = controller.input();
            if input.state().hints.len() != shown {
                let key = input.key().clone();
                self.emit_hints(&key);
            }
            self.publish(category, tag_value(tags))?;
        }
        Ok(())
    }

    fn on_remove_tag(&mut self, category: &str, value: &FilterValue) -> Result<()> {
        if let Some(tags) = self.tags_mut(category, "tags")?.remove_tag(value) {
            self.publish(category, tag_value(tags))?;
        }
        Ok(())
    }

    fn on_set_choice(&mut self, category: &str, value: Option<FilterValue>) -> Result<()> {
        match self.controllers.get(category) {
            Some(CategoryController::Choice) => {}
            Some(_) => {
                return Err(WizardError::UnsupportedOperation {
                    category: category.to_string(),
                    operation: "choices",
                })
            }
            None => return Err(WizardError::unknown_category(category)),
        }
        self.publish(category, value.map(CategoryValue::Scalar))
    }

    fn on_unmount(&mut self, field: &FieldKey) -> Result<()> {
        self.search_field_mut(field)?.unmount();
        if let Some(timer) = self.timers.remove(field) {
            timer.abort();
        }
        debug!(field = %field, "field unmounted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    fn publish(&mut self, category: &str, value: Option<CategoryValue>) -> Result<()> {
        let configuration = self.accumulator.update_category(category, value.clone())?;
        let phase = self.accumulator.phase();
        debug!(session = %self.session_id, category, %phase, "configuration rebuilt");

        self.emit(WizardEvent::FilterChanged {
            category: category.to_string(),
            value,
        });
        self.emit(WizardEvent::ConfigurationRebuilt {
            configuration,
            phase,
        });
        Ok(())
    }

    fn on_submit(&mut self) {
        let configuration = match self.accumulator.submit() {
            Ok(configuration) => configuration,
            Err(WizardError::SubmissionPrecondition { missing }) => {
                info!(session = %self.session_id, ?missing, "submit rejected");
                self.emit(WizardEvent::SubmitRejected { missing });
                return;
            }
            Err(err) => {
                self.emit(WizardEvent::SubmitFailed {
                    message: err.to_string(),
                });
                return;
            }
        };

        let Some(target) = &self.target else {
            warn!(session = %self.session_id, "submit without a report target");
            self.emit(WizardEvent::SubmitFailed {
                message: "No report target configured".to_string(),
            });
            return;
        };

        let request = BuildReportRequest::new(self.session_id, target, configuration.clone());
        info!(
            session = %self.session_id,
            category = %request.category,
            data_set = %request.data_set,
            filters = configuration.set_count(),
            "submitting report configuration"
        );

        let builder = Arc::clone(&self.builder);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = builder.build_report_configuration(request).await;
            let _ = tx
                .send(Internal::ReportBuilt {
                    configuration,
                    result,
                })
                .await;
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        let mut fields = BTreeMap::new();
        let mut tags = BTreeMap::new();
        for (name, controller) in &self.controllers {
            match controller {
                CategoryController::Composite(composite) => {
                    for search in composite.fields() {
                        fields.insert(search.key().clone(), search.state().clone());
                    }
                }
                CategoryController::Tags(controller) => {
                    let input = controller.input();
                    fields.insert(input.key().clone(), input.state().clone());
                    tags.insert(name.clone(), controller.tags().clone());
                }
                CategoryController::Search(search) => {
                    fields.insert(search.key().clone(), search.state().clone());
                }
                CategoryController::Choice => {}
            }
        }

        SessionSnapshot {
            session_id: self.session_id,
            configuration: self.accumulator.build_configuration(),
            phase: self.accumulator.phase(),
            missing: self.accumulator.missing_required(),
            fields,
            tags,
        }
    }

    // ------------------------------------------------------------------
    // Lookup helpers
    // ------------------------------------------------------------------

    fn search_field_mut(&mut self, key: &FieldKey) -> Result<&mut SearchField> {
        let controller = self
            .controllers
            .get_mut(&key.category)
            .ok_or_else(|| WizardError::unknown_category(&key.category))?;
        match (controller, key.field.as_deref()) {
            (CategoryController::Composite(composite), Some(name)) => composite
                .field_mut(name)
                .ok_or_else(|| WizardError::unknown_field(&key.category, name)),
            (CategoryController::Tags(tags), None) => Ok(tags.input_mut()),
            (CategoryController::Search(search), None) => Ok(search),
            (_, Some(name)) => Err(WizardError::unknown_field(&key.category, name)),
            (_, None) => Err(WizardError::UnsupportedOperation {
                category: key.category.clone(),
                operation: "typed text",
            }),
        }
    }

    fn field_state(&self, key: &FieldKey) -> Option<&FieldState> {
        match (self.controllers.get(&key.category)?, key.field.as_deref()) {
            (CategoryController::Composite(composite), Some(name)) => {
                composite.field(name).map(SearchField::state)
            }
            (CategoryController::Tags(tags), None) => Some(tags.input().state()),
            (CategoryController::Search(search), None) => Some(search.state()),
            _ => None,
        }
    }

    fn tags_mut(
        &mut self,
        category: &str,
        operation: &'static str,
    ) -> Result<&mut TagFilterController> {
        match self.controllers.get_mut(category) {
            Some(CategoryController::Tags(tags)) => Ok(tags),
            Some(_) => Err(WizardError::UnsupportedOperation {
                category: category.to_string(),
                operation,
            }),
            None => Err(WizardError::unknown_category(category)),
        }
    }

    /// Queue `event` without waiting. A full or closed channel drops it, so an
    /// undrained receiver never stalls the session.
    fn emit(&self, event: WizardEvent) {
        let Some(events) = &self.events else { return };
        match events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(session = %self.session_id, ?event, "event channel full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(session = %self.session_id, "event receiver dropped");
            }
        }
    }
}

/// An empty tag set leaves the category absent.
fn tag_value(tags: TagSet) -> Option<CategoryValue> {
    (!tags.is_empty()).then_some(CategoryValue::Tags(tags))
}

/// Sending side of a running [`WizardSession`].
#[derive(Debug, Clone)]
pub struct WizardHandle {
    session_id: SessionId,
    tx: mpsc::Sender<WizardInput>,
}

impl WizardHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub async fn send(&self, input: WizardInput) -> Result<()> {
        self.tx
            .send(input)
            .await
            .map_err(|_| WizardError::SessionClosed)
    }

    pub async fn type_text(&self, field: impl Into<FieldKey>, text: impl Into<String>) -> Result<()> {
        self.send(WizardInput::Type {
            field: field.into(),
            text: text.into(),
        })
        .await
    }

    pub async fn select(&self, field: impl Into<FieldKey>, candidate: HintCandidate) -> Result<()> {
        self.send(WizardInput::Select {
            field: field.into(),
            candidate,
        })
        .await
    }

    pub async fn add_tag(&self, category: impl Into<String>, candidate: HintCandidate) -> Result<()> {
        self.send(WizardInput::AddTag {
            category: category.into(),
            candidate,
        })
        .await
    }

    pub async fn remove_tag(
        &self,
        category: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Result<()> {
        self.send(WizardInput::RemoveTag {
            category: category.into(),
            value: value.into(),
        })
        .await
    }

    pub async fn set_choice(
        &self,
        category: impl Into<String>,
        value: Option<FilterValue>,
    ) -> Result<()> {
        self.send(WizardInput::SetChoice {
            category: category.into(),
            value,
        })
        .await
    }

    pub async fn unmount(&self, field: impl Into<FieldKey>) -> Result<()> {
        self.send(WizardInput::Unmount {
            field: field.into(),
        })
        .await
    }

    pub async fn submit(&self) -> Result<()> {
        self.send(WizardInput::Submit).await
    }

    /// Snapshot of every field, tag set and the accumulated configuration.
    pub async fn inspect(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(WizardInput::Inspect { reply }).await?;
        rx.await.map_err(|_| WizardError::SessionClosed)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(WizardInput::Shutdown).await
    }
}
