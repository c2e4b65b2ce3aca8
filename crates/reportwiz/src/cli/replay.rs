//! `reportwiz replay`
//!
//! Runs a wizard session against a static hint catalog and a dry-run report
//! builder, driven by a JSON script of user steps. Typing steps go through
//! the real debounce window, so a script must `wait` long enough for hints
//! to arrive before selecting one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reportwiz_filters::{
    CatalogHintProvider, ConfigurationPhase, FieldKey, SessionSnapshot, WizardEvent,
    WizardHandle, WizardSession,
};
use reportwiz_protocol::{
    BuildReportRequest, BuildReportResponse, FilterValue, HintCandidate, ReportBuildError,
    ReportBuilder, ReportConfiguration, SessionId, WizardConfig,
};
use reportwiz_tape::{EventName, RedactionMode, TapeWriter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::error::HelpfulError;
use super::output::{color_for_phase, format_category_value, print_table_colored};
use super::validate::load_config;

/// How long to wait for the report builder after a submit step
const SUBMIT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub struct ReplayArgs {
    pub config: PathBuf,
    pub catalog: PathBuf,
    pub script: PathBuf,
    pub limit: usize,
    /// `Some(None)` records to the default tapes directory
    pub tape: Option<Option<PathBuf>>,
    pub plaintext: bool,
    pub json: bool,
}

/// A replay script.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Type {
        field: String,
        text: String,
    },
    Wait {
        ms: u64,
    },
    /// Select the shown hint with this value
    Select {
        field: String,
        value: String,
    },
    AddTag {
        category: String,
        value: String,
        #[serde(default)]
        display: Option<String>,
    },
    RemoveTag {
        category: String,
        value: String,
    },
    SetChoice {
        category: String,
        #[serde(default)]
        value: Option<String>,
    },
    Unmount {
        field: String,
    },
    Submit,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Type { .. } => "Type",
            Step::Wait { .. } => "Wait",
            Step::Select { .. } => "Select",
            Step::AddTag { .. } => "AddTag",
            Step::RemoveTag { .. } => "RemoveTag",
            Step::SetChoice { .. } => "SetChoice",
            Step::Unmount { .. } => "Unmount",
            Step::Submit => "Submit",
        }
    }
}

/// Outcome of a submit step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Submitted { response: BuildReportResponse },
    Rejected { missing: Vec<String> },
    Failed { message: String },
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    session_id: SessionId,
    phase: ConfigurationPhase,
    missing: Vec<String>,
    filters: serde_json::Value,
    #[serde(skip)]
    configuration: ReportConfiguration,
    submissions: Vec<SubmitOutcome>,
    events: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    tape: Option<PathBuf>,
}

/// Report builder that accepts every request without contacting a backend.
#[derive(Debug, Default)]
pub struct DryRunReportBuilder {
    next_id: AtomicI64,
}

#[async_trait]
impl ReportBuilder for DryRunReportBuilder {
    async fn build_report_configuration(
        &self,
        request: BuildReportRequest,
    ) -> Result<BuildReportResponse, ReportBuildError> {
        let report_data_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            report_data_id,
            category = %request.category,
            filters = request.filters.set_count(),
            "dry run: report configuration accepted"
        );
        Ok(BuildReportResponse {
            report_data_id,
            reporting_type: request.intention,
            report_type: request.category,
            data_type: request.data_set,
        })
    }
}

pub fn run(args: ReplayArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let catalog = load_catalog(&args.catalog)?.with_limit(args.limit);
    let script = load_script(&args.script)?;

    let session_id = SessionId::new();
    let tape_path = match args.tape {
        Some(Some(path)) => Some(path),
        Some(None) => Some(default_tape_path(&session_id)?),
        None => None,
    };
    let tape = match &tape_path {
        Some(path) => {
            let redaction = if args.plaintext {
                RedactionMode::Plaintext
            } else {
                RedactionMode::Hash
            };
            let writer = TapeWriter::new(path)
                .with_context(|| format!("Failed to create tape file: {}", path.display()))?
                .with_redaction(redaction);
            Some(Arc::new(writer))
        }
        None => None,
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let mut report =
        runtime.block_on(replay(&config, catalog, &script, session_id, tape.clone()))?;
    report.tape = tape_path;

    if let Some(tape) = &tape {
        if let Err(err) = tape.finish() {
            warn!("Failed to finish tape: {}", err);
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&config, &report);
    }
    Ok(())
}

fn default_tape_path(session_id: &SessionId) -> Result<PathBuf> {
    let dir = reportwiz_logging::tapes_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create tapes directory: {}", dir.display()))?;
    Ok(dir.join(format!("{}.tape", session_id)))
}

pub fn load_catalog(path: &Path) -> Result<CatalogHintProvider> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    let categories: HashMap<String, Vec<HintCandidate>> = serde_json::from_str(&content)
        .map_err(|err| HelpfulError::json_parse_error(path, "catalog", &err.to_string()))?;
    Ok(CatalogHintProvider::from_map(categories))
}

pub fn load_script(path: &Path) -> Result<Script> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|err| HelpfulError::json_parse_error(path, "script", &err.to_string()).into())
}

async fn replay(
    config: &WizardConfig,
    catalog: CatalogHintProvider,
    script: &Script,
    session_id: SessionId,
    tape: Option<Arc<TapeWriter>>,
) -> Result<ReplayReport> {
    let session = WizardSession::new(
        config,
        Arc::new(catalog),
        Arc::new(DryRunReportBuilder::default()),
    )?
    .with_session_id(session_id);
    let (handle, events) = session.start();
    info!(session = %session_id, steps = script.steps.len(), "replaying script");

    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let collector = tokio::spawn(collect_events(events, session_id, tape.clone(), outcome_tx));

    let mut submissions = Vec::new();
    for step in &script.steps {
        record_step(tape.as_deref(), &session_id, step);
        run_step(&handle, step, tape.as_deref()).await?;

        if matches!(step, Step::Submit) {
            let outcome = tokio::time::timeout(
                Duration::from_secs(SUBMIT_TIMEOUT_SECS),
                outcome_rx.recv(),
            )
            .await
            .context("Timed out waiting for the report builder")?
            .context("Wizard session closed during submit")?;
            submissions.push(outcome);
        }
    }

    let snapshot: SessionSnapshot = handle.inspect().await?;
    handle.shutdown().await?;
    drop(handle);
    let events = collector.await.context("Event collector panicked")?;

    Ok(ReplayReport {
        session_id,
        phase: snapshot.phase,
        missing: snapshot.missing,
        filters: snapshot.configuration.to_filters_json(),
        configuration: snapshot.configuration,
        submissions,
        events,
        tape: None,
    })
}

async fn run_step(handle: &WizardHandle, step: &Step, tape: Option<&TapeWriter>) -> Result<()> {
    match step {
        Step::Type { field, text } => handle.type_text(FieldKey::parse(field), text.clone()).await?,
        Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        Step::Select { field, value } => {
            let key = FieldKey::parse(field);
            let snapshot = handle.inspect().await?;
            let shown = snapshot
                .fields
                .get(&key)
                .and_then(|state| state.hints.iter().find(|hint| hint.value.as_str() == value))
                .cloned();
            match shown {
                Some(candidate) => {
                    if let Some(tape) = tape {
                        if let Err(err) =
                            tape.record_selection(&handle.session_id(), field, &candidate)
                        {
                            warn!("Failed to record tape event: {}", err);
                        }
                    }
                    handle.select(key, candidate).await?
                }
                None => warn!(field = %key, value, "value is not among the shown hints; step skipped"),
            }
        }
        Step::AddTag {
            category,
            value,
            display,
        } => {
            let display = display.clone().unwrap_or_else(|| value.clone());
            handle
                .add_tag(category.clone(), HintCandidate::new(value.as_str(), display))
                .await?
        }
        Step::RemoveTag { category, value } => {
            handle.remove_tag(category.clone(), value.as_str()).await?
        }
        Step::SetChoice { category, value } => {
            handle
                .set_choice(category.clone(), value.as_deref().map(FilterValue::from))
                .await?
        }
        Step::Unmount { field } => handle.unmount(FieldKey::parse(field)).await?,
        Step::Submit => handle.submit().await?,
    }
    Ok(())
}

/// Drain session events into the tape until the session stops. Returns the event count.
async fn collect_events(
    mut events: mpsc::Receiver<WizardEvent>,
    session_id: SessionId,
    tape: Option<Arc<TapeWriter>>,
    outcomes: mpsc::UnboundedSender<SubmitOutcome>,
) -> usize {
    let mut count = 0;
    while let Some(event) = events.recv().await {
        count += 1;
        if let Some(tape) = &tape {
            record_event(tape, &session_id, &event);
        }

        let outcome = match event {
            WizardEvent::Submitted { response, .. } => Some(SubmitOutcome::Submitted { response }),
            WizardEvent::SubmitRejected { missing } => Some(SubmitOutcome::Rejected { missing }),
            WizardEvent::SubmitFailed { message } => Some(SubmitOutcome::Failed { message }),
            WizardEvent::InputRejected { message } => {
                warn!("input rejected: {}", message);
                None
            }
            _ => None,
        };
        if let Some(outcome) = outcome {
            let _ = outcomes.send(outcome);
        }
    }
    count
}

fn record_step(tape: Option<&TapeWriter>, session_id: &SessionId, step: &Step) {
    let Some(tape) = tape else { return };
    let result = match step {
        Step::Type { field, text } => tape.record_typed(session_id, field, text),
        Step::Wait { .. } => return,
        Step::AddTag { category, value, .. } | Step::RemoveTag { category, value } => tape.emit(
            EventName::UserInput(step.name().to_string()),
            Some(session_id),
            serde_json::json!({ "category": category, "value": value }),
        ),
        Step::SetChoice { category, value } => tape.emit(
            EventName::UserInput(step.name().to_string()),
            Some(session_id),
            serde_json::json!({ "category": category, "value": value }),
        ),
        // Recorded once the shown candidate is known
        Step::Select { .. } => return,
        Step::Unmount { field } => tape.emit(
            EventName::UserInput(step.name().to_string()),
            Some(session_id),
            serde_json::json!({ "field": field }),
        ),
        Step::Submit => tape.emit(
            EventName::UserInput(step.name().to_string()),
            Some(session_id),
            serde_json::json!({}),
        ),
    };
    if let Err(err) = result {
        warn!("Failed to record tape event: {}", err);
    }
}

fn record_event(tape: &TapeWriter, session_id: &SessionId, event: &WizardEvent) {
    let result = match event {
        WizardEvent::HintsUpdated { field, hints } => {
            tape.record_hints(session_id, &field.to_string(), hints)
        }
        WizardEvent::ConfigurationRebuilt {
            configuration,
            phase,
        } => tape.record_configuration(session_id, configuration, phase.as_str()),
        WizardEvent::FilterChanged { category, value } => tape.emit(
            EventName::SessionEvent("FilterChanged".to_string()),
            Some(session_id),
            serde_json::json!({ "category": category, "value": value }),
        ),
        WizardEvent::Submitted { response, .. } => tape.emit(
            EventName::SessionEvent("Submitted".to_string()),
            Some(session_id),
            serde_json::json!({ "response": response }),
        ),
        WizardEvent::SubmitRejected { missing } => tape.emit(
            EventName::ErrorEvent("SubmitRejected".to_string()),
            Some(session_id),
            serde_json::json!({ "missing": missing }),
        ),
        WizardEvent::SubmitFailed { message } => tape.emit(
            EventName::ErrorEvent("SubmitFailed".to_string()),
            Some(session_id),
            serde_json::json!({ "error": message }),
        ),
        WizardEvent::InputRejected { message } => tape.emit(
            EventName::ErrorEvent("InputRejected".to_string()),
            Some(session_id),
            serde_json::json!({ "error": message }),
        ),
    };
    if let Err(err) = result {
        warn!("Failed to record tape event: {}", err);
    }
}

fn print_report(config: &WizardConfig, report: &ReplayReport) {
    let rows = config
        .categories
        .iter()
        .map(|category| {
            let value = report.configuration.get(&category.name);
            let required = config.is_required(&category.name);
            let missing = report.missing.contains(&category.name);
            let color = if missing {
                Some(comfy_table::Color::Red)
            } else if value.is_some() {
                Some(comfy_table::Color::Green)
            } else {
                None
            };
            vec![
                (category.name.clone(), None),
                (category.kind.as_str().to_string(), None),
                (if required { "yes" } else { "no" }.to_string(), None),
                (format_category_value(value), color),
            ]
        })
        .collect();
    print_table_colored(&["Category", "Kind", "Required", "Value"], rows);

    print_table_colored(
        &["Session", "Phase", "Events"],
        vec![vec![
            (report.session_id.to_string(), None),
            (report.phase.to_string(), Some(color_for_phase(report.phase))),
            (report.events.to_string(), None),
        ]],
    );

    if let Some(tape) = &report.tape {
        println!("Tape: {}", tape.display());
    }
    for submission in &report.submissions {
        match submission {
            SubmitOutcome::Submitted { response } => println!(
                "Submitted: report_data_id={} ({} / {})",
                response.report_data_id, response.report_type, response.data_type
            ),
            SubmitOutcome::Rejected { missing } => {
                println!("Submit rejected; missing: {}", missing.join(", "))
            }
            SubmitOutcome::Failed { message } => println!("Submit failed: {}", message),
        }
    }
}
