//! Wizard Session Tests
//!
//! Drive a running session through its handle with tokio's clock paused, so
//! debounce windows elapse only when every task is idle.

use reportwiz_filters::{
    CatalogHintProvider, ConfigurationPhase, FieldKey, WizardEvent, WizardHandle, WizardSession,
};
use reportwiz_protocol::{
    BuildReportResponse, CategoryValue, FilterValue, HintCandidate, HintProvider,
    ReportBuildError, ReportConfiguration, ReportTarget, WizardConfig, WizardError,
};
use reportwiz_test_utils::{
    CountingHintProvider, FailingHintProvider, GatedHintProvider, HintCall,
    RecordingReportBuilder,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::time::timeout;

const CONFIG: &str = r#"
required = ["city", "state"]

[report]
category = "contacts"
data_set = "records"

[[categories]]
name = "city"
kind = "search"
select_on_empty = true

[[categories]]
name = "state"
kind = "search"

[[categories]]
name = "location"
kind = "composite"
fields = [
  { name = "city" },
  { name = "state" },
]

[[categories]]
name = "tags"
kind = "tags"
"#;

fn catalog() -> CatalogHintProvider {
    CatalogHintProvider::new()
        .with_hints(
            "city",
            [
                HintCandidate::new("NYC", "New York City"),
                HintCandidate::new("NWK", "Newark"),
                HintCandidate::new("BUF", "Buffalo"),
            ],
        )
        .with_hints(
            "state",
            [
                HintCandidate::new("NY", "New York"),
                HintCandidate::new("NJ", "New Jersey"),
            ],
        )
        .with_hints(
            "tag",
            [
                HintCandidate::new("veterans", "Veterans"),
                HintCandidate::new("vets", "Vets"),
                HintCandidate::new("volunteers", "Volunteers"),
            ],
        )
}

fn start(
    hints: Arc<dyn HintProvider>,
    builder: Arc<RecordingReportBuilder>,
) -> (WizardHandle, Receiver<WizardEvent>) {
    let config = WizardConfig::from_toml_str(CONFIG).unwrap();
    WizardSession::new(&config, hints, builder).unwrap().start()
}

async fn next_event(events: &mut Receiver<WizardEvent>) -> WizardEvent {
    timeout(Duration::from_secs(30), events.recv())
        .await
        .expect("timed out waiting for a wizard event")
        .expect("session closed")
}

async fn next_hints(events: &mut Receiver<WizardEvent>, field: &FieldKey) -> Vec<HintCandidate> {
    loop {
        if let WizardEvent::HintsUpdated { field: key, hints } = next_event(events).await {
            if &key == field {
                return hints;
            }
        }
    }
}

async fn next_rebuild(
    events: &mut Receiver<WizardEvent>,
) -> (ReportConfiguration, ConfigurationPhase) {
    loop {
        if let WizardEvent::ConfigurationRebuilt {
            configuration,
            phase,
        } = next_event(events).await
        {
            return (configuration, phase);
        }
    }
}

/// Type `text`, wait for its hints and select `value` among them.
async fn pick(
    handle: &WizardHandle,
    events: &mut Receiver<WizardEvent>,
    field: &FieldKey,
    text: &str,
    value: &str,
) -> (ReportConfiguration, ConfigurationPhase) {
    handle.type_text(field.clone(), text).await.unwrap();
    let hints = next_hints(events, field).await;
    let candidate = hints
        .into_iter()
        .find(|hint| hint.value.as_str() == value)
        .expect("value offered as hint");
    handle.select(field.clone(), candidate).await.unwrap();
    next_rebuild(events).await
}

/// Let every ready task run before continuing.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// =============================================================================
// DEBOUNCE AND ORDERING
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_burst_of_keystrokes_fetches_once() {
    let provider = Arc::new(CountingHintProvider::new(catalog()));
    let (handle, mut events) = start(provider.clone(), Arc::new(RecordingReportBuilder::accepting(1)));
    let city = FieldKey::category("city");

    for text in ["n", "ne", "new"] {
        handle.type_text(city.clone(), text).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(provider.call_count(), 0);

    let hints = next_hints(&mut events, &city).await;
    assert_eq!(provider.calls(), vec![HintCall::new("city", "new")]);
    let values: Vec<_> = hints.iter().map(|h| h.value.as_str()).collect();
    assert_eq!(values, vec!["NYC", "NWK"]);
}

#[tokio::test(start_paused = true)]
async fn test_no_fetch_before_debounce_window() {
    let provider = Arc::new(CountingHintProvider::new(catalog()));
    let (handle, mut events) = start(provider.clone(), Arc::new(RecordingReportBuilder::accepting(1)));
    let state = FieldKey::category("state");

    handle.type_text(state.clone(), "new").await.unwrap();
    tokio::time::sleep(Duration::from_millis(299)).await;
    assert_eq!(provider.call_count(), 0);

    next_hints(&mut events, &state).await;
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_of_superseded_fetch_is_discarded() {
    let provider = Arc::new(GatedHintProvider::new());
    let (handle, mut events) = start(provider.clone(), Arc::new(RecordingReportBuilder::accepting(1)));
    let city = FieldKey::category("city");

    handle.type_text(city.clone(), "a").await.unwrap();
    provider.wait_for_request("a").await;
    handle.type_text(city.clone(), "ab").await.unwrap();
    provider.wait_for_request("ab").await;

    // B resolves first
    assert!(provider.release("ab", Ok(vec![HintCandidate::new("AB", "Abbeville")])));
    let hints = next_hints(&mut events, &city).await;
    assert_eq!(hints, vec![HintCandidate::new("AB", "Abbeville")]);

    // A resolves late and must not win
    assert!(provider.release("a", Ok(vec![HintCandidate::new("A", "Albany")])));
    settle().await;

    let snapshot = handle.inspect().await.unwrap();
    let state = &snapshot.fields[&city];
    assert_eq!(state.hints, vec![HintCandidate::new("AB", "Abbeville")]);
    assert_eq!(state.query, "ab");
    assert!(!state.pending);
}

#[tokio::test(start_paused = true)]
async fn test_selection_discards_in_flight_fetch() {
    let provider = Arc::new(GatedHintProvider::new());
    let (handle, mut events) = start(provider.clone(), Arc::new(RecordingReportBuilder::accepting(1)));
    let city = FieldKey::category("city");

    handle.type_text(city.clone(), "new").await.unwrap();
    provider.wait_for_request("new").await;
    provider.release("new", Ok(vec![HintCandidate::new("NYC", "New York City")]));
    next_hints(&mut events, &city).await;

    handle.type_text(city.clone(), "newa").await.unwrap();
    provider.wait_for_request("newa").await;
    // Hints from "new" are still shown while "newa" is in flight
    handle
        .select(city.clone(), HintCandidate::new("NYC", "New York City"))
        .await
        .unwrap();
    let (configuration, _) = next_rebuild(&mut events).await;
    assert_eq!(
        configuration.get("city"),
        Some(&CategoryValue::Scalar(FilterValue::from("NYC")))
    );

    provider.release("newa", Ok(vec![HintCandidate::new("NWK", "Newark")]));
    settle().await;
    let snapshot = handle.inspect().await.unwrap();
    assert!(snapshot.fields[&city].hints.is_empty());
    assert_eq!(snapshot.fields[&city].query, "New York City");
}

// =============================================================================
// FAILURE AND LIFECYCLE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_provider_failure_shows_empty_hints() {
    let provider = Arc::new(FailingHintProvider::new("backend down"));
    let (handle, mut events) = start(provider, Arc::new(RecordingReportBuilder::accepting(1)));
    let city = FieldKey::category("city");

    handle.type_text(city.clone(), "new").await.unwrap();
    let hints = next_hints(&mut events, &city).await;
    assert!(hints.is_empty());

    let snapshot = handle.inspect().await.unwrap();
    assert!(!snapshot.fields[&city].pending);
    assert_eq!(snapshot.phase, ConfigurationPhase::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_unmounted_field_disregards_late_hints() {
    let provider = Arc::new(GatedHintProvider::new());
    let (handle, _events) = start(provider.clone(), Arc::new(RecordingReportBuilder::accepting(1)));
    let city = FieldKey::category("city");

    handle.type_text(city.clone(), "new").await.unwrap();
    provider.wait_for_request("new").await;
    handle.unmount(city.clone()).await.unwrap();
    provider.release("new", Ok(vec![HintCandidate::new("NYC", "New York City")]));
    settle().await;

    let snapshot = handle.inspect().await.unwrap();
    assert!(snapshot.fields[&city].hints.is_empty());
    assert!(!snapshot.fields[&city].pending);

    // Typing after unmount schedules nothing
    handle.type_text(city.clone(), "buf").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!provider.is_pending("buf"));
}

// =============================================================================
// CONFIGURATION AND SUBMISSION
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_city_state_submission() {
    let builder = Arc::new(RecordingReportBuilder::accepting(42));
    let (handle, mut events) = start(Arc::new(catalog()), builder.clone());
    let city = FieldKey::category("city");
    let state = FieldKey::category("state");

    let (_, phase) = pick(&handle, &mut events, &city, "new york", "NYC").await;
    assert_eq!(phase, ConfigurationPhase::Partial);

    handle.submit().await.unwrap();
    loop {
        match next_event(&mut events).await {
            WizardEvent::SubmitRejected { missing } => {
                assert_eq!(missing, vec!["state".to_string()]);
                break;
            }
            WizardEvent::Submitted { .. } => panic!("submitted without state"),
            _ => {}
        }
    }
    assert!(builder.requests().is_empty());

    let (configuration, phase) = pick(&handle, &mut events, &state, "york", "NY").await;
    assert_eq!(phase, ConfigurationPhase::Submittable);
    assert_eq!(
        configuration.to_filters_json(),
        serde_json::json!({"city": "NYC", "state": "NY"})
    );

    handle.submit().await.unwrap();
    let response: BuildReportResponse = loop {
        if let WizardEvent::Submitted { response, .. } = next_event(&mut events).await {
            break response;
        }
    };
    assert_eq!(response.report_data_id, 42);

    let requests = builder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].category, "contacts");
    assert_eq!(requests[0].session_id, handle.session_id());
    assert_eq!(
        requests[0].filters.to_filters_json(),
        serde_json::json!({"city": "NYC", "state": "NY"})
    );
}

#[tokio::test(start_paused = true)]
async fn test_clearing_search_text_resets_category() {
    let (handle, mut events) = start(
        Arc::new(catalog()),
        Arc::new(RecordingReportBuilder::accepting(1)),
    );
    let city = FieldKey::category("city");

    pick(&handle, &mut events, &city, "buf", "BUF").await;
    handle.type_text(city.clone(), "").await.unwrap();

    let (configuration, phase) = next_rebuild(&mut events).await;
    assert!(!configuration.is_set("city"));
    assert!(configuration.has_category("city"));
    assert_eq!(phase, ConfigurationPhase::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_composite_publishes_whole_filter() {
    let (handle, mut events) = start(
        Arc::new(catalog()),
        Arc::new(RecordingReportBuilder::accepting(1)),
    );
    let city = FieldKey::composite("location", "city");
    let state = FieldKey::composite("location", "state");

    // State first, then city
    let (configuration, _) = pick(&handle, &mut events, &state, "jersey", "NJ").await;
    assert_eq!(
        configuration.to_filters_json(),
        serde_json::json!({"location": {"state": "NJ"}})
    );

    let (configuration, _) = pick(&handle, &mut events, &city, "newark", "NWK").await;
    assert_eq!(
        configuration.to_filters_json(),
        serde_json::json!({"location": {"city": "NWK", "state": "NJ"}})
    );
}

#[tokio::test(start_paused = true)]
async fn test_tag_hints_exclude_selected_tags() {
    let (handle, mut events) = start(
        Arc::new(catalog()),
        Arc::new(RecordingReportBuilder::accepting(1)),
    );
    let tags = FieldKey::category("tags");

    let (configuration, _) = pick(&handle, &mut events, &tags, "vet", "veterans").await;
    assert!(configuration.is_set("tags"));

    handle.type_text(tags.clone(), "vet").await.unwrap();
    let hints = next_hints(&mut events, &tags).await;
    let values: Vec<_> = hints.iter().map(|h| h.value.as_str()).collect();
    assert_eq!(values, vec!["vets"]);

    let snapshot = handle.inspect().await.unwrap();
    let selected: Vec<_> = snapshot.tags["tags"].values().map(FilterValue::as_str).collect();
    assert_eq!(selected, vec!["veterans"]);
}

#[tokio::test(start_paused = true)]
async fn test_removing_last_tag_leaves_category_absent() {
    let (handle, mut events) = start(
        Arc::new(catalog()),
        Arc::new(RecordingReportBuilder::accepting(1)),
    );

    handle
        .add_tag("tags", HintCandidate::new("vip", "VIP"))
        .await
        .unwrap();
    let (configuration, _) = next_rebuild(&mut events).await;
    assert!(configuration.is_set("tags"));

    // Removing a tag that is not selected changes nothing
    handle.remove_tag("tags", "other").await.unwrap();
    handle.remove_tag("tags", "vip").await.unwrap();
    let (configuration, phase) = next_rebuild(&mut events).await;
    assert!(!configuration.is_set("tags"));
    assert_eq!(phase, ConfigurationPhase::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_sees_every_rebuild() {
    let config = WizardConfig::from_toml_str(CONFIG).unwrap();
    let mut session = WizardSession::new(
        &config,
        Arc::new(catalog()),
        Arc::new(RecordingReportBuilder::accepting(1)),
    )
    .unwrap()
    .with_target(ReportTarget::new("partners", "partners"));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    session.subscribe(move |configuration| {
        let _ = tx.send(configuration.set_count());
    });
    let (handle, _events) = session.start();

    handle
        .add_tag("tags", HintCandidate::new("vip", "VIP"))
        .await
        .unwrap();
    handle
        .add_tag("tags", HintCandidate::new("new", "New"))
        .await
        .unwrap();
    settle().await;

    assert_eq!(rx.recv().await, Some(1));
    assert_eq!(rx.recv().await, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_added_tag_is_dropped_from_shown_hints() {
    let (handle, mut events) = start(
        Arc::new(catalog()),
        Arc::new(RecordingReportBuilder::accepting(1)),
    );
    let tags = FieldKey::category("tags");

    handle.type_text(tags.clone(), "v").await.unwrap();
    let hints = next_hints(&mut events, &tags).await;
    assert_eq!(hints.len(), 3);

    handle
        .add_tag("tags", HintCandidate::new("veterans", "Veterans"))
        .await
        .unwrap();
    let hints = next_hints(&mut events, &tags).await;
    let values: Vec<_> = hints.iter().map(|h| h.value.as_str()).collect();
    assert_eq!(values, vec!["vets", "volunteers"]);

    let snapshot = handle.inspect().await.unwrap();
    let shown: Vec<_> = snapshot.fields[&tags]
        .hints
        .iter()
        .map(|h| h.value.as_str())
        .collect();
    assert_eq!(shown, vec!["vets", "volunteers"]);
    let selected: Vec<_> = snapshot.tags["tags"].values().map(FilterValue::as_str).collect();
    assert_eq!(selected, vec!["veterans"]);
}

#[tokio::test(start_paused = true)]
async fn test_undrained_events_do_not_stall_session() {
    let (handle, _events) = start(
        Arc::new(catalog()),
        Arc::new(RecordingReportBuilder::accepting(1)),
    );

    // Each change queues a rebuild event nobody reads
    for _ in 0..200 {
        handle
            .add_tag("tags", HintCandidate::new("vip", "VIP"))
            .await
            .unwrap();
        handle.remove_tag("tags", "vip").await.unwrap();
    }

    let snapshot = timeout(Duration::from_secs(60), handle.inspect())
        .await
        .expect("session stalled on a full event channel")
        .unwrap();
    assert!(snapshot.tags["tags"].is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_build_reports_submit_failure() {
    let (handle, mut events) = start(
        Arc::new(catalog()),
        Arc::new(RecordingReportBuilder::rejecting("quota exceeded")),
    );

    pick(&handle, &mut events, &FieldKey::category("city"), "buf", "BUF").await;
    pick(&handle, &mut events, &FieldKey::category("state"), "york", "NY").await;

    handle.submit().await.unwrap();
    let message = loop {
        match next_event(&mut events).await {
            WizardEvent::SubmitFailed { message } => break message,
            WizardEvent::Submitted { .. } => panic!("rejected build reported as submitted"),
            _ => {}
        }
    };
    let expected = WizardError::from(ReportBuildError::Rejected("quota exceeded".into()));
    assert_eq!(message, expected.to_string());
}

#[tokio::test(start_paused = true)]
async fn test_partial_composite_satisfies_required_category() {
    let config = CONFIG.replace(r#"required = ["city", "state"]"#, r#"required = ["location"]"#);
    let config = WizardConfig::from_toml_str(&config).unwrap();
    let (handle, mut events) = WizardSession::new(
        &config,
        Arc::new(catalog()),
        Arc::new(RecordingReportBuilder::accepting(1)),
    )
    .unwrap()
    .start();

    let city = FieldKey::composite("location", "city");
    let (configuration, phase) = pick(&handle, &mut events, &city, "buf", "BUF").await;
    assert_eq!(
        configuration.to_filters_json(),
        serde_json::json!({"location": {"city": "BUF"}})
    );
    assert_eq!(phase, ConfigurationPhase::Submittable);
}
