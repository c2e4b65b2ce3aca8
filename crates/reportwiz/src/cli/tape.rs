//! `reportwiz tape`
//!
//! Summarizes a tape recorded by `reportwiz replay --tape`.

use anyhow::{Context, Result};
use reportwiz_tape::{read_tape, EnvelopeV1, EventName};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::error::HelpfulError;

/// Overall tape summary
#[derive(Debug, Default, Serialize)]
struct TapeSummary {
    schema_version: u32,
    event_count: usize,
    sessions: BTreeSet<String>,
    inputs: BTreeMap<String, usize>,
    session_events: BTreeMap<String, usize>,
    /// Phase of the last rebuilt configuration
    final_phase: Option<String>,
    submissions: Vec<i64>,
    errors: Vec<String>,
}

pub fn run(tape_file: &Path, json: bool) -> Result<()> {
    if !tape_file.exists() {
        return Err(HelpfulError::file_not_found(tape_file).into());
    }
    let envelopes = read_tape(tape_file)
        .with_context(|| format!("Failed to read tape: {}", tape_file.display()))?;
    let summary = summarize(&envelopes);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary_text(&summary);
    }
    Ok(())
}

fn summarize(envelopes: &[EnvelopeV1]) -> TapeSummary {
    let mut summary = TapeSummary::default();
    for envelope in envelopes {
        summary.event_count += 1;
        summary.schema_version = envelope.schema_version;
        if let Some(session) = &envelope.session_id {
            summary.sessions.insert(session.clone());
        }
        process_event(envelope, &mut summary);
    }
    summary
}

fn process_event(envelope: &EnvelopeV1, summary: &mut TapeSummary) {
    match &envelope.event_name {
        EventName::TapeStarted | EventName::TapeStopped => {}
        EventName::UserInput(name) => {
            *summary.inputs.entry(name.clone()).or_default() += 1;
        }
        EventName::SessionEvent(name) => {
            *summary.session_events.entry(name.clone()).or_default() += 1;
            match name.as_str() {
                "ConfigurationRebuilt" => {
                    if let Some(phase) = envelope.payload.get("phase").and_then(Value::as_str) {
                        summary.final_phase = Some(phase.to_string());
                    }
                }
                "Submitted" => {
                    if let Some(id) = envelope
                        .payload
                        .pointer("/response/report_data_id")
                        .and_then(Value::as_i64)
                    {
                        summary.submissions.push(id);
                    }
                }
                _ => {}
            }
        }
        EventName::ErrorEvent(name) => {
            let detail = envelope
                .payload
                .get("error")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| {
                    envelope
                        .payload
                        .get("missing")
                        .and_then(Value::as_array)
                        .map(|missing| {
                            let names: Vec<&str> =
                                missing.iter().filter_map(Value::as_str).collect();
                            format!("missing {}", names.join(", "))
                        })
                });
            match detail {
                Some(detail) => summary.errors.push(format!("{}: {}", name, detail)),
                None => summary.errors.push(name.clone()),
            }
        }
    }
}

fn print_summary_text(summary: &TapeSummary) {
    println!("=== Tape Summary ===\n");
    println!("Schema Version: {}", summary.schema_version);
    println!("Total Events: {}", summary.event_count);
    println!("Sessions: {}", summary.sessions.len());
    if let Some(phase) = &summary.final_phase {
        println!("Final Phase: {}", phase);
    }
    println!();

    if !summary.inputs.is_empty() {
        println!("Inputs:");
        for (name, count) in &summary.inputs {
            println!("  {:<12} {}", name, count);
        }
        println!();
    }

    if !summary.session_events.is_empty() {
        println!("Session Events:");
        for (name, count) in &summary.session_events {
            println!("  {:<22} {}", name, count);
        }
        println!();
    }

    if !summary.submissions.is_empty() {
        let ids: Vec<String> = summary.submissions.iter().map(i64::to_string).collect();
        println!("Submitted reports: {}", ids.join(", "));
        println!();
    }

    if !summary.errors.is_empty() {
        println!("Errors ({}):", summary.errors.len());
        for error in &summary.errors {
            println!("  - {}", error);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tape(events: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for event in events {
            writeln!(file, "{}", event).unwrap();
        }
        file.flush().unwrap();
        file
    }

    const SESSION: &str = "6a1f5c2e-8d4b-4e0a-9f1d-2b3c4d5e6f70";

    fn sample_tape() -> NamedTempFile {
        create_test_tape(&[
            r#"{"schema_version":1,"event_id":"e1","seq":0,"timestamp":"2026-01-01T00:00:00Z","session_id":null,"event_name":{"type":"tape_started"},"payload":{}}"#,
            &format!(r#"{{"schema_version":1,"event_id":"e2","seq":1,"timestamp":"2026-01-01T00:00:01Z","session_id":"{SESSION}","event_name":{{"type":"user_input","name":"Type"}},"payload":{{"field":"city","len":2}}}}"#),
            &format!(r#"{{"schema_version":1,"event_id":"e3","seq":2,"timestamp":"2026-01-01T00:00:02Z","session_id":"{SESSION}","event_name":{{"type":"user_input","name":"Submit"}},"payload":{{}}}}"#),
            &format!(r#"{{"schema_version":1,"event_id":"e4","seq":3,"timestamp":"2026-01-01T00:00:03Z","session_id":"{SESSION}","event_name":{{"type":"error_event","name":"SubmitRejected"}},"payload":{{"missing":["state"]}}}}"#),
            &format!(r#"{{"schema_version":1,"event_id":"e5","seq":4,"timestamp":"2026-01-01T00:00:04Z","session_id":"{SESSION}","event_name":{{"type":"session_event","name":"ConfigurationRebuilt"}},"payload":{{"phase":"submittable","filters":{{}}}}}}"#),
            &format!(r#"{{"schema_version":1,"event_id":"e6","seq":5,"timestamp":"2026-01-01T00:00:05Z","session_id":"{SESSION}","event_name":{{"type":"session_event","name":"Submitted"}},"payload":{{"response":{{"report_data_id":7,"reporting_type":"intention","report_type":"contacts","data_type":"records"}}}}}}"#),
        ])
    }

    #[test]
    fn test_summarize_counts_inputs_and_submissions() {
        let tape = sample_tape();
        let envelopes = read_tape(tape.path()).unwrap();
        let summary = summarize(&envelopes);

        assert_eq!(summary.event_count, 6);
        assert_eq!(summary.sessions.len(), 1);
        assert_eq!(summary.inputs.get("Type"), Some(&1));
        assert_eq!(summary.inputs.get("Submit"), Some(&1));
        assert_eq!(summary.final_phase.as_deref(), Some("submittable"));
        assert_eq!(summary.submissions, vec![7]);
        assert_eq!(summary.errors, vec!["SubmitRejected: missing state".to_string()]);
    }

    #[test]
    fn test_run_prints_both_formats() {
        let tape = sample_tape();
        assert!(run(tape.path(), false).is_ok());
        assert!(run(tape.path(), true).is_ok());
    }

    #[test]
    fn test_missing_tape_is_helpful_error() {
        let err = run(Path::new("/nonexistent/session.tape"), false).unwrap_err();
        assert!(err.downcast_ref::<HelpfulError>().is_some());
    }
}
