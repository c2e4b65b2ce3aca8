//! End-to-end tests for `reportwiz validate`, `replay` and `tape`
//! against the sample wizard in `demos/`.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn reportwiz_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_reportwiz"))
}

fn demos_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

fn run(home: &Path, args: &[&str]) -> Output {
    Command::new(reportwiz_bin())
        .env("REPORTWIZ_HOME", home)
        .args(args)
        .output()
        .expect("Failed to run reportwiz")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "Command should succeed. stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn parse_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn demo(name: &str) -> String {
    demos_dir().join(name).to_string_lossy().into_owned()
}

#[test]
fn test_validate_demo_config_json() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["validate", &demo("wizard.toml"), "--json"]);
    assert_success(&output);

    let json = parse_json(&output);
    let text = json.to_string();
    assert!(text.contains("location"), "unexpected output: {}", text);
    assert!(text.contains("contact_type"), "unexpected output: {}", text);
}

#[test]
fn test_validate_rejects_bad_config() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(
        &config,
        "required = [\"zip\"]\n[[categories]]\nname = \"city\"\nkind = \"search\"\n",
    )
    .unwrap();

    let output = run(home.path(), &["validate", config.to_str().unwrap(), "--json"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("zip"), "error should name the category: {}", stdout);
}

#[test]
fn test_replay_demo_script_submits() {
    let home = TempDir::new().unwrap();
    let output = run(
        home.path(),
        &[
            "replay",
            "--config",
            &demo("wizard.toml"),
            "--catalog",
            &demo("catalog.json"),
            "--script",
            &demo("script.json"),
            "--json",
        ],
    );
    assert_success(&output);

    let json = parse_json(&output);
    assert_eq!(json["phase"], "submittable");
    assert_eq!(json["filters"]["location"]["city"], "NYC");
    assert_eq!(json["filters"]["location"]["state"], "NY");
    assert_eq!(json["filters"]["contact_type"], "individual");
    assert_eq!(json["filters"]["tags"][0]["value"], "veterans");

    let submissions = json["submissions"].as_array().expect("submissions array");
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0]["status"], "rejected");
    assert_eq!(submissions[0]["missing"][0], "location");
    assert_eq!(submissions[1]["status"], "submitted");
    assert_eq!(submissions[1]["response"]["report_type"], "contacts");
}

#[test]
fn test_replay_records_tape_and_tape_summarizes_it() {
    let home = TempDir::new().unwrap();
    let tape_path = home.path().join("session.tape");
    let tape = tape_path.to_string_lossy().into_owned();

    let output = run(
        home.path(),
        &[
            "replay",
            "--config",
            &demo("wizard.toml"),
            "--catalog",
            &demo("catalog.json"),
            "--script",
            &demo("script.json"),
            "--tape",
            &tape,
        ],
    );
    assert_success(&output);
    assert!(tape_path.exists(), "Tape file should be created");

    let content = std::fs::read_to_string(&tape_path).unwrap();
    // Typed text is hashed unless --plaintext is given
    assert!(!content.contains("\"query\":\"new\""));
    assert!(content.contains("query_hash"));

    let output = run(home.path(), &["tape", &tape, "--json"]);
    assert_success(&output);
    let summary = parse_json(&output);
    assert_eq!(summary["inputs"]["Type"], 4);
    assert_eq!(summary["inputs"]["Submit"], 2);
    assert_eq!(summary["final_phase"], "submittable");
    assert_eq!(summary["submissions"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_replay_missing_catalog_fails() {
    let home = TempDir::new().unwrap();
    let output = run(
        home.path(),
        &[
            "replay",
            "--config",
            &demo("wizard.toml"),
            "--catalog",
            "/nonexistent/catalog.json",
            "--script",
            &demo("script.json"),
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("catalog.json"), "stderr: {}", stderr);
}

#[test]
fn test_replay_bare_tape_flag_records_under_home() {
    let home = TempDir::new().unwrap();
    let output = run(
        home.path(),
        &[
            "replay",
            "--config",
            &demo("wizard.toml"),
            "--catalog",
            &demo("catalog.json"),
            "--script",
            &demo("script.json"),
            "--tape",
            "--json",
        ],
    );
    assert_success(&output);

    let json = parse_json(&output);
    let tape = PathBuf::from(json["tape"].as_str().expect("tape path in output"));
    assert!(tape.starts_with(home.path().join("tapes")));
    assert!(tape.exists());
}
