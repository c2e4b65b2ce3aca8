//! Session tapes for the report wizard.
//!
//! A tape is an NDJSON file with one [`EnvelopeV1`] per line: what the user
//! did to a wizard session and what the session answered. Text typed into
//! search fields is personal data, so it is recorded as a salted blake3 hash
//! unless the writer is told otherwise. Resolved filter values are recorded
//! as-is; they are what the report is built from.
//!
//! ```no_run
//! use reportwiz_tape::{EventName, TapeWriter};
//! use std::path::Path;
//!
//! let tape = TapeWriter::new(Path::new("/tmp/wizard.tape")).unwrap();
//! tape.emit(
//!     EventName::SessionEvent("ConfigurationRebuilt".to_string()),
//!     None,
//!     serde_json::json!({ "phase": "partial" }),
//! )
//! .unwrap();
//! ```

use chrono::{DateTime, Utc};
use reportwiz_protocol::{HintCandidate, ReportConfiguration, SessionId};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Current schema version for event envelopes.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum TapeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed tape line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Failed to acquire lock")]
    LockError,
}

/// One recorded tape entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeV1 {
    pub schema_version: u32,
    pub event_id: String,
    /// Strictly increasing within one tape, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// Wizard session the entry belongs to
    pub session_id: Option<String>,
    pub event_name: EventName,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "name")]
pub enum EventName {
    #[serde(rename = "tape_started")]
    TapeStarted,
    #[serde(rename = "tape_stopped")]
    TapeStopped,
    /// Something the user did, e.g. "Type", "Select", "Submit"
    #[serde(rename = "user_input")]
    UserInput(String),
    /// Something the session emitted, e.g. "HintsUpdated", "Submitted"
    #[serde(rename = "session_event")]
    SessionEvent(String),
    /// A rejected input or failed submission
    #[serde(rename = "error_event")]
    ErrorEvent(String),
}

/// How typed text is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedactionMode {
    /// Salted hash of the text (default)
    #[default]
    Hash,
    /// Only the text length
    Omit,
    /// The text itself
    Plaintext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TapeStartedPayload {
    /// Hash of the redaction salt, never the salt itself
    salt_hash: String,
    hostname: String,
}

pub struct TapeWriter {
    file: Mutex<BufWriter<File>>,
    seq: AtomicU64,
    redaction_salt: [u8; 32],
    redaction: RedactionMode,
}

impl TapeWriter {
    /// Create (or truncate) the tape at `path` and write `TapeStarted`.
    pub fn new(path: &Path) -> Result<Self, TapeError> {
        let mut salt = [0u8; 32];
        salt[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        salt[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self::new_with_salt(path, salt)
    }

    fn new_with_salt(path: &Path, salt: [u8; 32]) -> Result<Self, TapeError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let tape = Self {
            file: Mutex::new(BufWriter::new(file)),
            seq: AtomicU64::new(0),
            redaction_salt: salt,
            redaction: RedactionMode::default(),
        };
        tape.write_tape_started()?;
        Ok(tape)
    }

    pub fn with_redaction(mut self, redaction: RedactionMode) -> Self {
        self.redaction = redaction;
        self
    }

    fn write_tape_started(&self) -> Result<String, TapeError> {
        let hostname = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| "unknown".to_string());
        let payload = TapeStartedPayload {
            salt_hash: self.redact_bytes(&self.redaction_salt),
            hostname,
        };
        self.emit(EventName::TapeStarted, None, serde_json::to_value(payload)?)
    }

    /// Append one envelope and return its event id.
    pub fn emit(
        &self,
        event_name: EventName,
        session_id: Option<&SessionId>,
        payload: serde_json::Value,
    ) -> Result<String, TapeError> {
        let event_id = Uuid::new_v4().to_string();
        let mut file = self.file.lock().map_err(|_| TapeError::LockError)?;
        // Taken under the lock so line order matches seq order
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);

        let envelope = EnvelopeV1 {
            schema_version: SCHEMA_VERSION,
            event_id: event_id.clone(),
            seq,
            timestamp: Utc::now(),
            session_id: session_id.map(ToString::to_string),
            event_name,
            payload,
        };
        writeln!(file, "{}", serde_json::to_string(&envelope)?)?;
        file.flush()?;

        Ok(event_id)
    }

    /// Text typed into `field`, recorded per the writer's [`RedactionMode`].
    pub fn record_typed(
        &self,
        session_id: &SessionId,
        field: &str,
        text: &str,
    ) -> Result<String, TapeError> {
        let mut payload = serde_json::json!({
            "field": field,
            "len": text.chars().count(),
        });
        match self.redaction {
            RedactionMode::Hash => payload["query_hash"] = self.redact_string(text).into(),
            RedactionMode::Omit => {}
            RedactionMode::Plaintext => payload["query"] = text.into(),
        }
        self.emit(EventName::UserInput("Type".to_string()), Some(session_id), payload)
    }

    /// A hint picked for `field`. The display text is redacted, the value is not.
    pub fn record_selection(
        &self,
        session_id: &SessionId,
        field: &str,
        candidate: &HintCandidate,
    ) -> Result<String, TapeError> {
        let payload = serde_json::json!({
            "field": field,
            "value": candidate.value,
            "display_hash": self.redact_string(&candidate.display),
        });
        self.emit(EventName::UserInput("Select".to_string()), Some(session_id), payload)
    }

    /// Hints shown for `field`; only their values are recorded.
    pub fn record_hints(
        &self,
        session_id: &SessionId,
        field: &str,
        hints: &[HintCandidate],
    ) -> Result<String, TapeError> {
        let values: Vec<&str> = hints.iter().map(|hint| hint.value.as_str()).collect();
        let payload = serde_json::json!({
            "field": field,
            "count": hints.len(),
            "values": values,
        });
        self.emit(
            EventName::SessionEvent("HintsUpdated".to_string()),
            Some(session_id),
            payload,
        )
    }

    pub fn record_configuration(
        &self,
        session_id: &SessionId,
        configuration: &ReportConfiguration,
        phase: &str,
    ) -> Result<String, TapeError> {
        let payload = serde_json::json!({
            "phase": phase,
            "filters": configuration,
        });
        self.emit(
            EventName::SessionEvent("ConfigurationRebuilt".to_string()),
            Some(session_id),
            payload,
        )
    }

    /// Write `TapeStopped` with the number of entries before it.
    pub fn finish(&self) -> Result<String, TapeError> {
        let entries = self.seq.load(Ordering::SeqCst);
        self.emit(
            EventName::TapeStopped,
            None,
            serde_json::json!({ "entries": entries }),
        )
    }

    /// Salted hash of `s`: 16 hex characters.
    pub fn redact_string(&self, s: &str) -> String {
        self.redact_bytes(s.as_bytes())
    }

    fn redact_bytes(&self, data: &[u8]) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.redaction_salt);
        hasher.update(data);
        hasher.finalize().to_hex()[..16].to_string()
    }
}

/// Read every envelope of the tape at `path`.
pub fn read_tape(path: &Path) -> Result<Vec<EnvelopeV1>, TapeError> {
    let reader = BufReader::new(File::open(path)?);
    let mut envelopes = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope = serde_json::from_str(&line).map_err(|source| TapeError::Malformed {
            line: index + 1,
            source,
        })?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}
