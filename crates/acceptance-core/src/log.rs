//! Append-only structured event log with a text sink and a JSON-lines relay.
//!
//! Every record is written with open-append-close so that independent
//! processes (a feature-stage run and a delivery-stage run, say) can share
//! the same files without locks. Records from concurrent runs interleave;
//! consumers tell them apart by correlation fields, never by file order.

use crate::config::{Config, TransportConfig, TransportMode};
use crate::error::Result;
use crate::io::append_line_with_retry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Level / TestStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Success,
    Error,
    Change,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Error => "ERROR",
            Level::Change => "CHANGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Start,
    Retry,
    Pass,
    Fail,
    Skip,
    End,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Start => "START",
            TestStatus::Retry => "RETRY",
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Skip => "SKIP",
            TestStatus::End => "END",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "START" => Some(TestStatus::Start),
            "RETRY" => Some(TestStatus::Retry),
            "PASS" => Some(TestStatus::Pass),
            "FAIL" => Some(TestStatus::Fail),
            "SKIP" => Some(TestStatus::Skip),
            "END" => Some(TestStatus::End),
            _ => None,
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fields / LogRecord
// ---------------------------------------------------------------------------

/// Optional correlation fields carried by a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_status: Option<TestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Fields {
    pub fn suite(suite: impl Into<String>) -> Self {
        Self {
            suite: Some(suite.into()),
            ..Self::default()
        }
    }

    pub fn test_point(mut self, id: impl Into<String>) -> Self {
        self.test_point = Some(id.into());
        self
    }

    pub fn status(mut self, status: TestStatus) -> Self {
        self.test_status = Some(status);
        self
    }

    pub fn attempt(mut self, attempt: u32, max_attempts: u32) -> Self {
        self.attempt = Some(attempt);
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Fill any unset field from `base`.
    fn inherit(mut self, base: &Fields) -> Self {
        fn fill(slot: &mut Option<String>, base: &Option<String>) {
            if slot.is_none() {
                slot.clone_from(base);
            }
        }
        fill(&mut self.skill, &base.skill);
        fill(&mut self.change_id, &base.change_id);
        fill(&mut self.phase, &base.phase);
        fill(&mut self.run_id, &base.run_id);
        fill(&mut self.suite, &base.suite);
        fill(&mut self.test_point, &base.test_point);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: Level,
    pub message: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>, fields: Fields) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            level,
            message: message.into(),
            fields,
        }
    }

    /// One text-log line: `key=value` tokens then the free-text message.
    pub fn to_text_line(&self) -> String {
        let f = &self.fields;
        let mut tokens = vec![
            format!("ts={}", self.timestamp),
            format!("level={}", self.level.as_str()),
        ];
        let mut push = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                tokens.push(format!("{key}={}", token_value(&v)));
            }
        };
        push("skill", f.skill.clone());
        push("changeId", f.change_id.clone());
        push("phase", f.phase.clone());
        push("runId", f.run_id.clone());
        push("suite", f.suite.clone());
        push("testPoint", f.test_point.clone());
        push("testStatus", f.test_status.map(|s| s.as_str().to_string()));
        push("attempt", f.attempt.map(|a| a.to_string()));
        push("maxAttempts", f.max_attempts.map(|a| a.to_string()));

        let message = self.message.replace(['\r', '\n'], " ");
        format!("{} {}\n", tokens.join(" "), message.trim_end())
    }

    pub fn to_json_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

fn token_value(value: &str) -> String {
    if value.is_empty() {
        return "-".to_string();
    }
    value
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Writes records to the sinks selected by the transport mode.
#[derive(Debug, Clone)]
pub struct Logger {
    transport: TransportConfig,
    log_path: PathBuf,
    relay_path: PathBuf,
    base: Fields,
}

impl Logger {
    pub fn new(transport: TransportConfig, log_path: PathBuf, relay_path: PathBuf) -> Self {
        Self {
            transport,
            log_path,
            relay_path,
            base: Fields::default(),
        }
    }

    /// Build a logger from config, resolving sink paths against `root` and
    /// stamping skill/change/phase plus a fresh run id on every record.
    pub fn from_config(config: &Config, root: &Path) -> Self {
        let base = Fields {
            skill: config.skill.clone(),
            change_id: config.change_id.clone(),
            phase: config.phase.clone(),
            run_id: Some(uuid::Uuid::new_v4().to_string()),
            ..Fields::default()
        };
        Self::new(
            config.transport.clone(),
            config.log_path(root),
            config.relay_path(root),
        )
        .with_base(base)
    }

    pub fn with_base(mut self, base: Fields) -> Self {
        self.base = base;
        self
    }

    pub fn mode(&self) -> TransportMode {
        self.transport.mode
    }

    pub fn run_id(&self) -> Option<&str> {
        self.base.run_id.as_deref()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn relay_path(&self) -> &Path {
        &self.relay_path
    }

    pub fn emit(&self, level: Level, message: impl Into<String>, fields: Fields) -> Result<()> {
        let record = LogRecord::new(level, message, fields.inherit(&self.base));
        self.write(&record)
    }

    /// Write a finished record to the configured sinks.
    ///
    /// Hybrid writes the text line first, so a relay failure never costs the
    /// text log its copy of the event.
    pub fn write(&self, record: &LogRecord) -> Result<()> {
        let mode = self.transport.mode;
        if mode.writes_text() {
            self.append_text(record)?;
        }
        if !mode.writes_json() {
            return Ok(());
        }
        match self.append_json(record) {
            Ok(()) => Ok(()),
            Err(e) if self.transport.fallback_to_realtime_on_json_error => {
                tracing::warn!(
                    relay = %self.relay_path.display(),
                    error = %e,
                    "relay write failed; falling back to text log"
                );
                if mode == TransportMode::Json {
                    self.append_text(record)?;
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn append_text(&self, record: &LogRecord) -> Result<()> {
        append_line_with_retry(
            &self.log_path,
            &record.to_text_line(),
            self.transport.write_attempts,
            self.transport.write_backoff(),
        )
    }

    fn append_json(&self, record: &LogRecord) -> Result<()> {
        append_line_with_retry(
            &self.relay_path,
            &record.to_json_line()?,
            self.transport.write_attempts,
            self.transport.write_backoff(),
        )
    }
}

// ---------------------------------------------------------------------------
// Reading the relay back
// ---------------------------------------------------------------------------

/// Read every well-formed record from a relay file. A missing file yields an
/// empty list; malformed lines are skipped.
pub fn read_relay(path: &Path) -> Result<Vec<LogRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path)?;
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in data.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<LogRecord>(line) {
            Ok(r) => records.push(r),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "skipped malformed relay lines");
    }
    Ok(records)
}

/// Selects relay records by correlation field.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub suite: Option<String>,
    pub test_point: Option<String>,
    pub run_id: Option<String>,
    pub status: Option<TestStatus>,
}

impl RecordFilter {
    pub fn matches(&self, record: &LogRecord) -> bool {
        let f = &record.fields;
        let eq = |want: &Option<String>, have: &Option<String>| match want {
            Some(w) => have.as_deref() == Some(w.as_str()),
            None => true,
        };
        eq(&self.suite, &f.suite)
            && eq(&self.test_point, &f.test_point)
            && eq(&self.run_id, &f.run_id)
            && self.status.map_or(true, |s| f.test_status == Some(s))
    }

    pub fn apply<'a>(&self, records: &'a [LogRecord]) -> Vec<&'a LogRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
