//! Concrete Telemetry Controller and Failure Tracker (spec.md §4.11),
//! grounded in the teacher's `ChannelTelemetryEmitter`/
//! `RecordingTelemetryEmitter` (`mofa-foundation/src/workflow/telemetry.rs`)
//! — here specialized to the three named modes and JSONL file sinks the
//! spec requires instead of a generic channel/recorder pair.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use regex::Regex;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wayfarer_kernel::telemetry::{FailureRecord, FailureSink, TelemetryLevel, TelemetryRecord, TelemetrySink};

/// Fixed allow-list of business events minimal mode always writes, plus
/// any event ending in `_error` (spec.md §4.11).
const MINIMAL_ALLOW_LIST: &[&str] = &[
    "run_start",
    "run_end",
    "node_enter",
    "node_exit",
    "plan_created",
    "needs_user_input",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryMode {
    Minimal,
    Selective,
    Detailed,
}

fn sensitive_key_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(api[_-]?key|authorization|token|secret|password)").unwrap())
}

/// Redact sensitive keys in a JSON value tree, replacing matched values
/// with `[REDACTED]`, and truncate string leaves at `max_chars`.
fn sanitize(value: &serde_json::Value, max_chars: usize) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if sensitive_key_pattern().is_match(k) {
                    out.insert(k.clone(), serde_json::Value::String("[REDACTED]".into()));
                } else {
                    out.insert(k.clone(), sanitize(v, max_chars));
                }
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| sanitize(v, max_chars)).collect())
        }
        serde_json::Value::String(s) if s.chars().count() > max_chars => {
            let truncated: String = s.chars().take(max_chars).collect();
            serde_json::Value::String(format!("{truncated}…"))
        }
        other => other.clone(),
    }
}

struct FileSink {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl FileSink {
    fn open(path: PathBuf) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = self.file.lock();
        writeln!(file, "{line}")
    }
}

/// The run-scoped telemetry controller. Writes `trace.jsonl` under tiered
/// rules and mirrors both normal events and failures into
/// `combined_<run>.jsonl` (spec.md §4.11).
pub struct TelemetryController {
    run_id: String,
    user_id: String,
    mode: TelemetryMode,
    max_chars: usize,
    trace_sink: FileSink,
    combined_sink: FileSink,
    failure_sink: FileSink,
    buffer: Mutex<Vec<TelemetryRecord>>,
    escalated: AtomicBool,
}

impl TelemetryController {
    pub fn new(
        runtime_dir: &std::path::Path,
        run_id: impl Into<String>,
        user_id: impl Into<String>,
        mode: TelemetryMode,
        max_chars: usize,
    ) -> std::io::Result<Self> {
        let run_id = run_id.into();
        let logs_dir = runtime_dir.join("logs");
        Ok(Self {
            trace_sink: FileSink::open(logs_dir.join("trace.jsonl"))?,
            combined_sink: FileSink::open(logs_dir.join(format!("combined_{run_id}.jsonl")))?,
            failure_sink: FileSink::open(logs_dir.join(format!("failures_{run_id}.jsonl")))?,
            run_id,
            user_id: user_id.into(),
            mode,
            max_chars,
            buffer: Mutex::new(Vec::new()),
            escalated: AtomicBool::new(false),
        })
    }

    fn should_write_immediately(&self, record: &TelemetryRecord) -> bool {
        match self.mode {
            TelemetryMode::Detailed => true,
            TelemetryMode::Minimal => {
                MINIMAL_ALLOW_LIST.contains(&record.event.as_str()) || record.event.ends_with("_error")
            }
            TelemetryMode::Selective => self.escalated.load(Ordering::SeqCst),
        }
    }

    fn sanitized(&self, record: &TelemetryRecord) -> TelemetryRecord {
        let mut sanitized = record.clone();
        sanitized.data = sanitize(&record.data, self.max_chars);
        if sanitized.message.chars().count() > self.max_chars {
            let truncated: String = sanitized.message.chars().take(self.max_chars).collect();
            sanitized.message = format!("{truncated}…");
        }
        sanitized
    }

    fn write_record(&self, record: &TelemetryRecord) {
        let sanitized = self.sanitized(record);
        if let Ok(line) = serde_json::to_string(&sanitized) {
            let _ = self.trace_sink.append_line(&line);
            let _ = self.combined_sink.append_line(&line);
        }
    }

    pub fn trace_path(&self) -> &std::path::Path {
        &self.trace_sink.path
    }
}

#[async_trait]
impl TelemetrySink for TelemetryController {
    async fn emit(&self, record: TelemetryRecord) {
        if self.mode == TelemetryMode::Selective && !self.escalated.load(Ordering::SeqCst) {
            let mut buffer = self.buffer.lock();
            buffer.push(record);
            if buffer.len() > 50 {
                buffer.remove(0);
            }
            return;
        }
        if self.should_write_immediately(&record) {
            self.write_record(&record);
        }
    }

    async fn on_signals_changed(&self, any_signal_true: bool) {
        if self.mode != TelemetryMode::Selective || !any_signal_true {
            return;
        }
        if self.escalated.swap(true, Ordering::SeqCst) {
            return;
        }
        let buffered: Vec<TelemetryRecord> = self.buffer.lock().drain(..).collect();
        for record in &buffered {
            self.write_record(record);
        }
    }
}

#[async_trait]
impl FailureSink for TelemetryController {
    async fn record(&self, failure: FailureRecord) {
        if let Ok(line) = serde_json::to_string(&failure) {
            let _ = self.failure_sink.append_line(&line);
            let _ = self.combined_sink.append_line(&line);
        }
    }
}

/// Convenience constructor for a [`TelemetryRecord`] with the run/user
/// fields pre-filled, matching the JSONL shape in spec.md §4.11.
pub fn record(
    run_id: &str,
    user_id: &str,
    level: TelemetryLevel,
    component: &str,
    event: &str,
    message: impl Into<String>,
    data: serde_json::Value,
) -> TelemetryRecord {
    TelemetryRecord {
        timestamp: Utc::now(),
        level,
        module: "wayfarer_engine".into(),
        event: event.into(),
        message: message.into(),
        run_id: run_id.into(),
        user_id: user_id.into(),
        component: component.into(),
        graph_node: None,
        step_type: None,
        step_id: None,
        step_title: None,
        data,
    }
}

/// A no-op telemetry/failure sink for tests that don't care about
/// observability output.
pub struct NullTelemetry;

#[async_trait]
impl TelemetrySink for NullTelemetry {
    async fn emit(&self, _record: TelemetryRecord) {}
    async fn on_signals_changed(&self, _any_signal_true: bool) {}
}

#[async_trait]
impl FailureSink for NullTelemetry {
    async fn record(&self, _failure: FailureRecord) {}
}

pub fn null_telemetry() -> Arc<NullTelemetry> {
    Arc::new(NullTelemetry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wayfarer_kernel::telemetry::{FailureCategory, FailureSeverity};

    fn sample_record(event: &str) -> TelemetryRecord {
        record("r1", "u1", TelemetryLevel::Info, "test", event, "hello", json!({}))
    }

    #[tokio::test]
    async fn minimal_mode_writes_allow_listed_events_only() {
        let dir = tempfile::tempdir().unwrap();
        let controller =
            TelemetryController::new(dir.path(), "r1", "u1", TelemetryMode::Minimal, 2000).unwrap();
        controller.emit(sample_record("node_enter")).await;
        controller.emit(sample_record("irrelevant_chatter")).await;
        let content = std::fs::read_to_string(controller.trace_path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn minimal_mode_always_writes_error_events() {
        let dir = tempfile::tempdir().unwrap();
        let controller =
            TelemetryController::new(dir.path(), "r1", "u1", TelemetryMode::Minimal, 2000).unwrap();
        controller.emit(sample_record("tool_error")).await;
        let content = std::fs::read_to_string(controller.trace_path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn selective_mode_buffers_then_flushes_on_escalation() {
        let dir = tempfile::tempdir().unwrap();
        let controller =
            TelemetryController::new(dir.path(), "r1", "u1", TelemetryMode::Selective, 2000).unwrap();
        controller.emit(sample_record("node_enter")).await;
        controller.emit(sample_record("node_exit")).await;
        assert_eq!(std::fs::read_to_string(controller.trace_path()).unwrap().lines().count(), 0);

        controller.on_signals_changed(true).await;
        assert_eq!(std::fs::read_to_string(controller.trace_path()).unwrap().lines().count(), 2);

        controller.emit(sample_record("node_enter")).await;
        assert_eq!(std::fs::read_to_string(controller.trace_path()).unwrap().lines().count(), 3);
    }

    #[tokio::test]
    async fn sensitive_keys_are_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let controller =
            TelemetryController::new(dir.path(), "r1", "u1", TelemetryMode::Detailed, 2000).unwrap();
        let mut rec = sample_record("tool_call");
        rec.data = json!({"api_key": "sk-secret", "note": "fine"});
        controller.emit(rec).await;
        let content = std::fs::read_to_string(controller.trace_path()).unwrap();
        assert!(content.contains("[REDACTED]"));
        assert!(!content.contains("sk-secret"));
    }

    #[tokio::test]
    async fn failures_mirror_into_combined_log() {
        let dir = tempfile::tempdir().unwrap();
        let controller =
            TelemetryController::new(dir.path(), "r1", "u1", TelemetryMode::Detailed, 2000).unwrap();
        controller
            .record(FailureRecord {
                timestamp: Utc::now(),
                run_id: "r1".into(),
                category: FailureCategory::Tool,
                severity: FailureSeverity::Medium,
                node: "executor".into(),
                message: "tool failed".into(),
                details: json!({}),
            })
            .await;
        let combined = std::fs::read_to_string(
            dir.path().join("logs").join("combined_r1.jsonl"),
        )
        .unwrap();
        assert_eq!(combined.lines().count(), 1);
    }
}
