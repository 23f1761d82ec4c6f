//! Telemetry and failure-tracking traits (spec.md §4.11), grounded in the
//! teacher's `TelemetryEmitter`/`DebugEvent` shape
//! (`mofa-foundation/src/workflow/telemetry.rs`) but narrowed to this
//! system's JSONL event record and failure taxonomy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One business-meaningful telemetry record (spec.md §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub level: TelemetryLevel,
    pub module: String,
    pub event: String,
    pub message: String,
    pub run_id: String,
    pub user_id: String,
    pub component: String,
    pub graph_node: Option<String>,
    pub step_type: Option<String>,
    pub step_id: Option<String>,
    pub step_title: Option<String>,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Category of a tracked failure (spec.md §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    Llm,
    Tool,
    Memory,
    Network,
    Validation,
    State,
    Export,
    Evaluation,
    Unknown,
}

/// Severity of a tracked failure (spec.md §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A structured failure record, mirrored into the combined log
/// alongside normal telemetry (spec.md §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub category: FailureCategory,
    pub severity: FailureSeverity,
    pub node: String,
    pub message: String,
    pub details: Value,
}

/// Telemetry sink the graph runtime writes business events to. Concrete
/// tiered behaviour (minimal/selective/detailed, redaction, truncation,
/// signal-escalated buffering) lives in the engine's implementation;
/// this trait is the seam nodes and the runtime depend on, mirroring the
/// teacher's `TelemetryEmitter::emit`.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn emit(&self, record: TelemetryRecord);

    /// Re-evaluate escalation given the latest signal state. Selective
    /// mode flushes its buffer the first time any signal turns true
    /// (spec.md §4.11).
    async fn on_signals_changed(&self, any_signal_true: bool);
}

/// Failure tracker the runtime and nodes report structured failures to.
#[async_trait]
pub trait FailureSink: Send + Sync {
    async fn record(&self, failure: FailureRecord);
}

/// Per-run counters and timers nodes report to (SPEC_FULL.md §2.5),
/// e.g. `rag_retrievals`, `tool_calls`, `tool_latency_ms.<tool>`.
pub trait MetricsSink: Send + Sync {
    fn incr(&self, name: &'static str);
    fn record_ms(&self, name: String, millis: u64);
}
