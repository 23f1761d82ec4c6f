//! Core data types for the trip-planning state model (spec.md §3).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Desired pace of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Relaxed,
    Balanced,
    Packed,
}

/// Trip constraints, either parsed from the user's query or supplied as
/// an override (in which case the same shape is reused, per spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    pub origin: Option<String>,
    #[serde(default)]
    pub destinations: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget_usd: Option<f64>,
    pub travelers: Option<u32>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub pace: Option<Pace>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Constraints {
    /// Names of the four core fields the validator treats as mandatory,
    /// in the order the intent parser and responder enumerate them.
    pub fn missing_core_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.destinations.is_empty() {
            missing.push("destination");
        }
        if self.start_date.is_none() {
            missing.push("start date");
        }
        if self.end_date.is_none() {
            missing.push("end date");
        }
        if self.origin.is_none() {
            missing.push("origin");
        }
        missing
    }

    pub fn primary_destination(&self) -> Option<&str> {
        self.destinations.first().map(|s| s.as_str())
    }
}

/// A single retrieved memory hit, normalized to a common shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextHit {
    pub id: String,
    pub text: String,
    pub metadata: HashMap<String, Value>,
    pub distance: f32,
}

/// A labelled hyperlink, as returned by tool collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub url: String,
}

/// Kind of plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    RetrieveContext,
    ToolCall,
    Synthesize,
}

/// Lifecycle status of a plan step. Transitions are monotonic:
/// `Pending -> {Done, Blocked}`, never out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Done,
    Blocked,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Blocked)
    }
}

/// An atomic unit of work in the agent's plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub title: String,
    pub step_type: StepType,
    pub tool_name: Option<String>,
    pub tool_args: Option<Value>,
    pub status: StepStatus,
    pub notes: Option<String>,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, title: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            step_type,
            tool_name: None,
            tool_args: None,
            status: StepStatus::Pending,
            notes: None,
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>, tool_args: Value) -> Self {
        self.tool_name = Some(tool_name.into());
        self.tool_args = Some(tool_args);
        self
    }

    /// Attempt a status transition, rejecting any move out of a terminal state.
    pub fn transition(&mut self, next: StepStatus) -> Result<(), String> {
        if self.status.is_terminal() && self.status != next {
            return Err(format!(
                "step '{}' cannot transition from terminal status {:?} to {:?}",
                self.id, self.status, next
            ));
        }
        self.status = next;
        Ok(())
    }
}

/// Recorded output of a tool or retrieval step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub step_id: String,
    pub tool_name: String,
    pub data: Value,
    pub summary: String,
    pub links: Vec<Link>,
}

/// Kind of issue raised during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ValidationError,
    Conflict,
    ToolError,
    PlanningError,
    EvaluationFail,
}

/// Severity of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Blocking,
    Major,
    Minor,
}

/// A structured problem raised by a node, appended to `State::issues`
/// append-only (never removed or mutated after creation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub node: String,
    pub step_id: Option<String>,
    pub tool_name: Option<String>,
    pub message: String,
    pub suggested_actions: Vec<String>,
    pub details: Value,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        severity: IssueSeverity,
        node: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            node: node.into(),
            step_id: None,
            tool_name: None,
            message: message.into(),
            suggested_actions: Vec::new(),
            details: Value::Null,
        }
    }

    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }
}

/// A geocoded candidate place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeCandidate {
    pub name: String,
    pub country: String,
    pub admin1: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

/// A place resolved by the validator, either via IATA bypass or geocoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedPlace {
    pub name: String,
    pub country: Option<String>,
    pub admin1: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    /// Set when the "country-name self-match" autopick heuristic fired
    /// (spec.md §9 Open Question), so downstream tests can assert it.
    pub autopicked_reason: Option<String>,
}

impl GroundedPlace {
    pub fn iata(code: &str) -> Self {
        Self {
            name: code.to_uppercase(),
            country: None,
            admin1: None,
            latitude: None,
            longitude: None,
            timezone: None,
            autopicked_reason: None,
        }
    }

    pub fn best_effort(raw: &str) -> Self {
        Self {
            name: raw.to_string(),
            country: None,
            admin1: None,
            latitude: None,
            longitude: None,
            timezone: None,
            autopicked_reason: None,
        }
    }
}

/// Geocoded origin and destinations, stored on `State::grounded_places`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundedPlaces {
    pub origin: Option<GroundedPlace>,
    pub destinations: Vec<GroundedPlace>,
}

/// An ambiguous-place resolution pending the user's choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingDisambiguation {
    pub field: String,
    pub raw_value: String,
    pub options: Vec<String>,
    pub candidates: Vec<GeocodeCandidate>,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Finalized,
    MaxIters,
    AskedUser,
    Error,
}

/// Named boolean flags the telemetry controller watches to decide
/// whether to escalate log fidelity (spec.md §4.11, Glossary "Signal").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signals {
    pub tool_error: bool,
    pub bad_retrieval: bool,
    pub no_results: bool,
    pub timeout_risk: bool,
    pub planning_error: bool,
    pub memory_unavailable: bool,
    pub node_error: bool,
}

impl Signals {
    pub fn any(&self) -> bool {
        self.tool_error
            || self.bad_retrieval
            || self.no_results
            || self.timeout_risk
            || self.planning_error
            || self.memory_unavailable
            || self.node_error
    }

    /// Present the flags as a name->value map, for telemetry payloads.
    pub fn as_map(&self) -> HashMap<&'static str, bool> {
        HashMap::from([
            ("tool_error", self.tool_error),
            ("bad_retrieval", self.bad_retrieval),
            ("no_results", self.no_results),
            ("timeout_risk", self.timeout_risk),
            ("planning_error", self.planning_error),
            ("memory_unavailable", self.memory_unavailable),
            ("node_error", self.node_error),
        ])
    }
}

/// Hard gate results (spec.md §4.10).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardGates {
    pub constraint_completeness: bool,
    pub no_fabricated_real_time_facts: bool,
    pub link_validity_format: bool,
    pub calendar_export_correctness: bool,
    pub safety_clarity_disclaimer: bool,
}

impl HardGates {
    pub fn all_pass(&self) -> bool {
        self.constraint_completeness
            && self.no_fabricated_real_time_facts
            && self.link_validity_format
            && self.calendar_export_correctness
            && self.safety_clarity_disclaimer
    }
}

/// 0-5 rubric scores (spec.md §4.10).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rubric {
    pub relevance: f64,
    pub feasibility: f64,
    pub completeness: f64,
    pub specificity: f64,
    pub coherence: f64,
}

impl Rubric {
    pub fn average(&self) -> f64 {
        (self.relevance + self.feasibility + self.completeness + self.specificity + self.coherence)
            / 5.0
    }
}

/// Overall evaluation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
    Good,
    NeedsWork,
    Failed,
}

/// Result of the final evaluation gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub hard_gates: HardGates,
    pub rubric: Rubric,
    pub overall_status: EvalStatus,
}
