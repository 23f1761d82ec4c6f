//! `TripState`: the single mutable record threaded through every node
//! (spec.md §3). Deliberately a concrete struct rather than a generic
//! `GraphState` map — conditional routing is expressed as pure
//! `(&TripState) -> &'static str` functions registered alongside nodes
//! (spec.md §9 Design Notes), instead of the teacher's keyed-reducer model.

use serde::{Deserialize, Serialize};

use super::types::{
    Constraints, ContextHit, EvaluationResult, GroundedPlaces, Issue, PendingDisambiguation,
    PlanStep, Signals, StepStatus, TerminationReason, ToolResult,
};

/// The trip-planning run state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripState {
    pub run_id: String,
    pub user_id: String,
    pub user_query: String,

    pub constraints: Constraints,
    pub constraint_overrides: Option<Constraints>,

    pub context_hits: Vec<ContextHit>,
    pub grounded_places: GroundedPlaces,

    pub plan: Vec<PlanStep>,
    pub current_step: Option<PlanStep>,
    pub current_step_index: usize,
    pub loop_iterations: u32,

    pub tool_results: Vec<ToolResult>,

    pub issues: Vec<Issue>,
    pub pending_issue: Option<Issue>,
    pub needs_triage: bool,

    pub validation_warnings: Vec<String>,
    pub resolved_conflicts: Vec<String>,
    pub pending_disambiguation: Option<PendingDisambiguation>,
    pub pending_fixup: Option<String>,
    pub pending_conflict: Option<String>,

    pub needs_user_input: bool,
    pub clarifying_questions: Vec<String>,

    pub final_answer: Option<String>,
    pub itinerary_day_titles: Vec<String>,
    pub ics_path: Option<String>,
    pub ics_event_count: usize,

    pub evaluation: Option<EvaluationResult>,
    pub termination_reason: Option<TerminationReason>,
    pub error: Option<String>,

    pub signals: Signals,
}

impl TripState {
    pub fn new(run_id: impl Into<String>, user_id: impl Into<String>, user_query: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            user_id: user_id.into(),
            user_query: user_query.into(),
            constraints: Constraints::default(),
            constraint_overrides: None,
            context_hits: Vec::new(),
            grounded_places: GroundedPlaces::default(),
            plan: Vec::new(),
            current_step: None,
            current_step_index: 0,
            loop_iterations: 0,
            tool_results: Vec::new(),
            issues: Vec::new(),
            pending_issue: None,
            needs_triage: false,
            validation_warnings: Vec::new(),
            resolved_conflicts: Vec::new(),
            pending_disambiguation: None,
            pending_fixup: None,
            pending_conflict: None,
            needs_user_input: false,
            clarifying_questions: Vec::new(),
            final_answer: None,
            itinerary_day_titles: Vec::new(),
            ics_path: None,
            ics_event_count: 0,
            evaluation: None,
            termination_reason: None,
            error: None,
            signals: Signals::default(),
        }
    }

    /// Look up a plan step by id.
    pub fn find_step(&self, id: &str) -> Option<&PlanStep> {
        self.plan.iter().find(|s| s.id == id)
    }

    pub fn find_step_mut(&mut self, id: &str) -> Option<&mut PlanStep> {
        self.plan.iter_mut().find(|s| s.id == id)
    }

    /// First pending step by array order (stable tie-break, per spec.md §4.2).
    pub fn first_pending_step_index(&self) -> Option<usize> {
        self.plan.iter().position(|s| s.status == StepStatus::Pending)
    }

    pub fn ask_user(&mut self, questions: Vec<String>, reason: TerminationReason) {
        self.needs_user_input = true;
        self.clarifying_questions = questions;
        self.termination_reason = Some(reason);
    }

    /// Validate the invariants listed in spec.md §3. Used by tests and
    /// debug assertions; not invoked on the hot path.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut ids = std::collections::HashSet::new();
        for step in &self.plan {
            if !ids.insert(step.id.as_str()) {
                return Err(format!("duplicate plan step id: {}", step.id));
            }
        }
        if self.current_step_index > self.plan.len() {
            return Err(format!(
                "current_step_index {} out of range [0, {}]",
                self.current_step_index,
                self.plan.len()
            ));
        }
        if let Some(current) = &self.current_step {
            if let Some(at_index) = self.plan.get(self.current_step_index) {
                if current.id != at_index.id {
                    return Err(format!(
                        "current_step.id '{}' does not match plan[{}].id '{}'",
                        current.id, self.current_step_index, at_index.id
                    ));
                }
            }
        }
        for result in &self.tool_results {
            if self.find_step(&result.step_id).is_none() {
                return Err(format!(
                    "tool_results references unknown step id: {}",
                    result.step_id
                ));
            }
        }
        if self.needs_user_input {
            if self.termination_reason != Some(TerminationReason::AskedUser) {
                return Err("needs_user_input=true requires termination_reason=asked_user".into());
            }
            if self.clarifying_questions.is_empty() {
                return Err("needs_user_input=true requires non-empty clarifying_questions".into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::types::StepType;

    #[test]
    fn duplicate_step_ids_violate_invariant() {
        let mut state = TripState::new("r1", "u1", "plan a trip");
        state.plan.push(PlanStep::new("s1", "a", StepType::ToolCall));
        state.plan.push(PlanStep::new("s1", "b", StepType::ToolCall));
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn tool_result_must_reference_known_step() {
        let mut state = TripState::new("r1", "u1", "plan a trip");
        state.plan.push(PlanStep::new("s1", "a", StepType::ToolCall));
        state.tool_results.push(ToolResult {
            step_id: "missing".into(),
            tool_name: "flights_search_links".into(),
            data: serde_json::json!({}),
            summary: String::new(),
            links: Vec::new(),
        });
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn first_pending_step_is_stable() {
        let mut state = TripState::new("r1", "u1", "q");
        let mut a = PlanStep::new("a", "a", StepType::ToolCall);
        a.transition(StepStatus::Done).unwrap();
        state.plan.push(a);
        state.plan.push(PlanStep::new("b", "b", StepType::ToolCall));
        state.plan.push(PlanStep::new("c", "c", StepType::ToolCall));
        assert_eq!(state.first_pending_step_index(), Some(1));
    }
}
