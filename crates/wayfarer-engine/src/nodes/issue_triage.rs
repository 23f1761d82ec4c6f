//! Issue Triage (spec.md §4.7): a deterministic skip-and-warn policy for
//! pending tool failures. Never asks the user — that's the "core-only
//! clarification" contract (only the intent parser and validator do).

use async_trait::async_trait;
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::{StepStatus, TripState};

pub struct IssueTriageNode;

#[async_trait]
impl NodeFunc for IssueTriageNode {
    async fn call(&self, state: &mut TripState, _ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        if let Some(issue) = state.pending_issue.take() {
            if let Some(step_id) = issue.step_id.clone() {
                if let Some(step) = state.find_step_mut(&step_id) {
                    // Overrides the normal terminal-state guard: triage
                    // deliberately resolves a blocked step to done.
                    step.status = StepStatus::Done;
                    step.notes = Some(format!("skipped: {}", issue.message));
                }
            }
            state
                .validation_warnings
                .push(format!("issue triaged and skipped: {}", issue.message));
        }
        state.needs_triage = false;
        Ok(NodeOutcome::Goto("orchestrator"))
    }

    fn name(&self) -> &'static str {
        "issue_triage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;
    use wayfarer_kernel::state::{Issue, IssueKind, IssueSeverity, PlanStep, StepType};

    #[tokio::test]
    async fn skips_blocked_step_and_clears_triage() {
        let node = IssueTriageNode;
        let mut state = TripState::new("r1", "u1", "q");
        let mut step = PlanStep::new("s1", "Search flights", StepType::ToolCall);
        step.status = StepStatus::Blocked;
        state.plan.push(step);
        let issue = Issue::new(IssueKind::ToolError, IssueSeverity::Major, "executor", "tool exhausted").with_step("s1");
        state.pending_issue = Some(issue.clone());
        state.issues.push(issue);
        state.needs_triage = true;

        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("orchestrator"));
        assert_eq!(state.plan[0].status, StepStatus::Done);
        assert!(!state.needs_triage);
        assert!(state.pending_issue.is_none());
        assert!(!state.validation_warnings.is_empty());
    }
}
