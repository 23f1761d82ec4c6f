//! Evaluate Step: the per-step checkpoint between the executor and the
//! next orchestrator pass. No dedicated spec subsection — this just
//! surfaces a `no_results` signal when a retrieval step came back empty,
//! then hands control straight back to the orchestrator.

use async_trait::async_trait;
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::{StepType, TripState};

pub struct EvaluateStepNode;

#[async_trait]
impl NodeFunc for EvaluateStepNode {
    async fn call(&self, state: &mut TripState, _ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        if let Some(step) = &state.current_step {
            if step.step_type == StepType::RetrieveContext && state.context_hits.is_empty() {
                state.signals.no_results = true;
            }
        }
        Ok(NodeOutcome::Goto("orchestrator"))
    }

    fn name(&self) -> &'static str {
        "evaluate_step"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;
    use wayfarer_kernel::state::PlanStep;

    #[tokio::test]
    async fn flags_no_results_after_empty_retrieval() {
        let node = EvaluateStepNode;
        let mut state = TripState::new("r1", "u1", "q");
        state.current_step = Some(PlanStep::new("s1", "Retrieve", StepType::RetrieveContext));
        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("orchestrator"));
        assert!(state.signals.no_results);
    }
}
