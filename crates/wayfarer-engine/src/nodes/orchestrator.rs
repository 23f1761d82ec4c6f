//! Orchestrator (spec.md §4.2): the bounded loop that hands the
//! executor its next pending step, or decides the run is finished.

use async_trait::async_trait;
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::{TerminationReason, TripState};

pub struct OrchestratorNode;

#[async_trait]
impl NodeFunc for OrchestratorNode {
    async fn call(&self, state: &mut TripState, ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        state.loop_iterations += 1;

        let max_iters = ctx.config.max_iters;
        if state.loop_iterations as f64 >= max_iters as f64 * 0.8 {
            state.signals.timeout_risk = true;
        }

        if state.loop_iterations > max_iters {
            state.current_step = None;
            state.current_step_index = state.plan.len();
            state.termination_reason = Some(TerminationReason::MaxIters);
            return Ok(NodeOutcome::Route);
        }

        match state.first_pending_step_index() {
            Some(index) => {
                state.current_step_index = index;
                state.current_step = Some(state.plan[index].clone());
            }
            None => {
                state.termination_reason = Some(TerminationReason::Finalized);
            }
        }

        Ok(NodeOutcome::Route)
    }

    fn name(&self) -> &'static str {
        "orchestrator"
    }
}

/// Conditional router for the edge out of `orchestrator` (spec.md §4.1):
/// `responder` once the run is finalized or out of iterations, else the
/// `executor` for another step.
pub fn route_after_orchestrator(state: &TripState) -> &'static str {
    match state.termination_reason {
        Some(TerminationReason::Finalized) | Some(TerminationReason::MaxIters) => "responder",
        _ => "executor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;
    use wayfarer_kernel::state::{PlanStep, StepStatus, StepType};

    #[tokio::test]
    async fn picks_first_pending_step() {
        let node = OrchestratorNode;
        let mut state = TripState::new("r1", "u1", "q");
        state.plan.push(PlanStep::new("a", "A", StepType::Synthesize));
        state.plan[0].status = StepStatus::Done;
        state.plan.push(PlanStep::new("b", "B", StepType::Synthesize));
        node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(state.current_step_index, 1);
        assert_eq!(route_after_orchestrator(&state), "executor");
    }

    #[tokio::test]
    async fn finalizes_when_all_steps_done() {
        let node = OrchestratorNode;
        let mut state = TripState::new("r1", "u1", "q");
        let mut step = PlanStep::new("a", "A", StepType::Synthesize);
        step.status = StepStatus::Done;
        state.plan.push(step);
        node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(state.termination_reason, Some(TerminationReason::Finalized));
        assert_eq!(route_after_orchestrator(&state), "responder");
    }

    #[tokio::test]
    async fn sets_timeout_risk_near_max_iters() {
        let node = OrchestratorNode;
        let mut state = TripState::new("r1", "u1", "q");
        state.plan.push(PlanStep::new("a", "A", StepType::Synthesize));
        let mut ctx = test_ctx();
        ctx.config.max_iters = 5;
        for _ in 0..4 {
            node.call(&mut state, &ctx).await.unwrap();
        }
        assert!(state.signals.timeout_risk);
    }

    #[tokio::test]
    async fn stops_after_max_iters_exceeded() {
        let node = OrchestratorNode;
        let mut state = TripState::new("r1", "u1", "q");
        state.plan.push(PlanStep::new("a", "A", StepType::Synthesize));
        let mut ctx = test_ctx();
        ctx.config.max_iters = 2;
        for _ in 0..3 {
            node.call(&mut state, &ctx).await.unwrap();
        }
        assert_eq!(state.termination_reason, Some(TerminationReason::MaxIters));
        assert_eq!(state.current_step_index, state.plan.len());
        assert!(state.current_step.is_none());
    }
}
