//! Evaluate Final (spec.md §4.10): runs the evaluation gate against the
//! responder's output and the exported ICS, storing the result.

use async_trait::async_trait;
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::TripState;

use crate::eval::{evaluate, EvalInput};

pub struct EvaluateFinalNode;

fn missing_tokens(state: &TripState) -> Vec<&'static str> {
    let c = &state.constraints;
    let mut missing = Vec::new();
    if c.destinations.is_empty() {
        missing.push("destination");
    }
    if c.start_date.is_none() {
        missing.push("start date");
    }
    if c.end_date.is_none() {
        missing.push("end date");
    }
    if c.origin.is_none() {
        missing.push("origin");
    }
    if c.budget_usd.is_none() {
        missing.push("budget");
    }
    if c.travelers.is_none() {
        missing.push("travelers");
    }
    missing
}

#[async_trait]
impl NodeFunc for EvaluateFinalNode {
    async fn call(&self, state: &mut TripState, ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        let answer = state.final_answer.clone().unwrap_or_default();
        let missing = missing_tokens(state);

        let input = EvalInput {
            answer: &answer,
            missing_tokens: &missing,
            destinations: &state.constraints.destinations,
            start_date_present: state.constraints.start_date.is_some(),
            end_date_present: state.constraints.end_date.is_some(),
            interests_count: state.constraints.interests.len(),
            ics_event_count: state.ics_event_count,
            ics_valid: state.ics_path.is_some(),
        };

        state.evaluation = Some(evaluate(&input, ctx.config.eval_threshold));
        Ok(NodeOutcome::Goto("memory_writer"))
    }

    fn name(&self) -> &'static str {
        "evaluate_final"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;
    use wayfarer_kernel::state::EvalStatus;

    #[tokio::test]
    async fn stores_evaluation_result() {
        let node = EvaluateFinalNode;
        let mut state = TripState::new("r1", "u1", "q");
        state.constraints.destinations = vec!["Tokyo".into()];
        state.constraints.origin = Some("SFO".into());
        state.constraints.start_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        state.constraints.end_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 5).unwrap());
        state.constraints.budget_usd = Some(2000.0);
        state.constraints.travelers = Some(2);
        state.ics_path = Some("itinerary.ics".into());
        state.ics_event_count = 5;
        state.final_answer = Some(
            "## Summary\nTrip to Tokyo.\n\n## Flights\nhttps://x\n\n## Lodging\nhttps://y\n\n\
             ## Day 1: Arrival\nMorning: explore.\n- see sights\n\n## Transit\ntravel time and distance.\n\n\
             ## Weather\nMild.\n\n## Budget\nVaries by season.\n\n## Calendar\nAttached.\n\n\
             ## Assumptions\nNone.\n\nverify with official sources before booking.\n"
                .into(),
        );

        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("memory_writer"));
        let eval = state.evaluation.unwrap();
        assert_eq!(eval.overall_status, EvalStatus::Good);
    }
}
