//! Brain Planner (spec.md §4.6): turns constraints into a step plan via
//! the LLM stand-in, with allow-list filtering, multi-destination
//! expansion, and a deterministic fallback for empty/invalid plans.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use wayfarer_kernel::collaborators::{LlmProvider, LlmRequest};
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::{Issue, IssueKind, IssueSeverity, PlanStep, StepType, TripState};

const MAX_PLAN_ITEMS: usize = 12;
const ALLOWED_TOOLS: &[&str] = &[
    "flights_search_links",
    "hotels_search_links",
    "things_to_do_links",
    "weather_summary",
    "distance_and_time",
];
const MULTI_DEST_TOOLS: &[&str] = &["flights_search_links", "hotels_search_links"];

pub struct BrainPlannerNode {
    llm: Arc<dyn LlmProvider>,
}

impl BrainPlannerNode {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

fn step_type_from_str(s: &str) -> Option<StepType> {
    match s.to_uppercase().as_str() {
        "RETRIEVE_CONTEXT" => Some(StepType::RetrieveContext),
        "TOOL_CALL" => Some(StepType::ToolCall),
        "SYNTHESIZE" => Some(StepType::Synthesize),
        _ => None,
    }
}

/// Parse the LLM's `{plan: [...]}` JSON into steps, dropping anything
/// that fails validation rather than erroring the whole plan.
fn steps_from_json(value: &Value) -> Vec<PlanStep> {
    let Some(items) = value.get("plan").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut steps = Vec::new();
    for (i, item) in items.iter().take(MAX_PLAN_ITEMS).enumerate() {
        let Some(step_type_str) = item.get("step_type").and_then(Value::as_str) else {
            continue;
        };
        let Some(step_type) = step_type_from_str(step_type_str) else {
            continue;
        };
        let title = item
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Untitled step")
            .to_string();

        if step_type == StepType::ToolCall {
            let Some(tool_name) = item.get("tool_name").and_then(Value::as_str) else {
                continue;
            };
            if !ALLOWED_TOOLS.contains(&tool_name) {
                continue;
            }
            let args = item.get("tool_args").cloned().unwrap_or(json!({}));
            steps.push(PlanStep::new(format!("step-{i}"), title, step_type).with_tool(tool_name, args));
        } else {
            steps.push(PlanStep::new(format!("step-{i}"), title, step_type));
        }
    }
    steps
}

/// If `constraints.destinations` has N>1 and fewer than N unique
/// `destination` args appear for a multi-dest tool, replace the first
/// matching step with N per-destination copies (spec.md §4.6). Tracks
/// expansion per tool name so `flights_search_links` and
/// `hotels_search_links` each get their own first-step expansion
/// instead of sharing a single flag.
fn expand_multi_destination(steps: Vec<PlanStep>, destinations: &[String]) -> Vec<PlanStep> {
    if destinations.len() <= 1 {
        return steps;
    }

    let mut expanded = Vec::with_capacity(steps.len());
    let mut expanded_tools: std::collections::HashSet<String> = std::collections::HashSet::new();
    for step in steps {
        let tool = step.tool_name.as_deref().filter(|t| MULTI_DEST_TOOLS.contains(t));
        if let Some(tool_name) = tool {
            if !expanded_tools.contains(tool_name) {
                let existing: std::collections::HashSet<&str> = step
                    .tool_args
                    .as_ref()
                    .and_then(|a| a.get("destination"))
                    .and_then(Value::as_str)
                    .into_iter()
                    .collect();
                if existing.len() < destinations.len() {
                    let tool_name = tool_name.to_string();
                    let base_args = step.tool_args.clone().unwrap_or(json!({}));
                    for (j, dest) in destinations.iter().enumerate() {
                        let mut args = base_args.clone();
                        args["destination"] = json!(dest);
                        expanded.push(
                            PlanStep::new(format!("{}-{j}", step.id), format!("{} ({})", step.title, dest), StepType::ToolCall)
                                .with_tool(tool_name.clone(), args),
                        );
                    }
                    expanded_tools.insert(tool_name);
                    continue;
                }
            }
        }
        expanded.push(step);
    }
    expanded
}

/// Deterministic fallback planner for the primary destination
/// (spec.md §4.6).
fn fallback_plan(state: &TripState) -> Vec<PlanStep> {
    let dest = state.constraints.primary_destination().unwrap_or("your destination").to_string();
    let origin = state.constraints.origin.clone().unwrap_or_default();
    let start = state.constraints.start_date.map(|d| d.to_string()).unwrap_or_default();
    let end = state.constraints.end_date.map(|d| d.to_string()).unwrap_or_default();

    vec![
        PlanStep::new("fallback-0", "Search flights", StepType::ToolCall).with_tool(
            "flights_search_links",
            json!({"origin": origin, "destination": dest, "start_date": start, "end_date": end}),
        ),
        PlanStep::new("fallback-1", "Search hotels", StepType::ToolCall).with_tool(
            "hotels_search_links",
            json!({"destination": dest, "start_date": start, "end_date": end}),
        ),
        PlanStep::new("fallback-2", "Find activities", StepType::ToolCall)
            .with_tool("things_to_do_links", json!({"destination": dest})),
        PlanStep::new("fallback-3", "Check weather", StepType::ToolCall)
            .with_tool("weather_summary", json!({"destination": dest})),
        PlanStep::new("fallback-4", "Write the itinerary", StepType::Synthesize),
    ]
}

#[async_trait]
impl NodeFunc for BrainPlannerNode {
    async fn call(&self, state: &mut TripState, _ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        let context = json!({
            "origin": state.constraints.origin,
            "destinations": state.constraints.destinations,
            "start_date": state.constraints.start_date.map(|d| d.to_string()),
            "end_date": state.constraints.end_date.map(|d| d.to_string()),
            "interests": state.constraints.interests,
        });

        let raw = self
            .llm
            .invoke_text(LlmRequest {
                system: "Produce a JSON travel plan of steps.".into(),
                user: state.user_query.clone(),
                context: Some(context.to_string()),
                tags: vec!["brain_planner".into()],
            })
            .await?;

        let parsed: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
        let mut steps = steps_from_json(&parsed);

        if steps.is_empty() {
            state.issues.push(Issue::new(
                IssueKind::PlanningError,
                IssueSeverity::Minor,
                "brain_planner",
                "LLM plan was empty or invalid; using deterministic fallback plan",
            ));
            state.signals.planning_error = true;
            steps = fallback_plan(state);
        } else {
            steps = expand_multi_destination(steps, &state.constraints.destinations);
        }

        state.plan = steps;
        Ok(NodeOutcome::Goto("orchestrator"))
    }

    fn name(&self) -> &'static str {
        "brain_planner"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::TemplateLlm;
    use crate::test_support::test_ctx;

    fn state_with(destinations: Vec<&str>) -> TripState {
        let mut state = TripState::new("r1", "u1", "Trip query");
        state.constraints.origin = Some("SFO".into());
        state.constraints.destinations = destinations.into_iter().map(String::from).collect();
        state.constraints.start_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        state.constraints.end_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 5).unwrap());
        state
    }

    #[tokio::test]
    async fn builds_plan_from_llm_json() {
        let node = BrainPlannerNode::new(Arc::new(TemplateLlm));
        let mut state = state_with(vec!["Tokyo"]);
        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("orchestrator"));
        assert!(!state.plan.is_empty());
        assert!(state.plan.iter().any(|s| s.step_type == StepType::Synthesize));
    }

    #[tokio::test]
    async fn expands_multi_destination_flight_step() {
        let node = BrainPlannerNode::new(Arc::new(TemplateLlm));
        let mut state = state_with(vec!["Tokyo", "Lima"]);
        node.call(&mut state, &test_ctx()).await.unwrap();
        let flight_steps: Vec<_> = state
            .plan
            .iter()
            .filter(|s| s.tool_name.as_deref() == Some("flights_search_links"))
            .collect();
        assert_eq!(flight_steps.len(), 2);
        let hotel_steps: Vec<_> = state
            .plan
            .iter()
            .filter(|s| s.tool_name.as_deref() == Some("hotels_search_links"))
            .collect();
        assert_eq!(hotel_steps.len(), 2);
    }

    #[tokio::test]
    async fn empty_plan_falls_back_to_deterministic_planner() {
        struct EmptyLlm;
        #[async_trait]
        impl LlmProvider for EmptyLlm {
            fn name(&self) -> &str {
                "empty"
            }
            async fn invoke_text(&self, _req: LlmRequest) -> KernelResult<String> {
                Ok("not json at all".into())
            }
        }

        let node = BrainPlannerNode::new(Arc::new(EmptyLlm));
        let mut state = state_with(vec!["Tokyo"]);
        node.call(&mut state, &test_ctx()).await.unwrap();
        assert!(state.signals.planning_error);
        assert_eq!(state.plan.len(), 5);
        assert!(state.issues.iter().any(|i| i.kind == IssueKind::PlanningError));
    }
}
