//! Executor (spec.md §4.3): dispatches `current_step` by step type —
//! memory retrieval, tool invocation with retries, or synthesis.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use wayfarer_kernel::collaborators::{LlmProvider, LlmRequest, MemoryQuery, MemoryStore, ToolRegistry};
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::{Issue, IssueKind, IssueSeverity, StepStatus, StepType, ToolResult, TripState};

const MAJOR_TOOLS: &[&str] = &["flights_search_links", "hotels_search_links"];
const MAX_DAY_HEADINGS: usize = 21;

pub struct ExecutorNode {
    memory: Arc<dyn MemoryStore>,
    tools: Arc<dyn ToolRegistry>,
    llm: Arc<dyn LlmProvider>,
}

impl ExecutorNode {
    pub fn new(memory: Arc<dyn MemoryStore>, tools: Arc<dyn ToolRegistry>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { memory, tools, llm }
    }
}

fn day_heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^#+\s*Day\s*(\d+)\s*[:\-]?\s*(.*)$").unwrap())
}

#[async_trait]
impl NodeFunc for ExecutorNode {
    async fn call(&self, state: &mut TripState, ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        let Some(step) = state.current_step.clone() else {
            return Ok(NodeOutcome::Route);
        };

        match step.step_type {
            StepType::RetrieveContext => {
                let query = step
                    .tool_args
                    .as_ref()
                    .and_then(|a| a.get("query"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| state.user_query.clone());

                let start = std::time::Instant::now();
                let hits = self
                    .memory
                    .search(MemoryQuery { query, k: 5, include_session: true, include_user: true })
                    .await?;
                ctx.metrics.record_ms("rag_retrieval_latency_ms".into(), start.elapsed().as_millis() as u64);
                ctx.metrics.incr("rag_retrievals");
                ctx.metrics.incr("memory_retrieval_hits");

                state.context_hits = hits;
                mark_step(state, &step.id, StepStatus::Done);
            }

            StepType::ToolCall => {
                let Some(tool_name) = step.tool_name.clone() else {
                    mark_step(state, &step.id, StepStatus::Blocked);
                    return Ok(NodeOutcome::Route);
                };
                let args = step.tool_args.clone().unwrap_or(Value::Null);
                let max_attempts = 1 + ctx.config.max_tool_retries;
                let mut last_err = None;

                ctx.metrics.incr("tool_calls");
                for attempt in 0..max_attempts {
                    let start = std::time::Instant::now();
                    match self.tools.call(&tool_name, &args).await {
                        Ok(output) => {
                            ctx.metrics
                                .record_ms(format!("tool_latency_ms.{tool_name}"), start.elapsed().as_millis() as u64);
                            state.tool_results.push(ToolResult {
                                step_id: step.id.clone(),
                                tool_name: tool_name.clone(),
                                data: output.data,
                                summary: output.summary,
                                links: output.links,
                            });
                            mark_step(state, &step.id, StepStatus::Done);
                            last_err = None;
                            break;
                        }
                        Err(e) => {
                            ctx.metrics.incr("tool_errors");
                            if attempt + 1 < max_attempts {
                                ctx.metrics.incr("tool_retries");
                            }
                            last_err = Some(e.to_string());
                        }
                    }
                }

                if let Some(message) = last_err {
                    let severity = if MAJOR_TOOLS.contains(&tool_name.as_str()) {
                        IssueSeverity::Major
                    } else {
                        IssueSeverity::Minor
                    };
                    let issue = Issue::new(IssueKind::ToolError, severity, "executor", message)
                        .with_step(step.id.clone())
                        .with_tool(tool_name);
                    state.pending_issue = Some(issue.clone());
                    state.issues.push(issue);
                    state.needs_triage = true;
                    mark_step(state, &step.id, StepStatus::Blocked);
                }
            }

            StepType::Synthesize => {
                let context = synthesis_context(state);
                let answer = self
                    .llm
                    .invoke_text(LlmRequest {
                        system: "Write the final itinerary with the required sections and the disclaimer.".into(),
                        user: state.user_query.clone(),
                        context: Some(context.to_string()),
                        tags: vec!["synthesize".into()],
                    })
                    .await?;

                state.itinerary_day_titles = day_heading_pattern()
                    .captures_iter(&answer)
                    .take(MAX_DAY_HEADINGS)
                    .map(|c| c.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default())
                    .collect();
                state.final_answer = Some(answer);
                mark_step(state, &step.id, StepStatus::Done);
            }
        }

        Ok(NodeOutcome::Route)
    }

    fn name(&self) -> &'static str {
        "executor"
    }
}

/// Conditional router for the edge out of `executor` (spec.md §4.1):
/// `issue_triage` when the step raised a pending issue, else `evaluate_step`.
pub fn route_after_executor(state: &TripState) -> &'static str {
    if state.needs_triage {
        "issue_triage"
    } else {
        "evaluate_step"
    }
}

fn mark_step(state: &mut TripState, step_id: &str, status: StepStatus) {
    if let Some(step) = state.find_step_mut(step_id) {
        let _ = step.transition(status);
    }
    if let Some(current) = state.current_step.as_mut() {
        if current.id == step_id {
            let _ = current.transition(status);
        }
    }
}

fn synthesis_context(state: &TripState) -> Value {
    let top_hits: Vec<&str> = state.context_hits.iter().take(5).map(|h| h.text.as_str()).collect();
    let top_results: Vec<Value> = state
        .tool_results
        .iter()
        .take(12)
        .map(|r| {
            serde_json::json!({
                "tool_name": r.tool_name,
                "summary": r.summary,
                "links": r.links.iter().take(5).collect::<Vec<_>>(),
            })
        })
        .collect();

    serde_json::json!({
        "origin": state.constraints.origin,
        "destinations": state.constraints.destinations,
        "start_date": state.constraints.start_date.map(|d| d.to_string()),
        "end_date": state.constraints.end_date.map(|d| d.to_string()),
        "interests": state.constraints.interests,
        "context_hits": top_hits,
        "tool_results": top_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryMemoryStore, LinkBuilderTools, TemplateLlm};
    use crate::test_support::test_ctx;
    use wayfarer_kernel::collaborators::{ToolOutput, ToolRegistry};
    use wayfarer_kernel::error::KernelError;
    use wayfarer_kernel::state::PlanStep;

    fn state_with_step(step: wayfarer_kernel::state::PlanStep) -> TripState {
        let mut state = TripState::new("r1", "u1", "Trip to Tokyo");
        state.constraints.destinations = vec!["Tokyo".into()];
        state.current_step_index = 0;
        state.current_step = Some(step.clone());
        state.plan.push(step);
        state
    }

    #[tokio::test]
    async fn tool_call_success_records_result_and_marks_done() {
        let node = ExecutorNode::new(
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(LinkBuilderTools),
            Arc::new(TemplateLlm),
        );
        let step = PlanStep::new("s1", "Search flights", StepType::ToolCall)
            .with_tool("flights_search_links", serde_json::json!({"origin": "SFO", "destination": "Tokyo"}));
        let mut state = state_with_step(step);
        node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(state.tool_results.len(), 1);
        assert_eq!(state.plan[0].status, StepStatus::Done);
        assert_eq!(route_after_executor(&state), "evaluate_step");
    }

    struct AlwaysFailTools;
    #[async_trait]
    impl ToolRegistry for AlwaysFailTools {
        fn has_tool(&self, _name: &str) -> bool {
            true
        }
        async fn call(&self, _name: &str, _args: &Value) -> KernelResult<ToolOutput> {
            Err(KernelError::Collaborator("simulated failure".into()))
        }
    }

    #[tokio::test]
    async fn tool_exhaustion_raises_issue_and_triages() {
        let node = ExecutorNode::new(Arc::new(InMemoryMemoryStore::new()), Arc::new(AlwaysFailTools), Arc::new(TemplateLlm));
        let step = PlanStep::new("s1", "Search flights", StepType::ToolCall)
            .with_tool("flights_search_links", serde_json::json!({}));
        let mut state = state_with_step(step);
        node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(state.plan[0].status, StepStatus::Blocked);
        assert!(state.needs_triage);
        assert_eq!(route_after_executor(&state), "issue_triage");
        assert_eq!(state.issues[0].severity, wayfarer_kernel::state::IssueSeverity::Major);
    }

    #[tokio::test]
    async fn synthesize_extracts_day_titles() {
        let node = ExecutorNode::new(
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(LinkBuilderTools),
            Arc::new(TemplateLlm),
        );
        let mut state = state_with_step(PlanStep::new("s1", "Write itinerary", StepType::Synthesize));
        state.constraints.start_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        state.constraints.end_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 2).unwrap());
        node.call(&mut state, &test_ctx()).await.unwrap();
        assert!(state.final_answer.is_some());
        assert!(!state.itinerary_day_titles.is_empty());
    }
}
