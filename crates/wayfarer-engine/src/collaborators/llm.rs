//! Default in-process LLM stand-in: a deterministic template engine, not
//! a live model call (SPEC_FULL.md §4 Non-goals). Nodes pass structured
//! data through `LlmRequest::context` (a JSON blob) and tag the call
//! with what kind of response they expect via `LlmRequest::tags`; this
//! collaborator renders a plausible response from that data so the rest
//! of the pipeline (JSON parsing, heading extraction, disclaimer
//! insertion) runs against real, if templated, text end to end.

use async_trait::async_trait;
use serde_json::{json, Value};
use wayfarer_kernel::collaborators::{LlmProvider, LlmRequest};
use wayfarer_kernel::error::KernelResult;

pub struct TemplateLlm;

impl TemplateLlm {
    fn brain_plan(context: &Value) -> String {
        let destinations: Vec<String> = context
            .get("destinations")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let primary = destinations.first().cloned().unwrap_or_else(|| "your destination".into());

        // Intentionally returns only one flights step even when there are
        // multiple destinations — this is what exercises the brain
        // planner's multi-destination expansion logic downstream.
        let plan = json!({
            "plan": [
                {"title": "Search flights", "step_type": "TOOL_CALL", "tool_name": "flights_search_links", "tool_args": {"origin": context.get("origin").cloned().unwrap_or(Value::Null), "destination": primary, "start_date": context.get("start_date").cloned().unwrap_or(Value::Null), "end_date": context.get("end_date").cloned().unwrap_or(Value::Null)}},
                {"title": "Search hotels", "step_type": "TOOL_CALL", "tool_name": "hotels_search_links", "tool_args": {"destination": primary, "start_date": context.get("start_date").cloned().unwrap_or(Value::Null), "end_date": context.get("end_date").cloned().unwrap_or(Value::Null)}},
                {"title": "Find activities", "step_type": "TOOL_CALL", "tool_name": "things_to_do_links", "tool_args": {"destination": primary}},
                {"title": "Check weather", "step_type": "TOOL_CALL", "tool_name": "weather_summary", "tool_args": {"destination": primary}},
                {"title": "Retrieve traveler context", "step_type": "RETRIEVE_CONTEXT", "tool_args": {}},
                {"title": "Write the itinerary", "step_type": "SYNTHESIZE"}
            ]
        });
        plan.to_string()
    }

    fn synthesize(context: &Value) -> String {
        let destination = context
            .get("destinations")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .and_then(Value::as_str)
            .unwrap_or("your destination");
        let start = context.get("start_date").and_then(Value::as_str).unwrap_or("");
        let end = context.get("end_date").and_then(Value::as_str).unwrap_or("");
        let interests: Vec<String> = context
            .get("interests")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let day_count = day_span(start, end).max(1);
        let mut days = String::new();
        for i in 1..=day_count {
            days.push_str(&format!(
                "## Day {i}: Exploring {destination}\nMorning: local sights. Afternoon: {interest}. Evening: dinner near your lodging.\n\n",
                interest = interests.first().cloned().unwrap_or_else(|| "free time".into())
            ));
        }

        format!(
            "## Summary\nA trip to {destination} from {start} to {end}.\n\n\
             ## Flights\nSee flight options below.\n\n\
             ## Lodging\nSee hotel options below.\n\n\
             {days}\
             ## Transit\nEstimated travel time and distance between stops.\n\n\
             ## Weather\nTypical seasonal conditions for {destination}.\n\n\
             ## Budget\nCosts vary by season and provider; verify with official sources before booking.\n\n\
             ## Calendar\nAn .ics file with one event per day has been attached.\n\n\
             ## Assumptions\nNone.\n\n\
             This itinerary is a planning aid only — verify with official sources before booking.\n"
        )
    }
}

fn day_span(start: &str, end: &str) -> i64 {
    use chrono::NaiveDate;
    match (
        NaiveDate::parse_from_str(start, "%Y-%m-%d"),
        NaiveDate::parse_from_str(end, "%Y-%m-%d"),
    ) {
        (Ok(s), Ok(e)) => (e - s).num_days() + 1,
        _ => 1,
    }
}

#[async_trait]
impl LlmProvider for TemplateLlm {
    fn name(&self) -> &str {
        "template-llm"
    }

    async fn invoke_text(&self, request: LlmRequest) -> KernelResult<String> {
        let context: Value = request
            .context
            .as_deref()
            .and_then(|c| serde_json::from_str(c).ok())
            .unwrap_or(Value::Null);

        if request.tags.iter().any(|t| t == "intent_parse") {
            // The intent parser's heuristic-fill pass does the real
            // extraction work; the stand-in returns an empty object so
            // that path always runs (spec.md §4.4).
            return Ok("{}".to_string());
        }
        if request.tags.iter().any(|t| t == "brain_planner") {
            return Ok(Self::brain_plan(&context));
        }
        if request.tags.iter().any(|t| t == "synthesize") {
            return Ok(Self::synthesize(&context));
        }
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn synthesize_includes_required_sections() {
        let llm = TemplateLlm;
        let out = llm
            .invoke_text(LlmRequest {
                system: String::new(),
                user: String::new(),
                context: Some(json!({"destinations": ["Tokyo"], "start_date": "2026-04-01", "end_date": "2026-04-05"}).to_string()),
                tags: vec!["synthesize".into()],
            })
            .await
            .unwrap();
        for section in ["Summary", "Flights", "Lodging", "Transit", "Weather", "Budget", "Calendar"] {
            assert!(out.contains(section), "missing section {section}");
        }
    }

    #[tokio::test]
    async fn brain_planner_returns_parseable_json() {
        let llm = TemplateLlm;
        let out = llm
            .invoke_text(LlmRequest {
                system: String::new(),
                user: String::new(),
                context: Some(json!({"destinations": ["Tokyo", "Kyoto"], "origin": "SFO"}).to_string()),
                tags: vec!["brain_planner".into()],
            })
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert!(parsed["plan"].as_array().unwrap().len() >= 4);
    }
}
