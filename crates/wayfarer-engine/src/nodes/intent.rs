//! Intent Parser (spec.md §4.4): asks the LLM stand-in for a strict JSON
//! constraints object, parses it leniently, heuristically fills gaps by
//! regex over the raw query, applies any override, then asks the user
//! if core fields are still missing.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use wayfarer_kernel::collaborators::{LlmProvider, LlmRequest};
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::{Constraints, Pace, TerminationReason, TripState};

pub struct IntentNode {
    llm: Arc<dyn LlmProvider>,
}

impl IntentNode {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

/// Parse raw LLM text with three strategies in order: direct JSON,
/// fenced ```json block, first balanced `{...}` (spec.md §4.4).
fn parse_llm_json(text: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(text.trim()) {
        return v;
    }
    if let Some(re) = fenced_json_pattern().captures(text) {
        if let Ok(v) = serde_json::from_str::<Value>(&re[1]) {
            return v;
        }
    }
    if let Some(obj) = first_balanced_object(text) {
        if let Ok(v) = serde_json::from_str::<Value>(&obj) {
            return v;
        }
    }
    Value::Null
}

fn fenced_json_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").unwrap())
}

fn first_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn constraints_from_json(value: &Value) -> Constraints {
    let mut c = Constraints::default();
    if let Some(obj) = value.as_object() {
        c.origin = obj.get("origin").and_then(Value::as_str).map(str::to_string);
        if let Some(dests) = obj.get("destinations").and_then(Value::as_array) {
            c.destinations = dests.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        }
        c.start_date = obj
            .get("start_date")
            .and_then(Value::as_str)
            .and_then(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
        c.end_date = obj
            .get("end_date")
            .and_then(Value::as_str)
            .and_then(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
        c.budget_usd = obj.get("budget_usd").and_then(Value::as_f64);
        c.travelers = obj.get("travelers").and_then(Value::as_u64).map(|v| v as u32);
        if let Some(interests) = obj.get("interests").and_then(Value::as_array) {
            c.interests = interests.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        }
        c.pace = obj.get("pace").and_then(Value::as_str).and_then(parse_pace);
    }
    c
}

fn parse_pace(s: &str) -> Option<Pace> {
    match s.to_lowercase().as_str() {
        "relaxed" => Some(Pace::Relaxed),
        "balanced" => Some(Pace::Balanced),
        "packed" => Some(Pace::Packed),
        _ => None,
    }
}

macro_rules! lazy_re {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

lazy_re!(dates_pattern, r"\b(\d{4}-\d{2}-\d{2})\b");
lazy_re!(origin_pattern, r"(?i)\bfrom\s+([A-Za-z][A-Za-z\s]{1,30}?)(?:\s+to\b|\s+\d{4}-|\s*,|\.|$)");
lazy_re!(destination_pattern, r"(?i)\b(?:travel|trip|going|visit)(?:ing|s)?\s*(?:to)?\s*(?:to\s+)?([A-Za-z][A-Za-z\s]{1,30}?)(?:\s+from\b|\s+\d{4}-|\s*,|\.|$)");
lazy_re!(to_pattern, r"(?i)\bto\s+([A-Za-z][A-Za-z\s]{1,30}?)(?:\s+\d{4}-|\s*,|\.|$)");
lazy_re!(travelers_pattern, r"(?i)\b(\d+)\s*(?:travelers?|people|pax)\b");
lazy_re!(budget_pattern, r"(?i)budget[^0-9$]*\$?\s*([0-9][0-9,]*)");
lazy_re!(pace_pattern, r"(?i)\b(relaxed|balanced|packed)\b");
lazy_re!(interests_pattern, r"(?i)(?:interests:|I like)\s*([A-Za-z ,&]+)");

/// Heuristic fill over the raw query for fields still missing, appending
/// provenance notes so heuristic-derived values remain auditable
/// (spec.md §9 Design Notes: "heuristic fills append to notes").
fn heuristic_fill(c: &mut Constraints, query: &str) {
    if c.start_date.is_none() || c.end_date.is_none() {
        let dates: Vec<chrono::NaiveDate> = dates_pattern()
            .find_iter(query)
            .filter_map(|m| chrono::NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
            .collect();
        if dates.len() >= 2 {
            if c.start_date.is_none() {
                c.start_date = Some(dates[0]);
                c.notes.push("start_date filled heuristically from query dates".into());
            }
            if c.end_date.is_none() {
                c.end_date = Some(dates[1]);
                c.notes.push("end_date filled heuristically from query dates".into());
            }
        }
    }

    if c.origin.is_none() {
        if let Some(caps) = origin_pattern().captures(query) {
            c.origin = Some(caps[1].trim().to_string());
            c.notes.push("origin filled heuristically via 'from <origin>'".into());
        }
    }

    if c.destinations.is_empty() {
        if let Some(caps) = destination_pattern().captures(query) {
            c.destinations.push(caps[1].trim().to_string());
            c.notes.push("destination filled heuristically via travel/trip/visit phrasing".into());
        } else if let Some(caps) = to_pattern().captures(query) {
            c.destinations.push(caps[1].trim().to_string());
            c.notes.push("destination filled heuristically via 'to <destination>'".into());
        }
    }

    if c.travelers.is_none() {
        if let Some(caps) = travelers_pattern().captures(query) {
            if let Ok(n) = caps[1].parse::<u32>() {
                c.travelers = Some(n);
                c.notes.push("travelers filled heuristically from query".into());
            }
        }
    }

    if c.budget_usd.is_none() {
        if let Some(caps) = budget_pattern().captures(query) {
            let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
            if let Ok(n) = digits.parse::<f64>() {
                c.budget_usd = Some(n);
                c.notes.push("budget filled heuristically from query".into());
            }
        }
    }

    if c.pace.is_none() {
        if let Some(caps) = pace_pattern().captures(query) {
            c.pace = parse_pace(&caps[1]);
            c.notes.push("pace filled heuristically from query".into());
        }
    }

    if c.interests.is_empty() {
        if let Some(caps) = interests_pattern().captures(query) {
            c.interests = caps[1]
                .split(|ch| ch == ',' || ch == '&')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            c.notes.push("interests filled heuristically from query".into());
        }
    }
}

/// Best-effort typed coercion of an override onto the base constraints,
/// consuming it (spec.md §4.4: "applies any constraint_overrides ...
/// then clears them").
fn apply_overrides(base: &mut Constraints, overrides: Constraints) {
    if overrides.origin.is_some() {
        base.origin = overrides.origin;
    }
    if !overrides.destinations.is_empty() {
        base.destinations = overrides.destinations;
    }
    if overrides.start_date.is_some() {
        base.start_date = overrides.start_date;
    }
    if overrides.end_date.is_some() {
        base.end_date = overrides.end_date;
    }
    if overrides.budget_usd.is_some() {
        base.budget_usd = overrides.budget_usd;
    }
    if overrides.travelers.is_some() {
        base.travelers = overrides.travelers;
    }
    if !overrides.interests.is_empty() {
        base.interests = overrides.interests;
    }
    if overrides.pace.is_some() {
        base.pace = overrides.pace;
    }
    base.notes.extend(overrides.notes);
}

#[async_trait]
impl NodeFunc for IntentNode {
    async fn call(&self, state: &mut TripState, _ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        let raw = self
            .llm
            .invoke_text(LlmRequest {
                system: "Extract trip constraints as strict JSON.".into(),
                user: state.user_query.clone(),
                context: None,
                tags: vec!["intent_parse".into()],
            })
            .await?;

        let mut constraints = constraints_from_json(&parse_llm_json(&raw));
        heuristic_fill(&mut constraints, &state.user_query);

        if let Some(overrides) = state.constraint_overrides.take() {
            apply_overrides(&mut constraints, overrides);
        }

        state.constraints = constraints;

        let missing = state.constraints.missing_core_fields();
        if !missing.is_empty() {
            let questions: Vec<String> = missing
                .iter()
                .take(4)
                .map(|field| format!("What is your {field}?"))
                .collect();
            state.ask_user(questions, TerminationReason::AskedUser);
            return Ok(NodeOutcome::Goto("__END__"));
        }

        Ok(NodeOutcome::Goto("validator"))
    }

    fn name(&self) -> &'static str {
        "intent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::TemplateLlm;
    use crate::test_support::test_ctx;

    #[tokio::test]
    async fn fills_constraints_from_query_heuristics() {
        let node = IntentNode::new(Arc::new(TemplateLlm));
        let mut state = TripState::new(
            "r1",
            "u1",
            "Trip to Tokyo from SFO 2026-04-01 to 2026-04-05, 2 travelers, interests ramen gardens.",
        );
        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("validator"));
        assert_eq!(state.constraints.destinations, vec!["Tokyo"]);
        assert_eq!(state.constraints.origin.as_deref(), Some("SFO"));
        assert_eq!(state.constraints.travelers, Some(2));
    }

    #[tokio::test]
    async fn asks_user_when_core_fields_missing() {
        let node = IntentNode::new(Arc::new(TemplateLlm));
        let mut state = TripState::new("r1", "u1", "Plan a trip.");
        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("__END__"));
        assert!(state.needs_user_input);
        assert_eq!(state.termination_reason, Some(TerminationReason::AskedUser));
        assert!(state.clarifying_questions.len() >= 2);
    }

    #[test]
    fn balanced_brace_extraction_ignores_trailing_text() {
        let text = "here is json: {\"a\": {\"b\": 1}} and then more text";
        let obj = first_balanced_object(text).unwrap();
        assert_eq!(obj, "{\"a\": {\"b\": 1}}");
    }
}
