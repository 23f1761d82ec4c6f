//! Responder (spec.md §4.8): normalizes the synthesized answer into
//! ATX headings, guarantees the disclaimer and required sections,
//! records missing-constraint assumptions, and strips currency tokens.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use wayfarer_kernel::collaborators::ToolRegistry;
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::{Link, TripState};

use crate::collaborators::tools::LinkBuilderTools;

const DISCLAIMER: &str = "This itinerary is a planning aid only — verify with official sources before booking.";

/// Sections with no backing tool: filled with static boilerplate when
/// entirely missing, same as before this pass.
const STATIC_SECTIONS: &[(&str, &str)] = &[
    ("Summary", "## Summary\nA trip as described in your request.\n"),
    ("Budget", "## Budget\nBudget varies by season and provider.\n"),
    ("Calendar", "## Calendar\nNo calendar file was generated for this run.\n"),
];

/// Sections backed by a tool: filled from `tool_results` (preferred) or
/// the deterministic link builders, keyed on origin/destination/dates
/// (spec.md §4.8).
const TOOL_SECTIONS: &[(&str, &str)] = &[
    ("Flights", "flights_search_links"),
    ("Lodging", "hotels_search_links"),
    ("Day-by-day", "things_to_do_links"),
    ("Transit", "distance_and_time"),
    ("Weather", "weather_summary"),
];

pub struct ResponderNode;

fn bold_line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\*\*(.+?)\*\*\s*$").unwrap())
}

fn setext_underline_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(.+)\n(=+|-{2,})\s*$").unwrap())
}

fn currency_token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$\d+(\.\d+)?|\bUSD\s?\d+\b|\b\d+\s?USD\b|\b(price|cost|fare)s?\b.{0,25}\d|\d.{0,25}\b(price|cost|fare)s?\b").unwrap()
    })
}

fn disclaimer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)verify with official sources|not legal advice").unwrap())
}

/// Convert bold-only lines and setext underlines into ATX `## Title` headings.
fn normalize_headings(text: &str) -> String {
    let text = setext_underline_pattern().replace_all(text, "## $1");
    bold_line_pattern().replace_all(&text, "## $1").into_owned()
}

fn strip_currency(text: &str) -> String {
    currency_token_pattern().replace_all(text, "[price omitted]").into_owned()
}

fn ensure_disclaimer(text: &mut String) {
    let occurrences = disclaimer_pattern().find_iter(text).count();
    if occurrences == 1 {
        return;
    }
    if occurrences > 1 {
        *text = disclaimer_pattern().split(text).collect::<Vec<_>>().join("");
    }
    text.push_str("\n\n");
    text.push_str(DISCLAIMER);
    text.push('\n');
}

fn ensure_static_sections(text: &mut String) {
    let lower = text.to_lowercase();
    for (name, fallback) in STATIC_SECTIONS {
        if !lower.contains(&name.to_lowercase()) {
            text.push_str("\n\n");
            text.push_str(fallback);
        }
    }
}

/// `true` once `heading`'s body (from its line to the next `## ` heading
/// or end of text) already carries at least one link.
fn section_body_has_link(text: &str, heading: &str) -> bool {
    let pattern = format!(r"(?im)^##\s*{}\s*$([\s\S]*?)(?:\n##\s|\z)", regex::escape(heading));
    let Ok(re) = Regex::new(&pattern) else {
        return false;
    };
    re.captures(text)
        .map(|caps| caps[1].contains("http"))
        .unwrap_or(false)
}

fn links_markdown(links: &[Link]) -> String {
    links.iter().map(|l| format!("- [{}]({})\n", l.label, l.url)).collect()
}

fn tool_args_for_section(tool_name: &str, state: &TripState) -> serde_json::Value {
    let origin = state.constraints.origin.clone().unwrap_or_default();
    let destination = state.constraints.primary_destination().unwrap_or_default().to_string();
    let start = state.constraints.start_date.map(|d| d.to_string()).unwrap_or_default();
    let end = state.constraints.end_date.map(|d| d.to_string()).unwrap_or_default();
    match tool_name {
        "flights_search_links" => json!({"origin": origin, "destination": destination, "start_date": start, "end_date": end}),
        "hotels_search_links" => json!({"destination": destination, "start_date": start, "end_date": end}),
        "distance_and_time" => json!({"origin": origin, "destination": destination}),
        _ => json!({"destination": destination}),
    }
}

/// Fills each tool-backed section from the matching `tool_results`
/// entry when one exists, else from the deterministic link builders
/// keyed on origin/destination/dates (spec.md §4.8).
async fn fill_tool_sections(text: &mut String, state: &TripState) {
    let link_builders = LinkBuilderTools;
    for (name, tool_name) in TOOL_SECTIONS {
        let heading_present = text.to_lowercase().contains(&format!("## {}", name.to_lowercase()));
        if heading_present && section_body_has_link(text, name) {
            continue;
        }

        let (summary, links) = if let Some(result) = state.tool_results.iter().find(|r| r.tool_name == *tool_name) {
            (result.summary.clone(), result.links.clone())
        } else {
            let args = tool_args_for_section(tool_name, state);
            match link_builders.call(tool_name, &args).await {
                Ok(output) => (output.summary, output.links),
                Err(_) => (format!("No {} links were available for this run.", name.to_lowercase()), Vec::new()),
            }
        };

        let body = format!("{summary}\n{}", links_markdown(&links));
        if heading_present {
            let pattern = format!(r"(?im)^##\s*{}\s*$([\s\S]*?)(?=\n##\s|\z)", regex::escape(name));
            if let Ok(re) = Regex::new(&pattern) {
                *text = re.replace(text, |_: &regex::Captures| format!("## {name}\n{body}")).into_owned();
            }
        } else {
            text.push_str(&format!("\n\n## {name}\n{body}"));
        }
    }
}

fn missing_constraint_tokens(state: &TripState) -> Vec<&'static str> {
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

fn append_assumptions(text: &mut String, missing: &[&str]) {
    if missing.is_empty() {
        return;
    }
    if !text.to_lowercase().contains("## assumptions") {
        text.push_str("\n\n## Assumptions\n");
    }
    text.push_str(&format!("Missing from your request: {}.\n", missing.join(", ")));
}

/// Multi-destination flight/lodging sections use `### Origin → Destination`
/// sub-headings (spec.md §4.8).
fn multi_destination_subheadings(state: &TripState) -> String {
    let origin = state.constraints.origin.clone().unwrap_or_else(|| "your origin".into());
    let mut out = String::new();
    for dest in &state.constraints.destinations {
        out.push_str(&format!("### {origin} → {dest}\n"));
    }
    out
}

#[async_trait]
impl NodeFunc for ResponderNode {
    async fn call(&self, state: &mut TripState, _ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        let mut text = state.final_answer.clone().unwrap_or_default();
        text = normalize_headings(&text);
        text = strip_currency(&text);
        fill_tool_sections(&mut text, state).await;
        ensure_static_sections(&mut text);
        ensure_disclaimer(&mut text);

        if state.constraints.destinations.len() > 1 {
            text.push_str("\n\n");
            text.push_str(&multi_destination_subheadings(state));
        }

        let missing = missing_constraint_tokens(state);
        append_assumptions(&mut text, &missing);

        state.final_answer = Some(text);
        Ok(NodeOutcome::Goto("export_ics"))
    }

    fn name(&self) -> &'static str {
        "responder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> TripState {
        let mut s = TripState::new("r1", "u1", "q");
        s.constraints.destinations = vec!["Tokyo".into()];
        s.constraints.origin = Some("SFO".into());
        s.constraints.start_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        s.constraints.end_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 5).unwrap());
        s
    }

    #[tokio::test]
    async fn fills_missing_required_sections() {
        let node = ResponderNode;
        let mut s = state();
        s.final_answer = Some("## Summary\nShort trip.\n".into());
        node.call(&mut s, &crate::test_support::test_ctx()).await.unwrap();
        let text = s.final_answer.unwrap().to_lowercase();
        for (name, _) in STATIC_SECTIONS.iter().chain(TOOL_SECTIONS) {
            assert!(text.contains(&name.to_lowercase()), "missing section {name}");
        }
    }

    #[tokio::test]
    async fn fills_flights_section_from_tool_results() {
        use wayfarer_kernel::state::ToolResult;

        let node = ResponderNode;
        let mut s = state();
        s.final_answer = Some("## Summary\nShort trip.\n".into());
        s.tool_results.push(ToolResult {
            step_id: "step-0".into(),
            tool_name: "flights_search_links".into(),
            data: serde_json::json!({}),
            summary: "Flight search links for SFO to Tokyo.".into(),
            links: vec![Link {
                label: "Google Flights: SFO → Tokyo".into(),
                url: "https://www.google.com/travel/flights?q=SFO+Tokyo".into(),
            }],
        });
        node.call(&mut s, &crate::test_support::test_ctx()).await.unwrap();
        let text = s.final_answer.unwrap();
        assert!(text.contains("https://www.google.com/travel/flights?q=SFO+Tokyo"));
    }

    #[tokio::test]
    async fn fills_missing_tool_sections_from_deterministic_builders() {
        let node = ResponderNode;
        let mut s = state();
        s.final_answer = Some("## Summary\nShort trip.\n".into());
        node.call(&mut s, &crate::test_support::test_ctx()).await.unwrap();
        let text = s.final_answer.unwrap();
        assert!(text.contains("## Flights"));
        assert!(text.contains("https://"));
    }

    #[tokio::test]
    async fn strips_currency_tokens() {
        let node = ResponderNode;
        let mut s = state();
        s.final_answer = Some("## Budget\nFlights cost $450 this week.\n".into());
        node.call(&mut s, &crate::test_support::test_ctx()).await.unwrap();
        let text = s.final_answer.unwrap();
        assert!(!text.contains('$'));
        assert!(text.contains("[price omitted]"));
    }

    #[tokio::test]
    async fn guarantees_exactly_one_disclaimer() {
        let node = ResponderNode;
        let mut s = state();
        s.final_answer = Some(format!("## Summary\n{DISCLAIMER}\n{DISCLAIMER}\n"));
        node.call(&mut s, &crate::test_support::test_ctx()).await.unwrap();
        let text = s.final_answer.unwrap();
        let count = disclaimer_pattern().find_iter(&text).count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn records_missing_constraint_assumptions() {
        let node = ResponderNode;
        let mut s = TripState::new("r1", "u1", "q");
        s.constraints.destinations = vec!["Tokyo".into()];
        s.final_answer = Some("## Summary\nTrip.\n".into());
        node.call(&mut s, &crate::test_support::test_ctx()).await.unwrap();
        let text = s.final_answer.unwrap().to_lowercase();
        assert!(text.contains("origin"));
    }
}
