//! Evaluation Gate (spec.md §4.10): hard boolean gates plus a 0-5 rubric
//! averaged and compared against a threshold.

use regex::Regex;
use std::sync::OnceLock;
use wayfarer_kernel::state::{EvalStatus, EvaluationResult, HardGates, Rubric};

const REQUIRED_SECTIONS: &[&str] = &[
    "Summary", "Flights", "Lodging", "Day", "Transit", "Weather", "Budget", "Calendar", "Assumptions",
];

fn currency_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\$\d+|USD\d+|\d+USD|(price|prices|cost|fare).{0,25}\d|\d.{0,25}(price|prices|cost|fare)").unwrap())
}

fn time_mention_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b\d{1,2}:\d{2}\b|morning|afternoon|evening").unwrap())
}

fn bullet_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*[-*]\s+").unwrap())
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s)]+").unwrap())
}

/// Inputs the evaluator needs beyond the answer text itself.
pub struct EvalInput<'a> {
    pub answer: &'a str,
    pub missing_tokens: &'a [&'static str],
    pub destinations: &'a [String],
    pub start_date_present: bool,
    pub end_date_present: bool,
    pub interests_count: usize,
    pub ics_event_count: usize,
    pub ics_valid: bool,
}

fn hard_gates(input: &EvalInput) -> HardGates {
    let constraint_completeness = input.missing_tokens.is_empty()
        || (input.answer.to_lowercase().contains("assumptions")
            && input.missing_tokens.iter().all(|t| input.answer.to_lowercase().contains(&t.to_lowercase())));

    let no_fabricated_real_time_facts = !currency_pattern().is_match(input.answer);

    let link_validity_format = url_pattern().find_iter(input.answer).all(|m| {
        url::Url::parse(m.as_str())
            .map(|u| matches!(u.scheme(), "http" | "https") && !u.host_str().unwrap_or("").is_empty())
            .unwrap_or(false)
    });

    let calendar_export_correctness = input.ics_valid && input.ics_event_count >= 1;

    let lower = input.answer.to_lowercase();
    let safety_clarity_disclaimer =
        lower.contains("verify with official sources") || lower.contains("not legal advice");

    HardGates {
        constraint_completeness,
        no_fabricated_real_time_facts,
        link_validity_format,
        calendar_export_correctness,
        safety_clarity_disclaimer,
    }
}

fn rubric(input: &EvalInput) -> Rubric {
    let lower = input.answer.to_lowercase();

    let relevance = if input.interests_count == 0 {
        3.5
    } else {
        let hits = input
            .destinations
            .iter()
            .filter(|d| lower.contains(&d.to_lowercase()))
            .count() as f64;
        2.0 + 3.0 * hits / (input.interests_count.min(5).max(1) as f64)
    };

    let feasibility = if lower.contains("travel time") || lower.contains("transit") || lower.contains("distance") {
        4.0
    } else {
        3.0
    };

    let found = REQUIRED_SECTIONS.iter().filter(|s| lower.contains(&s.to_lowercase())).count() as f64;
    let completeness = 5.0 * found / 9.0;

    let time_mentions = time_mention_pattern().find_iter(input.answer).count() as f64;
    let bullets = bullet_pattern().find_iter(input.answer).count() as f64;
    let specificity = (2.5_f64).min(time_mentions / 6.0 * 2.5) + (2.5_f64).min(bullets / 20.0 * 2.5);

    let mut coherence: f64 = 5.0;
    if !input.destinations.iter().any(|d| lower.contains(&d.to_lowercase())) {
        coherence -= 2.0;
    }
    if !input.start_date_present {
        coherence -= 1.0;
    }
    if !input.end_date_present {
        coherence -= 1.0;
    }

    Rubric {
        relevance,
        feasibility,
        completeness,
        specificity,
        coherence: coherence.max(0.0),
    }
}

/// Run the full evaluation gate over a finished answer (spec.md §4.10).
pub fn evaluate(input: &EvalInput, threshold: f64) -> EvaluationResult {
    let gates = hard_gates(input);
    let rubric = rubric(input);
    let average = rubric.average();

    let overall_status = if gates.all_pass() && average >= threshold {
        EvalStatus::Good
    } else if gates.all_pass() {
        EvalStatus::NeedsWork
    } else {
        EvalStatus::Failed
    };

    EvaluationResult {
        hard_gates: gates,
        rubric,
        overall_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_answer() -> String {
        "## Summary\nTrip to Tokyo.\n\n## Flights\nhttps://www.google.com/travel/flights?q=x\n\n\
         ## Lodging\nhttps://www.booking.com/x\n\n## Day 1: Arrival\nMorning: explore. 09:00 breakfast.\n- see sights\n\n\
         ## Transit\ntravel time and distance.\n\n## Weather\nMild.\n\n## Budget\nVaries.\n\n\
         ## Calendar\nAttached.\n\n## Assumptions\nNone.\n\nVerify with official sources before booking.\n".to_string()
    }

    #[test]
    fn good_answer_passes_all_gates() {
        let answer = good_answer();
        let input = EvalInput {
            answer: &answer,
            missing_tokens: &[],
            destinations: &["Tokyo".to_string()],
            start_date_present: true,
            end_date_present: true,
            interests_count: 2,
            ics_event_count: 5,
            ics_valid: true,
        };
        let result = evaluate(&input, 3.5);
        assert!(result.hard_gates.all_pass());
        assert_eq!(result.overall_status, EvalStatus::Good);
    }

    #[test]
    fn currency_token_fails_no_fabricated_facts_gate() {
        let answer = format!("{} A $499 flight is listed.", good_answer());
        let input = EvalInput {
            answer: &answer,
            missing_tokens: &[],
            destinations: &["Tokyo".to_string()],
            start_date_present: true,
            end_date_present: true,
            interests_count: 2,
            ics_event_count: 5,
            ics_valid: true,
        };
        let result = evaluate(&input, 3.5);
        assert!(!result.hard_gates.no_fabricated_real_time_facts);
        assert_eq!(result.overall_status, EvalStatus::Failed);
    }

    #[test]
    fn status_good_implies_gates_and_threshold() {
        let answer = good_answer();
        let input = EvalInput {
            answer: &answer,
            missing_tokens: &[],
            destinations: &["Tokyo".to_string()],
            start_date_present: true,
            end_date_present: true,
            interests_count: 2,
            ics_event_count: 5,
            ics_valid: true,
        };
        let result = evaluate(&input, 3.5);
        if result.overall_status == EvalStatus::Good {
            assert!(result.hard_gates.all_pass());
            assert!(result.rubric.average() >= 3.5);
        }
    }
}
