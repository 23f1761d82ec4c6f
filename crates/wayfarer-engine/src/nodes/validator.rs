//! Validator (spec.md §4.5): fills missing dates, reconciles
//! memory-derived profile/preference against the request, checks core
//! fields, and geocodes every place.

use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use wayfarer_kernel::collaborators::Geocoder;
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::{
    GeocodeCandidate, GroundedPlace, Issue, IssueKind, IssueSeverity, PendingDisambiguation,
    TerminationReason, TripState,
};

pub struct ValidatorNode {
    geocoder: Arc<dyn Geocoder>,
}

impl ValidatorNode {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }
}

fn dates_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap())
}

fn is_iata(place: &str) -> bool {
    place.len() == 3 && place.chars().all(|c| c.is_ascii_alphabetic())
}

/// "suspicious" heuristic for best-effort acceptance after a geocoder
/// exception (spec.md §4.5): digits present, or a single token ≥10
/// chars with <20% vowel ratio, or a 6+ consonant run.
fn is_suspicious(name: &str) -> bool {
    if name.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    let is_single_token = !name.trim().contains(char::is_whitespace);
    if is_single_token && name.len() >= 10 {
        let vowels = name.chars().filter(|c| "aeiouAEIOU".contains(*c)).count();
        if (vowels as f64) / (name.len() as f64) < 0.2 {
            return true;
        }
    }
    let mut run = 0;
    for c in name.chars() {
        if c.is_alphabetic() && !"aeiouAEIOU".contains(c) {
            run += 1;
            if run >= 6 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn extract_memory_text<'a>(hits: &'a [wayfarer_kernel::state::ContextHit], prefix: &str) -> Option<&'a str> {
    hits.iter()
        .map(|h| h.text.as_str())
        .find(|t| t.to_lowercase().contains(&prefix.to_lowercase()))
}

#[async_trait]
impl NodeFunc for ValidatorNode {
    async fn call(&self, state: &mut TripState, _ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        // Fill dates still missing, validate, and swap inverted ranges.
        if state.constraints.start_date.is_none() || state.constraints.end_date.is_none() {
            let dates: Vec<chrono::NaiveDate> = dates_pattern()
                .find_iter(&state.user_query)
                .filter_map(|m| chrono::NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
                .collect();
            if dates.len() >= 2 {
                state.constraints.start_date.get_or_insert(dates[0]);
                state.constraints.end_date.get_or_insert(dates[1]);
            }
        }
        if let (Some(start), Some(end)) = (state.constraints.start_date, state.constraints.end_date) {
            if start > end {
                state.constraints.start_date = Some(end);
                state.constraints.end_date = Some(start);
                state.constraints.notes.push("start_date and end_date were swapped (inverted range)".into());
            }
        }

        // Reconcile memory-derived origin/interests against the request.
        if let Some(text) = extract_memory_text(&state.context_hits, "home origin") {
            if let Some(memory_origin) = text.split(':').nth(1).map(str::trim) {
                let explicit_in_query = state
                    .constraints
                    .origin
                    .as_deref()
                    .map(|o| state.user_query.to_lowercase().contains(&o.to_lowercase()))
                    .unwrap_or(false);
                if state.constraints.origin.is_some() && explicit_in_query {
                    state.validation_warnings.push(format!(
                        "request origin kept over saved origin '{memory_origin}'"
                    ));
                } else if state.constraints.origin.is_none() {
                    state.constraints.origin = Some(memory_origin.to_string());
                    state.resolved_conflicts.push("adopted memory origin (no explicit request origin)".into());
                }
            }
        }
        if let Some(text) = extract_memory_text(&state.context_hits, "likes") {
            if !state.constraints.interests.is_empty() {
                state
                    .validation_warnings
                    .push(format!("kept request interests over saved preference ({text})"));
            }
        }

        let missing = state.constraints.missing_core_fields();
        if !missing.is_empty() {
            state.issues.push(Issue::new(
                IssueKind::ValidationError,
                IssueSeverity::Blocking,
                "validator",
                format!("missing core fields: {}", missing.join(", ")),
            ));
            let questions = missing.iter().map(|f| format!("What is your {f}?")).collect();
            state.ask_user(questions, TerminationReason::AskedUser);
            return Ok(NodeOutcome::Goto("__END__"));
        }

        // Geocode origin and each destination.
        let mut grounded_destinations = Vec::new();
        let origin_raw = state.constraints.origin.clone().unwrap();
        let grounded_origin = self.geocode_one(state, "origin", &origin_raw).await?;
        if state.needs_user_input {
            return Ok(NodeOutcome::Goto("__END__"));
        }

        for dest in state.constraints.destinations.clone() {
            let grounded = self.geocode_one(state, "destination", &dest).await?;
            if state.needs_user_input {
                return Ok(NodeOutcome::Goto("__END__"));
            }
            if let Some(g) = grounded {
                grounded_destinations.push(g);
            }
        }

        state.grounded_places.origin = grounded_origin;
        state.grounded_places.destinations = grounded_destinations;

        Ok(NodeOutcome::Goto("brain_planner"))
    }

    fn name(&self) -> &'static str {
        "validator"
    }
}

impl ValidatorNode {
    /// Resolve a single place, handling the IATA bypass, ambiguity,
    /// unresolved-and-empty, and suspicious-name exception paths
    /// (spec.md §4.5). Sets `state.needs_user_input` on the caller's
    /// behalf when the user must be asked.
    async fn geocode_one(
        &self,
        state: &mut TripState,
        field: &str,
        raw: &str,
    ) -> KernelResult<Option<GroundedPlace>> {
        if is_iata(raw) {
            return Ok(Some(GroundedPlace::iata(raw)));
        }

        match self.geocoder.geocode(raw).await {
            Ok(outcome) => {
                if outcome.ambiguous {
                    let options: Vec<String> = outcome
                        .candidates
                        .iter()
                        .take(3)
                        .map(|c| format!("{}, {} ({})", c.name, c.admin1, c.country))
                        .collect();
                    state.pending_disambiguation = Some(PendingDisambiguation {
                        field: field.to_string(),
                        raw_value: raw.to_string(),
                        options: options.clone(),
                        candidates: outcome.candidates,
                    });
                    state.ask_user(
                        std::iter::once(format!("Which {field} did you mean: {}?", options.join("; ")))
                            .collect(),
                        TerminationReason::AskedUser,
                    );
                    return Ok(None);
                }
                if outcome.best.is_none() && outcome.candidates.is_empty() {
                    state.issues.push(Issue::new(
                        IssueKind::ValidationError,
                        IssueSeverity::Blocking,
                        "validator",
                        format!("could not resolve {field} '{raw}'"),
                    ));
                    state.ask_user(
                        vec![format!("Could you clarify the {field} '{raw}'?")],
                        TerminationReason::AskedUser,
                    );
                    return Ok(None);
                }
                Ok(outcome.best.map(|c| candidate_to_place(&c, outcome.autopicked_reason)))
            }
            Err(_) => {
                state
                    .validation_warnings
                    .push(format!("geocoder unavailable for {field} '{raw}'"));
                if is_suspicious(raw) {
                    state.ask_user(
                        vec![format!("Could you clarify the {field} '{raw}'?")],
                        TerminationReason::AskedUser,
                    );
                    Ok(None)
                } else {
                    Ok(Some(GroundedPlace::best_effort(raw)))
                }
            }
        }
    }
}

fn candidate_to_place(candidate: &GeocodeCandidate, autopicked_reason: Option<String>) -> GroundedPlace {
    GroundedPlace {
        name: candidate.name.clone(),
        country: Some(candidate.country.clone()),
        admin1: Some(candidate.admin1.clone()),
        latitude: Some(candidate.latitude),
        longitude: Some(candidate.longitude),
        timezone: Some(candidate.timezone.clone()),
        autopicked_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::StaticGeocoder;
    use crate::test_support::test_ctx;
    use wayfarer_kernel::state::ContextHit;

    fn base_state() -> TripState {
        let mut state = TripState::new("r1", "u1", "Trip to Tokyo from SFO 2026-04-01 to 2026-04-05");
        state.constraints.origin = Some("SFO".into());
        state.constraints.destinations = vec!["Tokyo".into()];
        state.constraints.start_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        state.constraints.end_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 5).unwrap());
        state
    }

    #[tokio::test]
    async fn iata_bypasses_geocoding() {
        let node = ValidatorNode::new(Arc::new(StaticGeocoder));
        let mut state = base_state();
        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("brain_planner"));
        assert_eq!(state.grounded_places.origin.unwrap().name, "SFO");
    }

    #[tokio::test]
    async fn ambiguous_place_asks_user() {
        let node = ValidatorNode::new(Arc::new(StaticGeocoder));
        let mut state = base_state();
        state.constraints.origin = Some("Portland".into());
        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("__END__"));
        assert!(state.needs_user_input);
        assert!(state.pending_disambiguation.is_some());
        assert_eq!(state.pending_disambiguation.as_ref().unwrap().field, "origin");
    }

    #[tokio::test]
    async fn inverted_date_range_is_swapped() {
        let node = ValidatorNode::new(Arc::new(StaticGeocoder));
        let mut state = base_state();
        state.constraints.start_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 5).unwrap());
        state.constraints.end_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        node.call(&mut state, &test_ctx()).await.unwrap();
        assert!(state.constraints.start_date < state.constraints.end_date);
        assert!(!state.constraints.notes.is_empty());
    }

    #[tokio::test]
    async fn explicit_request_origin_kept_over_memory() {
        let node = ValidatorNode::new(Arc::new(StaticGeocoder));
        let mut state = base_state();
        state.user_query = "JFK to Tokyo 2026-04-01 to 2026-04-05".into();
        state.constraints.origin = Some("JFK".into());
        state.context_hits.push(ContextHit {
            id: "1".into(),
            text: "Home origin: SFO".into(),
            metadata: Default::default(),
            distance: 0.1,
        });
        node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(state.constraints.origin.as_deref(), Some("JFK"));
        assert!(state.validation_warnings.iter().any(|w| w.contains("SFO")));
        assert!(!state.needs_user_input);
    }
}
