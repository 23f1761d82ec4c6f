//! Export ICS (spec.md §4.9): builds a VCALENDAR with one all-day
//! VEVENT per trip day and writes it under the runtime directory.

use async_trait::async_trait;
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::TripState;

const MAX_SLUG_LEN: usize = 60;

pub struct ExportIcsNode;

fn slugify(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '\0' })
        .filter(|c| *c != '\0')
        .collect();
    slug.chars().take(MAX_SLUG_LEN).collect()
}

fn fold_ics_text(s: &str) -> String {
    s.replace('\\', "\\\\").replace(',', "\\,").replace(';', "\\;").replace('\n', "\\n")
}

fn build_vcalendar(state: &TripState, trip_name: &str, start: chrono::NaiveDate, end: chrono::NaiveDate) -> (String, usize) {
    let mut lines = vec!["BEGIN:VCALENDAR".to_string(), "VERSION:2.0".to_string(), "PRODID:-//wayfarer//trip-planner//EN".to_string()];

    let mut day = start;
    let mut index = 0usize;
    let mut count = 0usize;
    while day <= end {
        let title = state
            .itinerary_day_titles
            .get(index)
            .or_else(|| state.itinerary_day_titles.last())
            .cloned()
            .unwrap_or_else(|| format!("Day {}", index + 1));
        let summary = format!("{trip_name}: {title}");
        let next_day = day.succ_opt().unwrap_or(day);

        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:{}-{}@wayfarer", day.format("%Y%m%d"), index));
        lines.push(format!("DTSTAMP:{}T000000Z", day.format("%Y%m%d")));
        lines.push(format!("DTSTART;VALUE=DATE:{}", day.format("%Y%m%d")));
        lines.push(format!("DTEND;VALUE=DATE:{}", next_day.format("%Y%m%d")));
        lines.push(format!("SUMMARY:{}", fold_ics_text(&summary)));
        lines.push("END:VEVENT".to_string());

        count += 1;
        index += 1;
        day = next_day;
    }

    lines.push("END:VCALENDAR".to_string());
    (lines.join("\r\n") + "\r\n", count)
}

#[async_trait]
impl NodeFunc for ExportIcsNode {
    async fn call(&self, state: &mut TripState, ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        let (Some(start), Some(end)) = (state.constraints.start_date, state.constraints.end_date) else {
            state.ics_path = None;
            state.ics_event_count = 0;
            return Ok(NodeOutcome::Goto("evaluate_final"));
        };

        let trip_name = state.constraints.primary_destination().unwrap_or("Trip").to_string();
        let slug = slugify(&trip_name);
        let (body, count) = build_vcalendar(state, &trip_name, start, end);

        let artifacts_dir = ctx.config.runtime_dir.join("artifacts");
        std::fs::create_dir_all(&artifacts_dir)?;
        let filename = format!("{slug}-{}-itinerary.ics", start.format("%Y-%m-%d"));
        let path = artifacts_dir.join(&filename);
        std::fs::write(&path, body)?;

        state.ics_path = Some(path.to_string_lossy().into_owned());
        state.ics_event_count = count;

        Ok(NodeOutcome::Goto("evaluate_final"))
    }

    fn name(&self) -> &'static str {
        "export_ics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;

    #[tokio::test]
    async fn writes_one_event_per_day() {
        let node = ExportIcsNode;
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx();
        ctx.config.runtime_dir = dir.path().to_path_buf();

        let mut state = TripState::new("r1", "u1", "q");
        state.constraints.destinations = vec!["Tokyo".into()];
        state.constraints.start_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        state.constraints.end_date = Some(chrono::NaiveDate::from_ymd_opt(2026, 4, 3).unwrap());
        state.itinerary_day_titles = vec!["Arrival".into(), "Exploring".into()];

        node.call(&mut state, &ctx).await.unwrap();
        assert_eq!(state.ics_event_count, 3);
        let path = state.ics_path.unwrap();
        assert!(path.ends_with("itinerary.ics"));
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.matches("BEGIN:VEVENT").count(), 3);
        assert!(contents.contains("Tokyo: Arrival"));
        assert!(contents.contains("Tokyo: Exploring"));
    }

    #[tokio::test]
    async fn skips_when_dates_missing() {
        let node = ExportIcsNode;
        let mut state = TripState::new("r1", "u1", "q");
        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("evaluate_final"));
        assert!(state.ics_path.is_none());
        assert_eq!(state.ics_event_count, 0);
    }
}
