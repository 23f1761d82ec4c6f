//! Default in-process geocoder: a static table of known places plus the
//! "country-name self-match" autopick heuristic (spec.md §9 Open
//! Question). Not a live network client — see SPEC_FULL.md §4 Non-goals.

use async_trait::async_trait;
use wayfarer_kernel::collaborators::{GeocodeCandidate, GeocodeOutcome, Geocoder};
use wayfarer_kernel::error::KernelResult;

struct Entry {
    name: &'static str,
    country: &'static str,
    admin1: &'static str,
    lat: f64,
    lon: f64,
    tz: &'static str,
}

const TABLE: &[Entry] = &[
    Entry { name: "Tokyo", country: "Japan", admin1: "Tokyo", lat: 35.6762, lon: 139.6503, tz: "Asia/Tokyo" },
    Entry { name: "San Francisco", country: "United States", admin1: "California", lat: 37.7749, lon: -122.4194, tz: "America/Los_Angeles" },
    Entry { name: "Portland", country: "United States", admin1: "Oregon", lat: 45.5152, lon: -122.6784, tz: "America/Los_Angeles" },
    Entry { name: "Portland", country: "United States", admin1: "Maine", lat: 43.6591, lon: -70.2568, tz: "America/New_York" },
    Entry { name: "Lima", country: "Peru", admin1: "Lima", lat: -12.0464, lon: -77.0428, tz: "America/Lima" },
    Entry { name: "Paris", country: "France", admin1: "Ile-de-France", lat: 48.8566, lon: 2.3522, tz: "Europe/Paris" },
    Entry { name: "London", country: "United Kingdom", admin1: "England", lat: 51.5072, lon: -0.1276, tz: "Europe/London" },
    Entry { name: "New York", country: "United States", admin1: "New York", lat: 40.7128, lon: -74.0060, tz: "America/New_York" },
];

fn to_candidate(entry: &Entry) -> GeocodeCandidate {
    GeocodeCandidate {
        name: entry.name.to_string(),
        country: entry.country.to_string(),
        admin1: entry.admin1.to_string(),
        latitude: entry.lat,
        longitude: entry.lon,
        timezone: entry.tz.to_string(),
    }
}

/// Countries whose name alone is a valid (if under-specified) query.
/// When a query matches one of these and nothing more specific, the
/// geocoder auto-picks the country's representative coordinates with an
/// empty `admin1` rather than asking the user to disambiguate further.
const COUNTRY_SELF_MATCH: &[Entry] = &[
    Entry { name: "Peru", country: "Peru", admin1: "", lat: -9.1900, lon: -75.0152, tz: "America/Lima" },
    Entry { name: "Japan", country: "Japan", admin1: "", lat: 36.2048, lon: 138.2529, tz: "Asia/Tokyo" },
    Entry { name: "France", country: "France", admin1: "", lat: 46.2276, lon: 2.2137, tz: "Europe/Paris" },
];

/// Static-table geocoder. Ambiguity is signaled when the matching set
/// has two-plus entries sharing `name` but differing `country`/`admin1`
/// and the query contains no comma (spec.md §6).
pub struct StaticGeocoder;

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, place: &str) -> KernelResult<GeocodeOutcome> {
        let query = place.trim();
        let has_comma = query.contains(',');
        let needle = query.split(',').next().unwrap_or(query).trim().to_lowercase();

        // "Peru, Peru" autopick: a country-name self-match with empty
        // admin1 is auto-picked rather than treated as ambiguous or
        // unresolved (spec.md §9 Open Question).
        if !has_comma {
            if let Some(entry) = COUNTRY_SELF_MATCH.iter().find(|e| e.country.to_lowercase() == needle) {
                return Ok(GeocodeOutcome {
                    best: Some(to_candidate(entry)),
                    candidates: vec![to_candidate(entry)],
                    ambiguous: false,
                    autopicked_reason: Some(format!(
                        "country-name self-match for '{}'",
                        entry.country
                    )),
                });
            }
        }

        let matches: Vec<&Entry> = TABLE.iter().filter(|e| e.name.to_lowercase() == needle).collect();

        if matches.is_empty() {
            return Ok(GeocodeOutcome {
                best: None,
                candidates: Vec::new(),
                ambiguous: false,
                autopicked_reason: None,
            });
        }

        if matches.len() >= 2 && !has_comma {
            let distinct_regions = matches
                .iter()
                .map(|e| (e.country, e.admin1))
                .collect::<std::collections::HashSet<_>>()
                .len();
            if distinct_regions >= 2 {
                return Ok(GeocodeOutcome {
                    best: None,
                    candidates: matches.iter().map(|e| to_candidate(e)).collect(),
                    ambiguous: true,
                    autopicked_reason: None,
                });
            }
        }

        Ok(GeocodeOutcome {
            best: Some(to_candidate(matches[0])),
            candidates: matches.iter().map(|e| to_candidate(e)).collect(),
            ambiguous: false,
            autopicked_reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ambiguous_portland_returns_two_candidates() {
        let geocoder = StaticGeocoder;
        let outcome = geocoder.geocode("Portland").await.unwrap();
        assert!(outcome.ambiguous);
        assert!(outcome.candidates.len() >= 2);
    }

    #[tokio::test]
    async fn peru_peru_autopicks() {
        let geocoder = StaticGeocoder;
        let outcome = geocoder.geocode("Peru").await.unwrap();
        assert!(outcome.autopicked_reason.is_some());
        assert!(outcome.best.is_some());
    }

    #[tokio::test]
    async fn unknown_place_has_no_candidates() {
        let geocoder = StaticGeocoder;
        let outcome = geocoder.geocode("Nowhereville").await.unwrap();
        assert!(outcome.best.is_none());
        assert!(outcome.candidates.is_empty());
    }
}
