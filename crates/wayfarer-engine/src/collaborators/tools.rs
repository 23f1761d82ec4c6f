//! Default in-process tool registry: deterministic link-building tools.
//! None of these make live HTTP calls (SPEC_FULL.md §4 Non-goals) — they
//! build well-formed search-engine deep links from the arguments they're
//! given, which is exactly what the spec's deterministic fallback link
//! builders require downstream in the responder.

use async_trait::async_trait;
use serde_json::{json, Value};
use wayfarer_kernel::collaborators::{ToolOutput, ToolRegistry};
use wayfarer_kernel::error::{KernelError, KernelResult};
use wayfarer_kernel::state::Link;

/// The allow-list of tool names the brain planner may reference
/// (spec.md §4.6), plus `distance_and_time` (spec.md §6).
pub const ALLOWED_TOOLS: &[&str] = &[
    "flights_search_links",
    "hotels_search_links",
    "things_to_do_links",
    "weather_summary",
    "distance_and_time",
];

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Static link-building tool registry.
pub struct LinkBuilderTools;

impl LinkBuilderTools {
    fn flights(args: &Value) -> ToolOutput {
        let origin = str_arg(args, "origin").unwrap_or_else(|| "your origin".into());
        let destination = str_arg(args, "destination").unwrap_or_else(|| "your destination".into());
        let depart = str_arg(args, "start_date").unwrap_or_default();
        let ret = str_arg(args, "end_date").unwrap_or_default();
        let query = format!("flights {} to {} {} {}", origin, destination, depart, ret);
        let links = vec![
            Link {
                label: format!("Google Flights: {} → {}", origin, destination),
                url: format!("https://www.google.com/travel/flights?q={}", urlencode(&query)),
            },
            Link {
                label: format!("Skyscanner: {} → {}", origin, destination),
                url: format!("https://www.skyscanner.net/transport/flights/search?q={}", urlencode(&query)),
            },
        ];
        ToolOutput {
            summary: format!("Flight search links for {} to {}.", origin, destination),
            top_results: links.clone(),
            links,
            data: json!({ "origin": origin, "destination": destination }),
        }
    }

    fn hotels(args: &Value) -> ToolOutput {
        let destination = str_arg(args, "destination").unwrap_or_else(|| "your destination".into());
        let checkin = str_arg(args, "start_date").unwrap_or_default();
        let checkout = str_arg(args, "end_date").unwrap_or_default();
        let query = format!("hotels in {} {} {}", destination, checkin, checkout);
        let links = vec![
            Link {
                label: format!("Booking.com: {}", destination),
                url: format!("https://www.booking.com/searchresults.html?ss={}", urlencode(&destination)),
            },
            Link {
                label: format!("Google Hotels: {}", destination),
                url: format!("https://www.google.com/travel/hotels?q={}", urlencode(&query)),
            },
        ];
        ToolOutput {
            summary: format!("Hotel search links for {}.", destination),
            top_results: links.clone(),
            links,
            data: json!({ "destination": destination }),
        }
    }

    fn things_to_do(args: &Value) -> ToolOutput {
        let destination = str_arg(args, "destination").unwrap_or_else(|| "your destination".into());
        let links = vec![
            Link {
                label: format!("TripAdvisor: things to do in {}", destination),
                url: format!("https://www.tripadvisor.com/Search?q={}", urlencode(&format!("things to do in {}", destination))),
            },
            Link {
                label: format!("Google: {} attractions", destination),
                url: format!("https://www.google.com/search?q={}", urlencode(&format!("{} attractions", destination))),
            },
        ];
        ToolOutput {
            summary: format!("Activity links for {}.", destination),
            top_results: links.clone(),
            links,
            data: json!({ "destination": destination }),
        }
    }

    fn weather(args: &Value) -> ToolOutput {
        let destination = str_arg(args, "destination").unwrap_or_else(|| "your destination".into());
        let links = vec![Link {
            label: format!("Weather forecast: {}", destination),
            url: format!("https://www.google.com/search?q={}", urlencode(&format!("{} weather forecast", destination))),
        }];
        ToolOutput {
            summary: format!("Typical seasonal weather notes for {} — verify with official sources closer to travel.", destination),
            top_results: links.clone(),
            links,
            data: json!({ "destination": destination }),
        }
    }

    fn distance_and_time(args: &Value) -> ToolOutput {
        let origin = str_arg(args, "origin").unwrap_or_else(|| "origin".into());
        let destination = str_arg(args, "destination").unwrap_or_else(|| "destination".into());
        let links = vec![Link {
            label: format!("Directions: {} to {}", origin, destination),
            url: format!(
                "https://www.google.com/maps/dir/{}/{}",
                urlencode(&origin),
                urlencode(&destination)
            ),
        }];
        ToolOutput {
            summary: format!("Estimated travel time and distance from {} to {}.", origin, destination),
            top_results: links.clone(),
            links,
            data: json!({ "origin": origin, "destination": destination }),
        }
    }
}

#[async_trait]
impl ToolRegistry for LinkBuilderTools {
    fn has_tool(&self, name: &str) -> bool {
        ALLOWED_TOOLS.contains(&name)
    }

    async fn call(&self, name: &str, args: &Value) -> KernelResult<ToolOutput> {
        match name {
            "flights_search_links" => Ok(Self::flights(args)),
            "hotels_search_links" => Ok(Self::hotels(args)),
            "things_to_do_links" => Ok(Self::things_to_do(args)),
            "weather_summary" => Ok(Self::weather(args)),
            "distance_and_time" => Ok(Self::distance_and_time(args)),
            other => Err(KernelError::Collaborator(format!("unknown tool '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flights_links_are_well_formed() {
        let tools = LinkBuilderTools;
        let out = tools
            .call("flights_search_links", &json!({"origin": "SFO", "destination": "Tokyo"}))
            .await
            .unwrap();
        assert!(!out.links.is_empty());
        for link in &out.links {
            assert!(link.url.starts_with("https://"));
        }
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let tools = LinkBuilderTools;
        assert!(tools.call("not_a_tool", &json!({})).await.is_err());
    }

    #[test]
    fn has_tool_matches_allow_list() {
        let tools = LinkBuilderTools;
        assert!(tools.has_tool("weather_summary"));
        assert!(!tools.has_tool("book_flight"));
    }
}
