//! Memory Writer: the graph's terminal node. Persists durable facts
//! about the run — the trip summary, and the origin/interests the
//! validator's next run can reconcile against (spec.md §4.5) — back
//! through the memory collaborator (spec.md §6).

use async_trait::async_trait;
use std::sync::Arc;
use wayfarer_kernel::collaborators::{DocType, MemoryDocument, MemoryStore};
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::TripState;

pub struct MemoryWriterNode {
    memory: Arc<dyn MemoryStore>,
}

impl MemoryWriterNode {
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        Self { memory }
    }
}

fn trip_summary_text(state: &TripState) -> String {
    let destinations = state.constraints.destinations.join(", ");
    let status = state
        .evaluation
        .as_ref()
        .map(|e| format!("{:?}", e.overall_status))
        .unwrap_or_else(|| "unknown".into());
    format!(
        "Trip summary: {} to {} ({} - {}), status={}",
        state.constraints.origin.clone().unwrap_or_else(|| "unknown origin".into()),
        if destinations.is_empty() { "unspecified".into() } else { destinations },
        state.constraints.start_date.map(|d| d.to_string()).unwrap_or_default(),
        state.constraints.end_date.map(|d| d.to_string()).unwrap_or_default(),
        status,
    )
}

#[async_trait]
impl NodeFunc for MemoryWriterNode {
    async fn call(&self, state: &mut TripState, _ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        self.memory
            .add_session(MemoryDocument {
                text: trip_summary_text(state),
                run_id: state.run_id.clone(),
                doc_type: DocType::TripSummary,
                metadata: serde_json::Map::new(),
            })
            .await?;

        if let Some(origin) = &state.constraints.origin {
            self.memory
                .add_user(MemoryDocument {
                    text: format!("Home origin: {origin}"),
                    run_id: state.run_id.clone(),
                    doc_type: DocType::Profile,
                    metadata: serde_json::Map::new(),
                })
                .await?;
        }

        if !state.constraints.interests.is_empty() {
            self.memory
                .add_user(MemoryDocument {
                    text: format!("User likes: {}", state.constraints.interests.join(", ")),
                    run_id: state.run_id.clone(),
                    doc_type: DocType::Preference,
                    metadata: serde_json::Map::new(),
                })
                .await?;
        }

        Ok(NodeOutcome::Goto("__END__"))
    }

    fn name(&self) -> &'static str {
        "memory_writer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryMemoryStore;
    use crate::test_support::test_ctx;
    use wayfarer_kernel::collaborators::MemoryQuery;

    #[tokio::test]
    async fn writes_trip_summary_and_profile_facts() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let node = MemoryWriterNode::new(memory.clone());
        let mut state = TripState::new("r1", "u1", "q");
        state.constraints.origin = Some("SFO".into());
        state.constraints.destinations = vec!["Tokyo".into()];
        state.constraints.interests = vec!["ramen".into()];

        let outcome = node.call(&mut state, &test_ctx()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Goto("__END__"));

        let hits = memory
            .search(MemoryQuery { query: "origin".into(), k: 5, include_session: false, include_user: true })
            .await
            .unwrap();
        assert!(hits.iter().any(|h| h.text.contains("SFO")));
    }
}
