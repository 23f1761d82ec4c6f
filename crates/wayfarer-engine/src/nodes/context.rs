//! Context node: the first node in the graph. Pre-populates
//! `context_hits` with the user's stored profile/preference memories so
//! the validator (spec.md §4.5) can reconcile them against the request
//! before intent parsing runs.

use async_trait::async_trait;
use std::sync::Arc;
use wayfarer_kernel::collaborators::{MemoryQuery, MemoryStore};
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{NodeFunc, NodeOutcome, RuntimeContext};
use wayfarer_kernel::state::TripState;

pub struct ContextNode {
    memory: Arc<dyn MemoryStore>,
}

impl ContextNode {
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl NodeFunc for ContextNode {
    async fn call(&self, state: &mut TripState, _ctx: &RuntimeContext) -> KernelResult<NodeOutcome> {
        let hits = self
            .memory
            .search(MemoryQuery {
                query: "profile preference origin interests".into(),
                k: 5,
                include_session: false,
                include_user: true,
            })
            .await?;
        state.context_hits = hits;
        Ok(NodeOutcome::Goto("intent"))
    }

    fn name(&self) -> &'static str {
        "context"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;

    #[tokio::test]
    async fn populates_context_hits_from_memory() {
        let memory = Arc::new(crate::collaborators::InMemoryMemoryStore::new());
        memory.seed_user_fact("Home origin: SFO", Default::default());
        let node = ContextNode::new(memory);
        let mut state = TripState::new("r1", "u1", "plan a trip");
        let ctx = test_ctx();
        node.call(&mut state, &ctx).await.unwrap();
        assert!(!state.context_hits.is_empty());
    }
}
