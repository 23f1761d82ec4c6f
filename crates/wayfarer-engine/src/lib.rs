//! Concrete implementation of the Wayfarer trip-planning workflow
//! engine: graph executor, nodes, telemetry, evaluation, and default
//! in-process collaborators.

pub mod collaborators;
pub mod error;
pub mod eval;
pub mod fault;
pub mod metrics;
pub mod nodes;
pub mod runtime;
pub mod session;
pub mod telemetry;
mod test_support;

use std::sync::Arc;

use wayfarer_kernel::collaborators::{Geocoder, LlmProvider, MemoryStore, ToolRegistry};

pub use error::{EngineError, EngineResult};
pub use runtime::{WayfarerGraph, WayfarerGraphBuilder};

/// Assemble the fixed Wayfarer node topology (spec.md §4.1) into a
/// compiled graph, given the four external collaborators every node
/// that needs one is constructed with.
pub fn build_default_graph(
    memory: Arc<dyn MemoryStore>,
    tools: Arc<dyn ToolRegistry>,
    llm: Arc<dyn LlmProvider>,
    geocoder: Arc<dyn Geocoder>,
) -> WayfarerGraph {
    WayfarerGraphBuilder::new()
        .add_node(Box::new(nodes::context::ContextNode::new(memory.clone())))
        .add_node(Box::new(nodes::intent::IntentNode::new(llm.clone())))
        .add_node(Box::new(nodes::validator::ValidatorNode::new(geocoder)))
        .add_node(Box::new(nodes::brain_planner::BrainPlannerNode::new(llm.clone())))
        .add_node(Box::new(nodes::orchestrator::OrchestratorNode))
        .add_node(Box::new(nodes::executor::ExecutorNode::new(memory.clone(), tools, llm)))
        .add_node(Box::new(nodes::issue_triage::IssueTriageNode))
        .add_node(Box::new(nodes::evaluate_step::EvaluateStepNode))
        .add_node(Box::new(nodes::responder::ResponderNode))
        .add_node(Box::new(nodes::export_ics::ExportIcsNode))
        .add_node(Box::new(nodes::evaluate_final::EvaluateFinalNode))
        .add_node(Box::new(nodes::memory_writer::MemoryWriterNode::new(memory)))
        .add_router("orchestrator", nodes::orchestrator::route_after_orchestrator)
        .add_router("executor", nodes::executor::route_after_executor)
        .compile("context")
        .expect("the fixed topology always registers its entry point")
}
