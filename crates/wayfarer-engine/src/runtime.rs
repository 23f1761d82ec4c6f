//! Concrete graph runtime (spec.md §4.1): registers the fixed node
//! topology, resolves conditional routing, and drives the bounded
//! orchestrator/executor loop to completion. Grounded in the teacher's
//! `CompiledGraphImpl::invoke`/`stream`
//! (`mofa-foundation/src/workflow/state_graph.rs`), narrowed to a single
//! concrete state type and plain `Goto`/`Route` outcomes instead of the
//! teacher's keyed-reducer `Command`/`EdgeTarget` machinery.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use wayfarer_kernel::error::{KernelError, KernelResult};
use wayfarer_kernel::graph::{CompiledGraph, NodeFunc, NodeOutcome, RuntimeContext, StreamEvent, END};
use wayfarer_kernel::state::TripState;
use wayfarer_kernel::telemetry::{FailureCategory, FailureRecord, FailureSeverity, TelemetryLevel};

use crate::telemetry::record;

/// A pure conditional router, keyed by the node name it follows.
type Router = fn(&TripState) -> &'static str;

/// The compiled Wayfarer graph: a fixed node registry plus conditional
/// routers for the two cyclic edges (orchestrator ⇄ executor).
pub struct WayfarerGraph {
    nodes: HashMap<&'static str, Arc<dyn NodeFunc>>,
    routers: HashMap<&'static str, Router>,
    entry: &'static str,
}

/// Builder for [`WayfarerGraph`], mirroring the teacher's fluent
/// `StateGraph::add_node`/`add_conditional_edges`/`compile` shape but
/// specialized to this system's fixed topology (spec.md §4.1) rather
/// than an arbitrary graph.
pub struct WayfarerGraphBuilder {
    nodes: HashMap<&'static str, Arc<dyn NodeFunc>>,
    routers: HashMap<&'static str, Router>,
}

impl WayfarerGraphBuilder {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            routers: HashMap::new(),
        }
    }

    pub fn add_node(mut self, node: Box<dyn NodeFunc>) -> Self {
        let node: Arc<dyn NodeFunc> = Arc::from(node);
        self.nodes.insert(node.name(), node);
        self
    }

    /// Register the conditional router a node's `NodeOutcome::Route`
    /// delegates to.
    pub fn add_router(mut self, node_name: &'static str, router: Router) -> Self {
        self.routers.insert(node_name, router);
        self
    }

    pub fn compile(self, entry: &'static str) -> KernelResult<WayfarerGraph> {
        if !self.nodes.contains_key(entry) {
            return Err(KernelError::NoEntryPoint);
        }
        Ok(WayfarerGraph {
            nodes: self.nodes,
            routers: self.routers,
            entry,
        })
    }
}

impl Default for WayfarerGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompiledGraph for WayfarerGraph {
    async fn invoke(&self, mut state: TripState, ctx: RuntimeContext) -> KernelResult<TripState> {
        let mut current = self.entry;
        let mut transitions: u32 = 0;

        loop {
            if current == END {
                break;
            }
            transitions += 1;
            if transitions > ctx.config.recursion_limit {
                return Err(KernelError::RecursionLimitExceeded(ctx.config.recursion_limit));
            }

            let node = self
                .nodes
                .get(current)
                .ok_or_else(|| KernelError::NodeNotFound(current.to_string()))?;

            ctx.telemetry
                .emit(record(&state.run_id, &state.user_id, TelemetryLevel::Debug, "graph", "node_enter", current, json!({"iteration": transitions})))
                .await;
            ctx.metrics.incr("graph_node_transitions");

            match node.call(&mut state, &ctx).await {
                Ok(outcome) => {
                    ctx.telemetry
                        .emit(record(&state.run_id, &state.user_id, TelemetryLevel::Debug, "graph", "node_exit", current, json!({"iteration": transitions})))
                        .await;
                    ctx.on_signals_changed(&state).await;
                    current = match outcome {
                        NodeOutcome::Goto(next) => next,
                        NodeOutcome::Route => {
                            let router = self.routers.get(current).ok_or_else(|| {
                                KernelError::InvalidState(format!("node '{current}' returned Route with no registered router"))
                            })?;
                            router(&state)
                        }
                    };
                }
                Err(e) => {
                    ctx.metrics.incr("graph_node_errors");
                    ctx.telemetry
                        .emit(record(&state.run_id, &state.user_id, TelemetryLevel::Error, "graph", "node_error", e.to_string(), json!({"node": current})))
                        .await;
                    ctx.failures
                        .record(FailureRecord {
                            timestamp: chrono::Utc::now(),
                            run_id: state.run_id.clone(),
                            category: FailureCategory::State,
                            severity: FailureSeverity::Critical,
                            node: current.to_string(),
                            message: e.to_string(),
                            details: json!({}),
                        })
                        .await;
                    return Err(e);
                }
            }
        }

        Ok(state)
    }

    fn stream(&self, state: TripState, ctx: RuntimeContext) -> tokio::sync::mpsc::Receiver<StreamEvent> {
        let (tx, rx) = tokio::sync::mpsc::channel(128);
        // Streaming reuses `invoke`'s sequencing but emits StreamEvents
        // instead of (or alongside) telemetry; spawned so the caller can
        // observe progress without blocking on the whole run. Nodes are
        // `Arc`-held so they can be cloned into the spawned task without
        // borrowing `self`.
        let entry = self.entry;
        let nodes = self.nodes.clone();
        let routers = self.routers.clone();

        tokio::spawn(async move {
            let mut state = state;
            let mut current = entry;
            let mut transitions: u32 = 0;

            loop {
                if current == END {
                    let _ = tx
                        .send(StreamEvent::End {
                            termination_reason: state
                                .termination_reason
                                .map(|r| format!("{r:?}"))
                                .unwrap_or_default(),
                        })
                        .await;
                    break;
                }
                transitions += 1;
                if transitions > ctx.config.recursion_limit {
                    let _ = tx
                        .send(StreamEvent::NodeError {
                            node: current.to_string(),
                            message: "recursion limit exceeded".into(),
                        })
                        .await;
                    break;
                }

                let Some(node) = nodes.get(current) else {
                    let _ = tx
                        .send(StreamEvent::NodeError { node: current.to_string(), message: "node not found".into() })
                        .await;
                    break;
                };

                let _ = tx.send(StreamEvent::NodeEnter { node: current.to_string(), iteration: transitions }).await;
                match node.call(&mut state, &ctx).await {
                    Ok(outcome) => {
                        let _ = tx.send(StreamEvent::NodeExit { node: current.to_string(), iteration: transitions }).await;
                        current = match outcome {
                            NodeOutcome::Goto(next) => next,
                            NodeOutcome::Route => match routers.get(current) {
                                Some(router) => router(&state),
                                None => {
                                    let _ = tx
                                        .send(StreamEvent::NodeError {
                                            node: current.to_string(),
                                            message: "no router registered".into(),
                                        })
                                        .await;
                                    break;
                                }
                            },
                        };
                    }
                    Err(e) => {
                        let _ = tx.send(StreamEvent::NodeError { node: current.to_string(), message: e.to_string() }).await;
                        break;
                    }
                }
            }
        });

        rx
    }
}

#[async_trait::async_trait]
trait OnSignalsChanged {
    async fn on_signals_changed(&self, state: &TripState);
}

#[async_trait::async_trait]
impl OnSignalsChanged for RuntimeContext {
    async fn on_signals_changed(&self, state: &TripState) {
        let any = state.signals.tool_error
            || state.signals.bad_retrieval
            || state.signals.no_results
            || state.signals.timeout_risk
            || state.signals.planning_error
            || state.signals.memory_unavailable
            || state.signals.node_error;
        self.telemetry.on_signals_changed(any).await;
    }
}
