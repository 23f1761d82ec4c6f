//! Graph runtime traits (spec.md §4.1), grounded in the teacher's
//! `mofa-kernel/src/workflow/graph.rs` (`NodeFunc`, `CompiledGraph`,
//! `StreamEvent`, `START`/`END`) but simplified per spec.md §9's Design
//! Notes: nodes mutate a single concrete `TripState` in place and return
//! a plain `&'static str` routing directive instead of a generic
//! `Command<V>` over a keyed reducer state. There is exactly one state
//! type in this system, so the teacher's `S: GraphState` generic and its
//! `Reducer` machinery have no counterpart here.

use async_trait::async_trait;

use crate::error::KernelResult;
use crate::state::TripState;

/// Sentinel node name marking graph termination.
pub const END: &str = "__END__";

/// What a node asks the runtime to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Proceed to the named node (or [`END`]).
    Goto(&'static str),
    /// Let the node's registered conditional router decide the next node
    /// by inspecting the post-node state.
    Route,
}

/// A single node in the graph: a function `&mut TripState -> NodeOutcome`.
///
/// Mirrors the teacher's `NodeFunc<S, V>::call(&self, state: &mut S, ctx)`,
/// narrowed to one concrete state type and a plain outcome.
#[async_trait]
pub trait NodeFunc: Send + Sync {
    async fn call(&self, state: &mut TripState, ctx: &RuntimeContext) -> KernelResult<NodeOutcome>;

    fn name(&self) -> &'static str;
}

/// A pure conditional router: inspects post-node state, returns the next
/// node name. Registered alongside a node for edges marked conditional
/// in the fixed topology (spec.md §4.1), per spec.md §9's Design Notes.
pub type ConditionalRouter = fn(&TripState) -> &'static str;

/// Per-run runtime configuration threaded through every node call.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_iters: u32,
    pub recursion_limit: u32,
    pub eval_threshold: f64,
    pub max_tool_retries: u32,
    pub runtime_dir: std::path::PathBuf,
}

impl RuntimeConfig {
    /// `recursion_limit` defaults to `max(10 * max_iters, 200)`
    /// (spec.md §5, Recursion limit).
    pub fn with_defaults(max_iters: u32, eval_threshold: f64, max_tool_retries: u32, runtime_dir: std::path::PathBuf) -> Self {
        Self {
            max_iters,
            recursion_limit: (max_iters * 10).max(200),
            eval_threshold,
            max_tool_retries,
            runtime_dir,
        }
    }
}

/// Context passed to every node call: the run's configuration plus
/// handles to the telemetry and failure sinks. Analogous to the
/// teacher's `RuntimeContext<V>`, narrowed to this system's single
/// telemetry shape. Collaborators (LLM, memory, tools, geocoder) and
/// engine-internal helpers (metrics, fault injection) are not part of
/// this contract — nodes hold those directly, the way the teacher's
/// concrete `NodeFunc` implementations hold their own provider fields.
pub struct RuntimeContext {
    pub config: RuntimeConfig,
    pub telemetry: std::sync::Arc<dyn crate::telemetry::TelemetrySink>,
    pub failures: std::sync::Arc<dyn crate::telemetry::FailureSink>,
    pub metrics: std::sync::Arc<dyn crate::telemetry::MetricsSink>,
}

/// Observability event emitted by the runtime around each node
/// (spec.md §4.1: `node_enter`/`node_exit`), mirroring the shape of the
/// teacher's `StreamEvent` but narrowed to this system's node contract.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    NodeEnter { node: String, iteration: u32 },
    NodeExit { node: String, iteration: u32 },
    NodeError { node: String, message: String },
    End { termination_reason: String },
}

/// A compiled, executable graph (spec.md §4.1): `invoke` runs to
/// completion or a fatal error; `stream` yields the same trace as a
/// channel of [`StreamEvent`]s for observers.
#[async_trait]
pub trait CompiledGraph: Send + Sync {
    async fn invoke(&self, state: TripState, ctx: RuntimeContext) -> KernelResult<TripState>;

    fn stream(
        &self,
        state: TripState,
        ctx: RuntimeContext,
    ) -> tokio::sync::mpsc::Receiver<StreamEvent>;
}
