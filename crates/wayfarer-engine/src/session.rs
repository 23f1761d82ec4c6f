//! The driver-facing session: wires default collaborators into a
//! compiled graph, loads the environment configuration (spec.md §6),
//! and drives the needs-user-input resumption loop the CLI (or any
//! other driver) rides on top of. Grounded in the teacher's pattern of
//! a thin orchestration layer over a compiled graph plus a long-lived
//! collaborator set (`mofa-sdk/src/lib.rs`'s agent-runner shape).

use std::path::PathBuf;
use std::sync::Arc;

use wayfarer_kernel::collaborators::{Geocoder, LlmProvider, MemoryStore, ToolRegistry};
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::graph::{CompiledGraph, RuntimeConfig, RuntimeContext};
use wayfarer_kernel::state::{Constraints, TripState};

use crate::collaborators::{
    FaultyLlm, FaultyMemoryStore, FaultyToolRegistry, InMemoryMemoryStore, LinkBuilderTools, PassthroughGeocoder,
    StaticGeocoder, TemplateLlm,
};
use crate::fault::{FaultConfig, FaultInjector, FaultSite};
use crate::metrics::MetricsCollector;
use crate::telemetry::{TelemetryController, TelemetryMode};

/// Environment configuration (spec.md §6). Each field mirrors one
/// named environment variable; defaults match the spec's stated
/// defaults where given.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub runtime_dir: PathBuf,
    pub user_id: String,
    pub log_level: String,
    pub max_graph_iters: u32,
    pub eval_threshold: f64,
    pub max_tool_retries: u32,
    pub simulate_tool_timeout: f64,
    pub simulate_bad_retrieval: f64,
    pub failure_seed: u64,
    pub telemetry_mode: TelemetryMode,
}

impl EngineConfig {
    /// Read every field from its named environment variable, falling
    /// back to the defaults documented in spec.md §6/§4.2/§9.
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }

        Self {
            runtime_dir: std::env::var("RUNTIME_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./runtime")),
            user_id: std::env::var("USER_ID").unwrap_or_else(|_| "default-user".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            max_graph_iters: var("MAX_GRAPH_ITERS", 25),
            eval_threshold: var("EVAL_THRESHOLD", 3.5),
            max_tool_retries: var("MAX_TOOL_RETRIES", 1),
            simulate_tool_timeout: var("SIMULATE_TOOL_TIMEOUT", 0.0),
            simulate_bad_retrieval: var("SIMULATE_BAD_RETRIEVAL", 0.0),
            failure_seed: var("FAILURE_SEED", 0),
            telemetry_mode: match std::env::var("LOG_LEVEL").as_deref() {
                Ok("debug") | Ok("trace") => TelemetryMode::Detailed,
                _ => TelemetryMode::Selective,
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("./runtime"),
            user_id: "default-user".into(),
            log_level: "info".into(),
            max_graph_iters: 25,
            eval_threshold: 3.5,
            max_tool_retries: 1,
            simulate_tool_timeout: 0.0,
            simulate_bad_retrieval: 0.0,
            failure_seed: 0,
            telemetry_mode: TelemetryMode::Selective,
        }
    }
}

/// A running session: a compiled graph plus the long-lived
/// collaborators and config it was built from. One `Session` serves one
/// `run_id`'s worth of turns (spec.md §5: "no shared mutable globals
/// other than the telemetry/failure-tracker pointers, both set per run").
pub struct Session {
    graph: Arc<dyn CompiledGraph>,
    memory: Arc<InMemoryMemoryStore>,
    config: EngineConfig,
    run_id: String,
}

impl Session {
    pub fn new(config: EngineConfig, run_id: impl Into<String>) -> Self {
        let injector = Arc::new(
            FaultInjector::new(config.failure_seed)
                .with_site(FaultSite::ToolTimeout, FaultConfig { enabled: config.simulate_tool_timeout > 0.0, probability: config.simulate_tool_timeout })
                .with_site(FaultSite::ToolError, FaultConfig { enabled: config.simulate_tool_timeout > 0.0, probability: config.simulate_tool_timeout })
                .with_site(FaultSite::BadRetrieval, FaultConfig { enabled: config.simulate_bad_retrieval > 0.0, probability: config.simulate_bad_retrieval }),
        );

        let memory = Arc::new(InMemoryMemoryStore::new());
        let tools: Arc<dyn ToolRegistry> = Arc::new(LinkBuilderTools);
        let llm: Arc<dyn LlmProvider> = Arc::new(TemplateLlm);
        let geocoder: Arc<dyn Geocoder> = Arc::new(StaticGeocoder);

        let faulty_memory: Arc<dyn MemoryStore> = Arc::new(FaultyMemoryStore::new(memory.clone(), injector.clone()));
        let faulty_tools: Arc<dyn ToolRegistry> = Arc::new(FaultyToolRegistry::new(tools, injector.clone()));
        let faulty_llm: Arc<dyn LlmProvider> = Arc::new(FaultyLlm::new(llm, injector));
        let geocoder: Arc<dyn Geocoder> = Arc::new(PassthroughGeocoder::new(geocoder));

        let graph = Arc::new(crate::build_default_graph(faulty_memory, faulty_tools, faulty_llm, geocoder));

        Self {
            graph,
            memory,
            run_id: run_id.into(),
            config,
        }
    }

    /// Seed a durable user fact (e.g. from a prior session) directly
    /// into the in-process memory store, bypassing `add_user`.
    pub fn seed_memory(&self, text: impl Into<String>) {
        self.memory.seed_user_fact(text, Default::default());
    }

    fn runtime_context(&self) -> (RuntimeContext, Arc<MetricsCollector>) {
        let telemetry = Arc::new(
            TelemetryController::new(&self.config.runtime_dir, &self.run_id, &self.config.user_id, self.config.telemetry_mode, 2000)
                .expect("telemetry sinks must be creatable under the runtime dir"),
        );
        let metrics = Arc::new(MetricsCollector::new(self.run_id.clone()));
        let ctx = RuntimeContext {
            config: RuntimeConfig::with_defaults(
                self.config.max_graph_iters,
                self.config.eval_threshold,
                self.config.max_tool_retries,
                self.config.runtime_dir.clone(),
            ),
            telemetry: telemetry.clone(),
            failures: telemetry,
            metrics: metrics.clone(),
        };
        (ctx, metrics)
    }

    /// Run one full turn of the graph (spec.md §6's CLI loop: "invoke
    /// graph; if needs_user_input, collect answers ... re-invoke").
    pub async fn run_turn(&self, state: TripState) -> KernelResult<TripState> {
        let (ctx, metrics) = self.runtime_context();
        let runtime_dir = ctx.config.runtime_dir.clone();
        let result = self.graph.invoke(state, ctx).await;
        let status = match &result {
            Ok(s) => s.termination_reason.map(|r| format!("{r:?}")).unwrap_or_else(|| "unknown".into()),
            Err(_) => "error".into(),
        };
        let _ = metrics.finish(&runtime_dir, &status);
        result
    }

    pub fn new_state(&self, user_query: impl Into<String>) -> TripState {
        TripState::new(self.run_id.clone(), self.config.user_id.clone(), user_query)
    }

    /// Build the override bundle the CLI applies before re-invoking
    /// after `needs_user_input` (spec.md §6), from a flat field→answer
    /// map keyed by the same field names `missing_core_fields`/
    /// `pending_disambiguation.field` use.
    pub fn overrides_from_answers(answers: &[(String, String)]) -> Constraints {
        let mut overrides = Constraints::default();
        for (field, answer) in answers {
            match field.as_str() {
                "origin" => overrides.origin = Some(answer.clone()),
                "destination" => overrides.destinations = vec![answer.clone()],
                "start date" | "start_date" => {
                    if let Ok(d) = chrono::NaiveDate::parse_from_str(answer, "%Y-%m-%d") {
                        overrides.start_date = Some(d);
                    }
                }
                "end date" | "end_date" => {
                    if let Ok(d) = chrono::NaiveDate::parse_from_str(answer, "%Y-%m-%d") {
                        overrides.end_date = Some(d);
                    }
                }
                "budget" => {
                    if let Ok(n) = answer.trim_start_matches('$').replace(',', "").parse::<f64>() {
                        overrides.budget_usd = Some(n);
                    }
                }
                "travelers" => {
                    if let Ok(n) = answer.parse::<u32>() {
                        overrides.travelers = Some(n);
                    }
                }
                _ => overrides.notes.push(format!("{field}: {answer}")),
            }
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn happy_path_turn_finalizes() {
        let session = Session::new(EngineConfig { runtime_dir: std::env::temp_dir().join("wayfarer-test-session"), ..EngineConfig::default() }, "r-test-1");
        let state = session.new_state("Trip to Tokyo from SFO 2026-04-01 to 2026-04-05, 2 travelers, interests ramen gardens.");
        let result = session.run_turn(state).await.unwrap();
        assert_eq!(result.termination_reason, Some(wayfarer_kernel::state::TerminationReason::Finalized));
    }

    #[tokio::test]
    async fn missing_fields_round_trip_through_overrides() {
        let session = Session::new(EngineConfig { runtime_dir: std::env::temp_dir().join("wayfarer-test-session-2"), ..EngineConfig::default() }, "r-test-2");
        let state = session.new_state("Plan a trip.");
        let result = session.run_turn(state).await.unwrap();
        assert!(result.needs_user_input);

        let mut resumed = result;
        resumed.constraint_overrides = Some(Session::overrides_from_answers(&[
            ("origin".into(), "SFO".into()),
            ("destination".into(), "Tokyo".into()),
            ("start date".into(), "2026-04-01".into()),
            ("end date".into(), "2026-04-05".into()),
        ]));
        resumed.needs_user_input = false;
        resumed.clarifying_questions.clear();
        resumed.termination_reason = None;

        let final_state = session.run_turn(resumed).await.unwrap();
        assert_eq!(final_state.termination_reason, Some(wayfarer_kernel::state::TerminationReason::Finalized));
    }
}
