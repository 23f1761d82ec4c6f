//! External-collaborator traits (spec.md §6): LLM, memory, tools and
//! geocoding. Grounded in the teacher's `LLMProvider`/`RAG` trait shapes
//! (`mofa-kernel/src/llm/provider.rs`, `mofa-kernel/src/rag/mod.rs`) but
//! narrowed to the single operation each collaborator needs here —
//! `wayfarer-engine` supplies default in-process implementations.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::KernelResult;
use crate::state::ContextHit;

/// A single chat-completion style request to the LLM collaborator.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub context: Option<String>,
    pub tags: Vec<String>,
}

/// The LLM collaborator (spec.md §6): `invoke_text`. Errors propagate as
/// typed results; callers (the executor's synthesis call) do not retry.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke_text(&self, request: LlmRequest) -> KernelResult<String>;
}

/// Document type stored via the memory collaborator (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Profile,
    Preference,
    TripSummary,
    ToolOutput,
    Note,
}

/// A document to persist via `add_session`/`add_user`.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    pub text: String,
    pub run_id: String,
    pub doc_type: DocType,
    pub metadata: serde_json::Map<String, Value>,
}

/// A similarity search over session- and user-scoped memory.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    pub query: String,
    pub k: usize,
    pub include_session: bool,
    pub include_user: bool,
}

/// The memory collaborator (spec.md §6): session/user document storage
/// plus similarity search, grounded in `mofa-kernel/src/rag/mod.rs`'s
/// `SearchResult`/`DocumentChunk` shapes.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn add_session(&self, doc: MemoryDocument) -> KernelResult<String>;
    async fn add_user(&self, doc: MemoryDocument) -> KernelResult<String>;
    async fn search(&self, query: MemoryQuery) -> KernelResult<Vec<ContextHit>>;
}

/// Output of a tool invocation (spec.md §6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolOutput {
    pub summary: String,
    pub links: Vec<crate::state::Link>,
    pub data: Value,
    #[serde(default)]
    pub top_results: Vec<crate::state::Link>,
}

/// The tool collaborator registry (spec.md §6): named tools, each
/// `fn(args) -> ToolOutput`, invoked by the executor on `TOOL_CALL` steps.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Whether `name` is a recognized tool (used by the brain planner's
    /// allow-list filter, spec.md §4.6).
    fn has_tool(&self, name: &str) -> bool;

    async fn call(&self, name: &str, args: &Value) -> KernelResult<ToolOutput>;
}

/// A single geocode candidate (spec.md §6).
pub use crate::state::GeocodeCandidate;

/// Outcome of a geocode lookup: a confident best match, a set of
/// candidates, and whether the match is ambiguous (spec.md §4.5/§6).
#[derive(Debug, Clone)]
pub struct GeocodeOutcome {
    pub best: Option<GeocodeCandidate>,
    pub candidates: Vec<GeocodeCandidate>,
    pub ambiguous: bool,
    /// Set when the "country-name self-match" autopick heuristic fired
    /// (spec.md §9 Open Question).
    pub autopicked_reason: Option<String>,
}

/// The geocoder collaborator (spec.md §6). 3-letter IATA codes bypass
/// this trait entirely at the call site (validator logic).
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, place: &str) -> KernelResult<GeocodeOutcome>;
}
