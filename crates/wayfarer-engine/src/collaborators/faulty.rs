//! Fault-injecting collaborator decorators (spec.md §4.12): wrap a real
//! collaborator and, per [`FaultInjector`](crate::fault::FaultInjector)
//! site probabilities, substitute a sentinel result or raise instead of
//! delegating. Never mutates the arguments the inner collaborator sees.

use async_trait::async_trait;
use std::sync::Arc;
use wayfarer_kernel::collaborators::{
    GeocodeOutcome, Geocoder, LlmProvider, LlmRequest, MemoryDocument, MemoryQuery, MemoryStore, ToolOutput, ToolRegistry,
};
use wayfarer_kernel::error::{KernelError, KernelResult};
use wayfarer_kernel::state::ContextHit;

use crate::fault::{FaultInjector, FaultSite};

pub struct FaultyToolRegistry {
    inner: Arc<dyn ToolRegistry>,
    injector: Arc<FaultInjector>,
}

impl FaultyToolRegistry {
    pub fn new(inner: Arc<dyn ToolRegistry>, injector: Arc<FaultInjector>) -> Self {
        Self { inner, injector }
    }
}

#[async_trait]
impl ToolRegistry for FaultyToolRegistry {
    fn has_tool(&self, name: &str) -> bool {
        self.inner.has_tool(name)
    }

    async fn call(&self, name: &str, args: &serde_json::Value) -> KernelResult<ToolOutput> {
        if self.injector.should_fail(FaultSite::ToolTimeout) {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            return Err(KernelError::Collaborator(format!("tool '{name}' timed out")));
        }
        if self.injector.should_fail(FaultSite::ToolError) {
            return Err(KernelError::Collaborator(format!("tool '{name}' raised a simulated error")));
        }
        self.inner.call(name, args).await
    }
}

pub struct FaultyMemoryStore {
    inner: Arc<dyn MemoryStore>,
    injector: Arc<FaultInjector>,
}

impl FaultyMemoryStore {
    pub fn new(inner: Arc<dyn MemoryStore>, injector: Arc<FaultInjector>) -> Self {
        Self { inner, injector }
    }
}

#[async_trait]
impl MemoryStore for FaultyMemoryStore {
    async fn add_session(&self, doc: MemoryDocument) -> KernelResult<String> {
        self.inner.add_session(doc).await
    }

    async fn add_user(&self, doc: MemoryDocument) -> KernelResult<String> {
        self.inner.add_user(doc).await
    }

    async fn search(&self, query: MemoryQuery) -> KernelResult<Vec<ContextHit>> {
        if self.injector.should_fail(FaultSite::BadRetrieval) {
            return Ok(vec![ContextHit {
                id: "fault-injected".into(),
                text: "unrelated note about spreadsheets".into(),
                metadata: Default::default(),
                distance: 1.0,
            }]);
        }
        self.inner.search(query).await
    }
}

pub struct FaultyLlm {
    inner: Arc<dyn LlmProvider>,
    injector: Arc<FaultInjector>,
}

impl FaultyLlm {
    pub fn new(inner: Arc<dyn LlmProvider>, injector: Arc<FaultInjector>) -> Self {
        Self { inner, injector }
    }
}

#[async_trait]
impl LlmProvider for FaultyLlm {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn invoke_text(&self, request: LlmRequest) -> KernelResult<String> {
        if self.injector.should_fail(FaultSite::LlmError) {
            return Err(KernelError::Collaborator("LLM call raised a simulated error".into()));
        }
        self.inner.invoke_text(request).await
    }
}

/// Geocoder faults are not part of the spec's named fault sites
/// (spec.md §4.12 lists tool timeout/error, bad retrieval, LLM error
/// only); this passthrough exists so the driver can wrap every
/// collaborator uniformly regardless of which sites are enabled.
pub struct PassthroughGeocoder {
    inner: Arc<dyn Geocoder>,
}

impl PassthroughGeocoder {
    pub fn new(inner: Arc<dyn Geocoder>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Geocoder for PassthroughGeocoder {
    async fn geocode(&self, place: &str) -> KernelResult<GeocodeOutcome> {
        self.inner.geocode(place).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::LinkBuilderTools;
    use crate::fault::FaultConfig;

    #[tokio::test]
    async fn enabled_tool_error_site_always_fails_the_call() {
        let injector = Arc::new(
            FaultInjector::new(1).with_site(FaultSite::ToolError, FaultConfig { enabled: true, probability: 1.0 }),
        );
        let tools = FaultyToolRegistry::new(Arc::new(LinkBuilderTools), injector);
        let result = tools.call("flights_search_links", &serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn disabled_injector_passes_through() {
        let injector = Arc::new(FaultInjector::disabled());
        let tools = FaultyToolRegistry::new(Arc::new(LinkBuilderTools), injector);
        let result = tools.call("flights_search_links", &serde_json::json!({"origin": "SFO", "destination": "Tokyo"})).await;
        assert!(result.is_ok());
    }
}
