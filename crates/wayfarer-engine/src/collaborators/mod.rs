//! Default in-process collaborator implementations. None of these make
//! live network calls (SPEC_FULL.md §4 Non-goals) — they exist so the
//! graph runs end to end without external services.

pub mod faulty;
pub mod geocoder;
pub mod llm;
pub mod memory;
pub mod tools;

pub use faulty::{FaultyLlm, FaultyMemoryStore, FaultyToolRegistry, PassthroughGeocoder};
pub use geocoder::StaticGeocoder;
pub use llm::TemplateLlm;
pub use memory::InMemoryMemoryStore;
pub use tools::LinkBuilderTools;
