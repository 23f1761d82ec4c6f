//! Default in-process memory store: an in-memory document list with a
//! term-overlap similarity search, standing in for a real vector store
//! (SPEC_FULL.md §4 Non-goals). Grounded in the teacher's
//! `mofa-kernel/src/rag` shapes (`SearchResult`, `DocumentChunk`).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;
use wayfarer_kernel::collaborators::{MemoryDocument, MemoryQuery, MemoryStore};
use wayfarer_kernel::error::KernelResult;
use wayfarer_kernel::state::ContextHit;

#[derive(Clone)]
struct StoredDoc {
    id: String,
    text: String,
    scope: Scope,
    metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    Session,
    User,
}

/// In-memory document store with naive token-overlap scoring.
pub struct InMemoryMemoryStore {
    docs: Mutex<Vec<StoredDoc>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
        }
    }

    /// Seed a user-scoped fact directly (used by the CLI driver / tests
    /// to establish a profile without going through `add_user`).
    pub fn seed_user_fact(&self, text: impl Into<String>, metadata: HashMap<&'static str, &'static str>) {
        let mut map = serde_json::Map::new();
        for (k, v) in metadata {
            map.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        self.docs.lock().push(StoredDoc {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            scope: Scope::User,
            metadata: map,
        });
    }

    fn score(query: &str, text: &str) -> f32 {
        let q: std::collections::HashSet<String> =
            query.to_lowercase().split_whitespace().map(str::to_string).collect();
        if q.is_empty() {
            return 1.0;
        }
        let t: std::collections::HashSet<String> =
            text.to_lowercase().split_whitespace().map(str::to_string).collect();
        let overlap = q.intersection(&t).count() as f32;
        1.0 - (overlap / q.len() as f32)
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn add_session(&self, doc: MemoryDocument) -> KernelResult<String> {
        let id = Uuid::new_v4().to_string();
        self.docs.lock().push(StoredDoc {
            id: id.clone(),
            text: doc.text,
            scope: Scope::Session,
            metadata: doc.metadata,
        });
        Ok(id)
    }

    async fn add_user(&self, doc: MemoryDocument) -> KernelResult<String> {
        let id = Uuid::new_v4().to_string();
        self.docs.lock().push(StoredDoc {
            id: id.clone(),
            text: doc.text,
            scope: Scope::User,
            metadata: doc.metadata,
        });
        Ok(id)
    }

    async fn search(&self, query: MemoryQuery) -> KernelResult<Vec<ContextHit>> {
        let docs = self.docs.lock();
        let mut scored: Vec<(f32, &StoredDoc)> = docs
            .iter()
            .filter(|d| match d.scope {
                Scope::Session => query.include_session,
                Scope::User => query.include_user,
            })
            .map(|d| (Self::score(&query.query, &d.text), d))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        Ok(scored
            .into_iter()
            .take(query.k)
            .map(|(distance, d)| ContextHit {
                id: d.id.clone(),
                text: d.text.clone(),
                metadata: d.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                distance,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_kernel::collaborators::DocType;

    #[tokio::test]
    async fn search_ranks_overlapping_text_first() {
        let store = InMemoryMemoryStore::new();
        store
            .add_session(MemoryDocument {
                text: "user loves ramen and gardens".into(),
                run_id: "r1".into(),
                doc_type: DocType::Preference,
                metadata: serde_json::Map::new(),
            })
            .await
            .unwrap();
        store
            .add_session(MemoryDocument {
                text: "totally unrelated note about spreadsheets".into(),
                run_id: "r1".into(),
                doc_type: DocType::Note,
                metadata: serde_json::Map::new(),
            })
            .await
            .unwrap();

        let hits = store
            .search(MemoryQuery {
                query: "ramen gardens".into(),
                k: 5,
                include_session: true,
                include_user: true,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].text.contains("ramen"));
    }

    #[tokio::test]
    async fn respects_scope_filters() {
        let store = InMemoryMemoryStore::new();
        store.seed_user_fact("Home origin: SFO", HashMap::from([("type", "profile")]));
        let hits = store
            .search(MemoryQuery {
                query: "origin".into(),
                k: 5,
                include_session: true,
                include_user: false,
            })
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
