//! In-process vector index.
//!
//! Exhaustive cosine search over namespaced entries held in memory. Nothing
//! is persisted, so it suits tests and single-process sessions.

use crate::types::{IndexEntry, ScoredEntry};
use crate::vector_index::{cosine_similarity, rank, VectorIndex};
use ragchat_core::{AppError, AppResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory vector index with a fixed dimension.
pub struct InMemoryIndex {
    dimensions: usize,
    namespaces: RwLock<HashMap<String, Vec<IndexEntry>>>,
}

impl InMemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    fn check_dimensions(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.dimensions {
            return Err(AppError::VectorStore(format!(
                "Vector dimension mismatch: index has {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorIndex for InMemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> AppResult<()> {
        for entry in entries {
            self.check_dimensions(&entry.vector)?;
        }

        let mut namespaces = self.namespaces.write().await;
        let stored = namespaces.entry(namespace.to_string()).or_default();

        for entry in entries {
            match stored.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => stored.push(entry.clone()),
            }
        }

        tracing::debug!(
            "Upserted {} entries into namespace '{}' ({} total)",
            entries.len(),
            namespace,
            stored.len()
        );
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<ScoredEntry>> {
        self.check_dimensions(vector)?;

        let namespaces = self.namespaces.read().await;
        let Some(stored) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let hits = stored
            .iter()
            .map(|entry| ScoredEntry {
                id: entry.id.clone(),
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();

        Ok(rank(hits, top_k))
    }

    async fn count(&self, namespace: &str) -> AppResult<u64> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).map_or(0, |s| s.len() as u64))
    }
}
