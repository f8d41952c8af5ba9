//! Vector index abstraction for knowledge chunks.
//!
//! Defines a narrow async trait for namespaced vector storage and retrieval
//! so the pipelines never depend on a particular vector database.

use crate::config::{Credentials, KnowledgeBaseConfig, VectorBackend};
use crate::lancedb_index::LanceDbIndex;
use crate::memory_index::InMemoryIndex;
use crate::pinecone_index::PineconeIndex;
use crate::types::{IndexEntry, ScoredEntry};
use crate::weaviate_index::WeaviateIndex;
use ragchat_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// Trait for vector index backends.
///
/// Every operation is scoped to a namespace. Entry uniqueness is whatever the
/// backend does with ids: writing an existing id replaces that entry, fresh
/// ids append.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name (e.g., "pinecone", "memory")
    fn backend_name(&self) -> &str;

    /// Insert or replace entries in a namespace.
    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> AppResult<()>;

    /// Return the `top_k` entries most similar to `vector`.
    ///
    /// Results are ordered by descending score and hold `min(top_k, count)`
    /// entries. An empty or unknown namespace yields an empty list.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<ScoredEntry>>;

    /// Number of entries stored in a namespace.
    async fn count(&self, namespace: &str) -> AppResult<u64>;
}

/// Create the index backend selected by the knowledge base config.
///
/// Remote indexes must already exist; local backends create their storage
/// on first use.
pub async fn create_index(
    config: &KnowledgeBaseConfig,
    credentials: &Credentials,
    workspace: &Path,
) -> AppResult<Arc<dyn VectorIndex>> {
    let dimensions = config.embedding.dimensions;

    tracing::debug!(
        "Opening {} index '{}' ({} dimensions)",
        config.vector_store.backend,
        config.index_name,
        dimensions
    );

    match config.vector_store.backend {
        VectorBackend::Memory => Ok(Arc::new(InMemoryIndex::new(dimensions))),

        VectorBackend::Lancedb => {
            let path = config.lancedb_path(workspace);
            let index = LanceDbIndex::new(&path, &config.index_name, dimensions).await?;
            Ok(Arc::new(index))
        }

        VectorBackend::Pinecone => {
            let api_key = credentials.pinecone_api_key.as_deref().ok_or_else(|| {
                AppError::Config("PINECONE_API_KEY is required for the pinecone backend".to_string())
            })?;
            let index = PineconeIndex::connect(
                &config.index_name,
                api_key,
                config.pinecone_host(credentials).as_deref(),
                &config.vector_store.pinecone_api_url,
            )
            .await?;
            Ok(Arc::new(index))
        }

        VectorBackend::Weaviate => {
            let url = config.weaviate_url(credentials).ok_or_else(|| {
                AppError::Config("WEAVIATE_URL is required for the weaviate backend".to_string())
            })?;
            let index = WeaviateIndex::new(
                &url,
                credentials.weaviate_api_key.as_deref(),
                &config.vector_store.weaviate_class,
                &config.vector_store.weaviate_text_key,
            )?;
            Ok(Arc::new(index))
        }
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Sort hits by descending score and keep the first `top_k`.
pub(crate) fn rank(mut hits: Vec<ScoredEntry>, top_k: usize) -> Vec<ScoredEntry> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);
    hits
}

/// Split an entry's metadata back out of a flat backend record.
pub(crate) fn metadata_object(value: Option<serde_json::Value>) -> serde_json::Value {
    match value {
        Some(v @ serde_json::Value::Object(_)) => v,
        _ => serde_json::json!({}),
    }
}
