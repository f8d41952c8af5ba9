//! Knowledge base management for ragchat.
//!
//! Ingests documents into a namespaced vector index and answers questions
//! over them with retrieved context.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod lancedb_index;
pub mod memory_index;
pub mod parser;
pub mod pinecone_index;
pub mod rag;
pub mod types;
pub mod vector_index;
pub mod weaviate_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{Credentials, KnowledgeBaseConfig, VectorBackend};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use ingest::ingest;
pub use rag::{Conversation, RagAnswer, RagPipeline, RagSettings, SourceRef};
pub use types::{Document, IngestOptions, IngestStats, NamespaceStats, ScoredEntry};
pub use vector_index::{create_index, VectorIndex};

use ragchat_core::AppResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An opened knowledge base: its config plus live embedding and index handles.
#[derive(Clone)]
pub struct KnowledgeContext {
    pub workspace: PathBuf,
    pub config: KnowledgeBaseConfig,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
}

impl KnowledgeContext {
    pub fn new(
        workspace: impl Into<PathBuf>,
        config: KnowledgeBaseConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            config,
            embedder,
            index,
        }
    }

    /// Validate the config and connect to the configured services.
    ///
    /// Fails before any network traffic when a required credential or
    /// setting is missing.
    pub async fn open(
        workspace: &Path,
        config: KnowledgeBaseConfig,
        credentials: &Credentials,
    ) -> AppResult<Self> {
        config.validate(credentials)?;

        let embedder = create_provider(&config.embedding, credentials)?;
        let index = create_index(&config, credentials, workspace).await?;

        tracing::info!(
            "Opened knowledge base '{}' ({} index '{}', {} embeddings)",
            config.name,
            index.backend_name(),
            config.index_name,
            embedder.model_name()
        );

        Ok(Self::new(workspace, config, embedder, index))
    }

    /// Entry count for a namespace, the configured one when `None`.
    pub async fn stats(&self, namespace: Option<&str>) -> AppResult<NamespaceStats> {
        let namespace = namespace.unwrap_or(&self.config.namespace);
        let entries_count = self.index.count(namespace).await?;

        Ok(NamespaceStats {
            backend: self.index.backend_name().to_string(),
            index_name: self.config.index_name.clone(),
            namespace: namespace.to_string(),
            entries_count,
        })
    }
}
