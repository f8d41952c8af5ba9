//! Ingestion pipeline: load, chunk, embed, upsert.

use crate::chunker::{chunk_document, ChunkingConfig};
use crate::config::IdStrategy;
use crate::parser;
use crate::types::{Chunk, IndexEntry, IngestOptions, IngestStats};
use crate::KnowledgeContext;
use chrono::Utc;
use ragchat_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::time::Instant;

/// Ingest documents into the configured index namespace.
///
/// Every chunk gets exactly one embedding and one index entry. Any failure
/// aborts the run; entries already written by earlier upserts stay in the
/// index. Nothing is retried, and re-running with the `random` id strategy
/// appends a second copy of every entry.
pub async fn ingest(ctx: &KnowledgeContext, options: &IngestOptions) -> AppResult<IngestStats> {
    let start = Instant::now();
    let config = &ctx.config;
    let namespace = options
        .namespace
        .clone()
        .unwrap_or_else(|| config.namespace.clone());

    let paths = if options.paths.is_empty() {
        vec![config.resolve_document_path(&ctx.workspace)]
    } else {
        options.paths.clone()
    };

    tracing::info!(
        "Starting ingestion into {} index '{}' namespace '{}'",
        ctx.index.backend_name(),
        config.index_name,
        namespace
    );

    let documents = parser::load_documents(&paths)?;
    if documents.is_empty() {
        return Err(AppError::Knowledge(format!(
            "No documents found in {:?}",
            paths
        )));
    }

    let chunking = ChunkingConfig::from(config);
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut bytes_processed = 0u64;

    for document in &documents {
        bytes_processed += document.text.len() as u64;
        chunks.extend(chunk_document(document, &chunking)?);
    }

    let entries = embed_chunks(ctx, &chunks).await?;

    if !entries.is_empty() {
        ctx.index.upsert(&namespace, &entries).await?;
    }

    let duration = start.elapsed();

    tracing::info!(
        "Ingestion completed: {} documents, {} chunks, {} bytes in {:.2}s",
        documents.len(),
        entries.len(),
        bytes_processed,
        duration.as_secs_f64()
    );

    Ok(IngestStats {
        documents_count: documents.len() as u32,
        chunks_count: entries.len() as u32,
        bytes_processed,
        duration_secs: duration.as_secs_f64(),
        index_name: config.index_name.clone(),
        namespace,
        completed_at: Utc::now(),
    })
}

/// Embed chunks in batches of the configured size.
async fn embed_chunks(ctx: &KnowledgeContext, chunks: &[Chunk]) -> AppResult<Vec<IndexEntry>> {
    let batch_size = ctx.config.embedding.batch_size.max(1);
    let mut entries = Vec::with_capacity(chunks.len());

    for (batch_idx, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = ctx.embedder.embed_batch(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(AppError::Embedding(format!(
                "Embedding batch {} returned {} vectors for {} chunks",
                batch_idx,
                vectors.len(),
                batch.len()
            )));
        }

        tracing::debug!("Embedded batch {} ({} chunks)", batch_idx, batch.len());

        for (chunk, vector) in batch.iter().zip(vectors) {
            entries.push(IndexEntry {
                id: entry_id(ctx.config.id_strategy, chunk),
                vector,
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
            });
        }
    }

    Ok(entries)
}

/// Entry id for a chunk. Always UUID-formatted, which every backend accepts.
pub fn entry_id(strategy: IdStrategy, chunk: &Chunk) -> String {
    match strategy {
        IdStrategy::Random => uuid::Uuid::new_v4().to_string(),
        IdStrategy::Content => {
            let mut hasher = Sha256::new();
            hasher.update(chunk.source_filename.as_bytes());
            hasher.update([0u8]);
            hasher.update(chunk.chunk_index.to_be_bytes());
            hasher.update([0u8]);
            hasher.update(chunk.text.as_bytes());
            let digest = hasher.finalize();

            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&digest[..16]);
            // RFC 9562 version 8 (custom) with the standard variant
            bytes[6] = (bytes[6] & 0x0f) | 0x80;
            bytes[8] = (bytes[8] & 0x3f) | 0x80;
            uuid::Uuid::from_bytes(bytes).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(filename: &str, index: u32, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_filename: filename.to_string(),
            chunk_index: index,
            metadata: serde_json::json!({"filename": filename, "chunk_index": index}),
        }
    }

    #[test]
    fn test_random_ids_differ() {
        let c = chunk("expenses.txt", 0, "Travel expense codes");
        assert_ne!(
            entry_id(IdStrategy::Random, &c),
            entry_id(IdStrategy::Random, &c)
        );
    }

    #[test]
    fn test_content_ids_are_stable_uuids() {
        let c = chunk("expenses.txt", 3, "00), Hotel (code 200");
        let id = entry_id(IdStrategy::Content, &c);

        assert_eq!(id, entry_id(IdStrategy::Content, &c));
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn test_content_ids_depend_on_position_and_source() {
        let base = entry_id(IdStrategy::Content, &chunk("a.txt", 0, "same"));
        assert_ne!(base, entry_id(IdStrategy::Content, &chunk("a.txt", 1, "same")));
        assert_ne!(base, entry_id(IdStrategy::Content, &chunk("b.txt", 0, "same")));
        assert_ne!(base, entry_id(IdStrategy::Content, &chunk("a.txt", 0, "other")));
    }
}
