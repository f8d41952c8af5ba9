//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A source document read from disk. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name used as the `filename` metadata of every chunk
    pub filename: String,

    /// Full path the document was read from
    pub path: PathBuf,

    /// Full text content
    pub text: String,
}

impl Document {
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            path: PathBuf::from(&filename),
            filename,
            text: text.into(),
        }
    }
}

/// A contiguous piece of a document produced by the chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,

    /// Name of the document this chunk came from
    pub source_filename: String,

    /// Zero-based position within the document
    pub chunk_index: u32,

    /// JSON object with at least `filename` and `chunk_index`
    pub metadata: serde_json::Value,
}

/// One record stored in a vector index namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: serde_json::Value,
}

/// One retrieval hit, most similar first within a result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,

    /// Similarity score (higher is more similar)
    pub score: f32,
}

impl ScoredEntry {
    /// `filename` metadata, if present.
    pub fn filename(&self) -> Option<&str> {
        self.metadata.get("filename").and_then(|v| v.as_str())
    }

    /// `chunk_index` metadata, if present.
    pub fn chunk_index(&self) -> Option<u64> {
        self.metadata.get("chunk_index").and_then(|v| v.as_u64())
    }
}

/// Options for an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Files or directories to ingest; the configured document path when empty
    pub paths: Vec<PathBuf>,

    /// Namespace override; the configured namespace when `None`
    pub namespace: Option<String>,
}

/// Statistics from a completed ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    /// Number of documents read
    pub documents_count: u32,

    /// Number of chunks embedded and upserted
    pub chunks_count: u32,

    /// Total bytes of text processed
    pub bytes_processed: u64,

    /// Duration in seconds
    pub duration_secs: f64,

    /// Index the entries were written to
    pub index_name: String,

    /// Namespace the entries were written to
    pub namespace: String,

    pub completed_at: DateTime<Utc>,
}

/// Entry count for one namespace of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub backend: String,
    pub index_name: String,
    pub namespace: String,
    pub entries_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scored_entry_metadata_accessors() {
        let entry = ScoredEntry {
            id: "a".to_string(),
            text: "00), Hotel (code 200".to_string(),
            metadata: serde_json::json!({"filename": "expenses.txt", "chunk_index": 3}),
            score: 0.9,
        };

        assert_eq!(entry.filename(), Some("expenses.txt"));
        assert_eq!(entry.chunk_index(), Some(3));
    }

    #[test]
    fn test_scored_entry_missing_metadata() {
        let entry = ScoredEntry {
            id: "a".to_string(),
            text: String::new(),
            metadata: serde_json::json!({}),
            score: 0.0,
        };

        assert_eq!(entry.filename(), None);
        assert_eq!(entry.chunk_index(), None);
    }
}
