//! RAG response types.

use crate::types::ScoredEntry;
use ragchat_prompt::BuiltPromptMetadata;
use serde::{Deserialize, Serialize};

/// Maximum snippet length for source references, in characters.
const MAX_SNIPPET_LENGTH: usize = 150;

/// A retrieved chunk used to answer a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source document name (e.g., "Exp_SG_Account_Codes-jp.txt")
    pub filename: String,

    /// Position of the chunk within its document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,

    /// Similarity score from the vector index
    pub score: f32,

    /// Short excerpt for display
    pub snippet: String,

    /// Full chunk text as retrieved
    pub text: String,

    /// Chunk metadata as stored in the index
    pub metadata: serde_json::Value,
}

impl SourceRef {
    pub fn from_entry(entry: &ScoredEntry) -> Self {
        Self {
            filename: entry.filename().unwrap_or("unknown").to_string(),
            chunk_index: entry.chunk_index(),
            score: entry.score,
            snippet: snippet(&entry.text),
            text: entry.text.clone(),
            metadata: entry.metadata.clone(),
        }
    }

    /// Human-readable location, e.g. "expenses.txt#3".
    pub fn label(&self) -> String {
        match self.chunk_index {
            Some(index) => format!("{}#{}", self.filename, index),
            None => self.filename.clone(),
        }
    }
}

fn snippet(text: &str) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= MAX_SNIPPET_LENGTH {
        return flattened;
    }

    let truncated: String = flattened.chars().take(MAX_SNIPPET_LENGTH).collect();
    format!("{}...", truncated.trim_end())
}

/// Answer to one question, with the chunks it was generated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    /// Question as asked
    pub question: String,

    /// Rewritten question used for retrieval, when condensing is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standalone_question: Option<String>,

    /// Answer generated by the language model
    pub answer: String,

    /// Retrieved chunks, most similar first
    pub sources: Vec<SourceRef>,

    /// Model that generated the answer
    pub model: String,

    /// How the prompt was assembled
    pub prompt: BuiltPromptMetadata,
}
