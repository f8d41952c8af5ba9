//! Text chunking with configurable size and overlap.
//!
//! Sizes and overlaps are counted in characters (Unicode scalar values), so
//! multi-byte text is never split inside a character.

use crate::config::{ChunkStrategy, KnowledgeBaseConfig};
use crate::types::{Chunk, Document};
use ragchat_core::{AppError, AppResult};

/// Chunking settings taken from the knowledge base config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub strategy: ChunkStrategy,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            strategy: ChunkStrategy::Window,
        }
    }

    pub fn with_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl From<&KnowledgeBaseConfig> for ChunkingConfig {
    fn from(config: &KnowledgeBaseConfig) -> Self {
        Self {
            chunk_size: config.chunk_size as usize,
            chunk_overlap: config.chunk_overlap as usize,
            strategy: config.chunk_strategy,
        }
    }
}

/// Splits text into chunk strings.
pub trait ChunkSplitter {
    fn split<'a>(&self, text: &'a str, config: &ChunkingConfig) -> AppResult<Vec<&'a str>>;
}

/// Fixed character window; consecutive chunks share `chunk_overlap` characters.
///
/// For N characters with N > O this yields ceil((N - O) / (L - O)) chunks,
/// and chunk 0 followed by every later chunk minus its first O characters
/// reproduces the text exactly. Non-empty text no longer than O still
/// yields one chunk.
pub struct WindowChunker;

impl ChunkSplitter for WindowChunker {
    fn split<'a>(&self, text: &'a str, config: &ChunkingConfig) -> AppResult<Vec<&'a str>> {
        config.validate()?;

        if text.is_empty() {
            return Ok(Vec::new());
        }

        // Byte offset of every character start, plus the end of the text
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let char_count = offsets.len();
        offsets.push(text.len());

        let step = config.chunk_size - config.chunk_overlap;
        let mut chunks = Vec::with_capacity(char_count / step + 1);
        let mut start = 0;

        loop {
            let end = (start + config.chunk_size).min(char_count);
            chunks.push(&text[offsets[start]..offsets[end]]);
            if end == char_count {
                break;
            }
            start += step;
        }

        Ok(chunks)
    }
}

/// Semantic splitting (paragraphs, then sentences, then words) backed by
/// the `text-splitter` crate. Chunks are trimmed and at most `chunk_size`
/// characters long.
pub struct RecursiveChunker;

impl ChunkSplitter for RecursiveChunker {
    fn split<'a>(&self, text: &'a str, config: &ChunkingConfig) -> AppResult<Vec<&'a str>> {
        config.validate()?;

        let splitter_config = text_splitter::ChunkConfig::new(config.chunk_size)
            .with_overlap(config.chunk_overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk settings: {}", e)))?;

        let splitter = text_splitter::TextSplitter::new(splitter_config);
        Ok(splitter
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .collect())
    }
}

/// Split a document into chunks with `{filename, chunk_index}` metadata.
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> AppResult<Vec<Chunk>> {
    let pieces = match config.strategy {
        ChunkStrategy::Window => WindowChunker.split(&document.text, config)?,
        ChunkStrategy::Recursive => RecursiveChunker.split(&document.text, config)?,
    };

    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            text: text.to_string(),
            source_filename: document.filename.clone(),
            chunk_index: i as u32,
            metadata: serde_json::json!({
                "filename": document.filename,
                "chunk_index": i,
            }),
        })
        .collect();

    tracing::debug!(
        "Chunked {} into {} chunks (size: {}, overlap: {}, strategy: {:?})",
        document.filename,
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap,
        config.strategy
    );

    Ok(chunks)
}
