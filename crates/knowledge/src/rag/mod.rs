//! RAG (Retrieval-Augmented Generation) answering system.
//!
//! Answers questions over an ingested namespace, carrying conversation
//! history between turns.

pub mod ask;
pub mod session;
pub mod types;

pub use ask::{RagPipeline, RagSettings};
pub use session::Conversation;
pub use types::{RagAnswer, SourceRef};
