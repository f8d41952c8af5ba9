//! Conversation state for the query pipeline.

use ragchat_prompt::ConversationTurn;
use serde::{Deserialize, Serialize};

/// Ordered, append-only history of answered questions.
///
/// Owned by the caller (one per interactive session) and passed to
/// [`crate::rag::RagPipeline::ask`], which appends a turn only when an
/// answer was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Forget every turn, as when a new session starts.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
