//! Prompt types for ragchat.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML or taken from the built-ins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// System message template (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// User message template with Handlebars syntax
    pub template: String,
}

/// One answered question/answer pair of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A retrieved chunk as it appears in the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDocument {
    /// Source label shown to the model (e.g., "expenses.txt#3")
    pub source: String,

    /// Chunk text
    pub text: String,
}

/// Values substituted into a prompt template.
#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    pub question: String,
    pub context: Vec<ContextDocument>,
    pub history: Vec<ConversationTurn>,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuiltPromptMetadata {
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    #[serde(rename = "contextDocuments")]
    pub context_documents: usize,

    #[serde(rename = "historyTurnsIncluded")]
    pub history_turns_included: usize,

    /// Oldest turns left out to respect the character budget
    #[serde(rename = "historyTurnsDropped")]
    pub history_turns_dropped: usize,

    /// Characters in system + user messages
    #[serde(rename = "charCount")]
    pub char_count: usize,

    /// True when the prompt still exceeds the budget with no history left
    #[serde(rename = "overBudget")]
    pub over_budget: bool,
}

impl BuiltPrompt {
    /// Total characters sent to the model.
    pub fn char_count(&self) -> usize {
        self.user.chars().count() + self.system.as_deref().map_or(0, |s| s.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: rag.answer.custom
title: Custom answer prompt
apiVersion: "1.0"
system: "Answer in Japanese."
template: "{{question}}"
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "rag.answer.custom");
        assert_eq!(def.system.as_deref(), Some("Answer in Japanese."));
        assert_eq!(def.template, "{{question}}");
    }

    #[test]
    fn test_system_is_optional() {
        let yaml = "id: x.y\ntitle: X\napiVersion: \"1.0\"\ntemplate: \"{{question}}\"\n";
        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.system.is_none());
    }

    #[test]
    fn test_built_prompt_char_count() {
        let built = BuiltPrompt {
            system: Some("abc".to_string()),
            user: "経費コード".to_string(),
            metadata: BuiltPromptMetadata {
                source_prompt_id: "t".to_string(),
                context_documents: 0,
                history_turns_included: 0,
                history_turns_dropped: 0,
                char_count: 0,
                over_budget: false,
            },
        };
        assert_eq!(built.char_count(), 8);
    }
}
