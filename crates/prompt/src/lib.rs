//! Prompt system for ragchat.
//!
//! - YAML prompt definitions with built-in defaults
//! - Handlebars template rendering
//! - Character budgeting that drops the oldest conversation turns first

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::build_prompt;
pub use loader::{builtin_prompt, list_prompts, load_prompt, ANSWER_PROMPT_ID, CONDENSE_PROMPT_ID};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, ContextDocument, ConversationTurn, PromptDefinition,
    PromptInputs,
};
