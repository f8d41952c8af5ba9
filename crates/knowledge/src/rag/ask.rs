//! RAG answering orchestration.
//!
//! Retrieves relevant chunks and generates natural language answers via LLM.

use crate::config::KnowledgeBaseConfig;
use crate::embeddings::EmbeddingProvider;
use crate::rag::session::Conversation;
use crate::rag::types::{RagAnswer, SourceRef};
use crate::types::ScoredEntry;
use crate::vector_index::VectorIndex;
use crate::KnowledgeContext;
use ragchat_core::{AppError, AppResult};
use ragchat_llm::{LlmClient, LlmRequest};
use ragchat_prompt::{
    build_prompt, builtin_prompt, load_prompt, ContextDocument, ConversationTurn,
    PromptDefinition, PromptInputs, ANSWER_PROMPT_ID, CONDENSE_PROMPT_ID,
};
use std::sync::Arc;

/// Query pipeline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RagSettings {
    /// Namespace to retrieve from
    pub namespace: String,

    /// Number of chunks retrieved per question
    pub top_k: usize,

    /// Language model used for answers
    pub model: String,

    /// Character budget for the rendered prompt
    pub max_prompt_chars: usize,

    /// Rewrite follow-ups into standalone questions before retrieval
    pub condense_question: bool,

    /// Completion length cap, provider default when `None`
    pub max_tokens: Option<u32>,
}

impl RagSettings {
    pub fn from_config(config: &KnowledgeBaseConfig, model: impl Into<String>) -> Self {
        Self {
            namespace: config.namespace.clone(),
            top_k: config.top_k as usize,
            model: model.into(),
            max_prompt_chars: config.max_prompt_chars as usize,
            condense_question: config.condense_question,
            max_tokens: None,
        }
    }
}

/// Retrieve, augment, generate.
///
/// Holds no conversation state; history lives in the [`Conversation`]
/// passed to [`RagPipeline::ask`].
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmClient>,
    settings: RagSettings,
    answer_prompt: PromptDefinition,
    condense_prompt: PromptDefinition,
}

impl RagPipeline {
    /// Create a pipeline using the built-in prompts.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        settings: RagSettings,
    ) -> AppResult<Self> {
        let builtin = |id: &str| {
            builtin_prompt(id)
                .ok_or_else(|| AppError::Prompt(format!("Missing built-in prompt: {}", id)))
        };

        Ok(Self {
            embedder,
            index,
            llm,
            settings,
            answer_prompt: builtin(ANSWER_PROMPT_ID)?,
            condense_prompt: builtin(CONDENSE_PROMPT_ID)?,
        })
    }

    /// Create a pipeline over an opened knowledge base, honoring workspace
    /// prompt overrides.
    pub fn from_context(
        ctx: &KnowledgeContext,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
    ) -> AppResult<Self> {
        let settings = RagSettings::from_config(&ctx.config, model);
        let pipeline = Self::new(ctx.embedder.clone(), ctx.index.clone(), llm, settings)?;

        Ok(pipeline.with_prompts(
            load_prompt(&ctx.workspace, ANSWER_PROMPT_ID)?,
            load_prompt(&ctx.workspace, CONDENSE_PROMPT_ID)?,
        ))
    }

    pub fn with_prompts(mut self, answer: PromptDefinition, condense: PromptDefinition) -> Self {
        self.answer_prompt = answer;
        self.condense_prompt = condense;
        self
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RagSettings {
        &mut self.settings
    }

    /// Embed the question and fetch the `top_k` nearest chunks.
    pub async fn retrieve(&self, question: &str) -> AppResult<Vec<ScoredEntry>> {
        let query_embedding = self.embedder.embed(question).await?;

        if query_embedding.len() != self.embedder.dimensions() {
            return Err(AppError::Embedding(format!(
                "Query embedding has {} dimensions, expected {}",
                query_embedding.len(),
                self.embedder.dimensions()
            )));
        }

        let hits = self
            .index
            .query(&self.settings.namespace, &query_embedding, self.settings.top_k)
            .await?;

        if hits.is_empty() {
            tracing::info!(
                "No chunks in namespace '{}'; answering without context",
                self.settings.namespace
            );
        } else {
            tracing::debug!(
                "Retrieved {} chunks (top score: {:.3})",
                hits.len(),
                hits[0].score
            );
        }

        Ok(hits)
    }

    /// Answer a question in the context of a conversation.
    ///
    /// A blank question returns `Ok(None)` without calling any service. On
    /// success the turn is appended to `conversation`; on any failure the
    /// conversation is left unchanged.
    pub async fn ask(
        &self,
        conversation: &mut Conversation,
        question: &str,
    ) -> AppResult<Option<RagAnswer>> {
        let question = question.trim();
        if question.is_empty() {
            tracing::debug!("Ignoring blank question");
            return Ok(None);
        }

        tracing::info!(
            "Answering question in namespace '{}' ({} prior turns)",
            self.settings.namespace,
            conversation.len()
        );

        let standalone_question = if self.settings.condense_question && !conversation.is_empty() {
            Some(self.condense(conversation.turns(), question).await?)
        } else {
            None
        };
        let query = standalone_question.as_deref().unwrap_or(question);

        let hits = self.retrieve(query).await?;

        let inputs = PromptInputs {
            question: query.to_string(),
            context: hits.iter().map(context_document).collect(),
            history: conversation.turns().to_vec(),
        };
        let prompt = build_prompt(&self.answer_prompt, &inputs, self.settings.max_prompt_chars)?;

        let mut request = LlmRequest::new(prompt.user, &self.settings.model).with_temperature(0.0);
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.llm.complete(&request).await?;
        let answer = response.content.trim().to_string();

        tracing::info!(
            "Answer generated by {} ({} sources, {} tokens)",
            response.model,
            hits.len(),
            response.usage.total_tokens
        );

        conversation.push(ConversationTurn::new(question, answer.clone()));

        Ok(Some(RagAnswer {
            question: question.to_string(),
            standalone_question,
            answer,
            sources: hits.iter().map(SourceRef::from_entry).collect(),
            model: response.model,
            prompt: prompt.metadata,
        }))
    }

    /// Rewrite a follow-up question into a standalone one.
    async fn condense(&self, history: &[ConversationTurn], question: &str) -> AppResult<String> {
        let inputs = PromptInputs {
            question: question.to_string(),
            context: Vec::new(),
            history: history.to_vec(),
        };
        let prompt = build_prompt(&self.condense_prompt, &inputs, self.settings.max_prompt_chars)?;

        let mut request = LlmRequest::new(prompt.user, &self.settings.model).with_temperature(0.0);
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }

        let response = self.llm.complete(&request).await?;
        let standalone = response.content.trim();

        if standalone.is_empty() {
            return Ok(question.to_string());
        }

        tracing::debug!("Condensed question: {}", standalone);
        Ok(standalone.to_string())
    }
}

fn context_document(entry: &ScoredEntry) -> ContextDocument {
    ContextDocument {
        source: SourceRef::from_entry(entry).label(),
        text: entry.text.clone(),
    }
}
