//! End-to-end ingestion and question answering over the in-memory index.

use crate::config::{ChunkStrategy, IdStrategy, KnowledgeBaseConfig, VectorBackend};
use crate::embeddings::providers::MockProvider;
use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use crate::memory_index::InMemoryIndex;
use crate::rag::{Conversation, RagPipeline, RagSettings};
use crate::types::{IndexEntry, IngestOptions, ScoredEntry};
use crate::vector_index::VectorIndex;
use crate::{ingest, KnowledgeContext};
use ragchat_core::{AppError, AppResult};
use ragchat_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const TRAVEL_TEXT: &str = "Travel expense codes include: Airfare (code 100), Hotel (code 200).";
const DIMENSIONS: usize = 128;

/// LLM stub that replays scripted replies and records every request.
struct ScriptedLlm {
    replies: Mutex<VecDeque<AppResult<String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<AppResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Llm("no scripted reply left".to_string())));

        reply.map(|content| LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(10, 5),
        })
    }
}

/// Mock embeddings that fail on one numbered `embed_batch` call.
#[derive(Debug)]
struct FlakyEmbedder {
    inner: MockProvider,
    fail_on_call: usize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    fn provider_name(&self) -> &str {
        "flaky"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_call {
            return Err(AppError::Embedding("service unavailable".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}

/// In-memory index whose writes or reads can be made to fail.
struct FaultyIndex {
    inner: InMemoryIndex,
    fail_upsert: bool,
    fail_query: bool,
}

#[async_trait::async_trait]
impl VectorIndex for FaultyIndex {
    fn backend_name(&self) -> &str {
        "faulty"
    }

    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> AppResult<()> {
        if self.fail_upsert {
            return Err(AppError::VectorStore("write rejected".to_string()));
        }
        self.inner.upsert(namespace, entries).await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<ScoredEntry>> {
        if self.fail_query {
            return Err(AppError::VectorStore("index unreachable".to_string()));
        }
        self.inner.query(namespace, vector, top_k).await
    }

    async fn count(&self, namespace: &str) -> AppResult<u64> {
        self.inner.count(namespace).await
    }
}

fn travel_config() -> KnowledgeBaseConfig {
    let mut config = KnowledgeBaseConfig::default();
    config.index_name = "concur-index".to_string();
    config.namespace = "demo-html".to_string();
    config.document_path = "expenses.txt".into();
    config.chunk_size = 20;
    config.chunk_overlap = 5;
    config.chunk_strategy = ChunkStrategy::Window;
    config.top_k = 3;
    config.embedding = EmbeddingConfig::mock(DIMENSIONS);
    config.vector_store.backend = VectorBackend::Memory;
    config
}

fn travel_context(config: KnowledgeBaseConfig) -> (TempDir, KnowledgeContext) {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("expenses.txt"), TRAVEL_TEXT).unwrap();

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockProvider::new(DIMENSIONS));
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new(DIMENSIONS));
    let ctx = KnowledgeContext::new(workspace.path(), config, embedder, index);

    (workspace, ctx)
}

fn pipeline(ctx: &KnowledgeContext, llm: Arc<ScriptedLlm>) -> RagPipeline {
    let settings = RagSettings::from_config(&ctx.config, "gpt-3.5-turbo");
    RagPipeline::new(ctx.embedder.clone(), ctx.index.clone(), llm, settings).unwrap()
}

#[tokio::test]
async fn test_ingest_travel_document() {
    let (_workspace, ctx) = travel_context(travel_config());

    let stats = ingest(&ctx, &IngestOptions::default()).await.unwrap();

    assert_eq!(stats.documents_count, 1);
    assert_eq!(stats.chunks_count, 5);
    assert_eq!(stats.bytes_processed, TRAVEL_TEXT.len() as u64);
    assert_eq!(stats.namespace, "demo-html");
    assert_eq!(ctx.stats(None).await.unwrap().entries_count, 5);
}

#[tokio::test]
async fn test_ingest_namespace_override() {
    let (_workspace, ctx) = travel_context(travel_config());

    let options = IngestOptions {
        paths: Vec::new(),
        namespace: Some("travel".to_string()),
    };
    ingest(&ctx, &options).await.unwrap();

    assert_eq!(ctx.stats(Some("travel")).await.unwrap().entries_count, 5);
    assert_eq!(ctx.stats(None).await.unwrap().entries_count, 0);
}

#[tokio::test]
async fn test_repeated_ingest_with_random_ids_duplicates() {
    let (_workspace, ctx) = travel_context(travel_config());

    ingest(&ctx, &IngestOptions::default()).await.unwrap();
    ingest(&ctx, &IngestOptions::default()).await.unwrap();

    assert_eq!(ctx.stats(None).await.unwrap().entries_count, 10);
}

#[tokio::test]
async fn test_repeated_ingest_with_content_ids_replaces() {
    let mut config = travel_config();
    config.id_strategy = IdStrategy::Content;
    let (_workspace, ctx) = travel_context(config);

    ingest(&ctx, &IngestOptions::default()).await.unwrap();
    ingest(&ctx, &IngestOptions::default()).await.unwrap();

    assert_eq!(ctx.stats(None).await.unwrap().entries_count, 5);
}

#[tokio::test]
async fn test_ingest_empty_document_writes_nothing() {
    let (workspace, ctx) = travel_context(travel_config());
    let empty = workspace.path().join("empty.txt");
    std::fs::write(&empty, "").unwrap();

    let options = IngestOptions {
        paths: vec![empty],
        namespace: None,
    };
    let stats = ingest(&ctx, &options).await.unwrap();

    assert_eq!(stats.documents_count, 1);
    assert_eq!(stats.chunks_count, 0);
    assert_eq!(ctx.stats(None).await.unwrap().entries_count, 0);
}

#[tokio::test]
async fn test_ingest_missing_document_fails() {
    let (workspace, ctx) = travel_context(travel_config());

    let options = IngestOptions {
        paths: vec![workspace.path().join("missing.txt")],
        namespace: None,
    };

    assert!(matches!(
        ingest(&ctx, &options).await,
        Err(AppError::Knowledge(_))
    ));
    assert_eq!(ctx.stats(None).await.unwrap().entries_count, 0);
}

#[tokio::test]
async fn test_answer_uses_retrieved_chunks() {
    let (_workspace, ctx) = travel_context(travel_config());
    ingest(&ctx, &IngestOptions::default()).await.unwrap();

    let llm = ScriptedLlm::new(vec![Ok("The code for Hotel is 200.".to_string())]);
    let rag = pipeline(&ctx, llm.clone());
    let mut conversation = Conversation::new();

    let answer = rag
        .ask(&mut conversation, "What is the code for Hotel?")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(answer.answer, "The code for Hotel is 200.");
    assert_eq!(answer.sources.len(), 3);
    assert_eq!(answer.sources[0].filename, "expenses.txt");
    assert_eq!(answer.sources[0].chunk_index, Some(3));
    assert!(answer.sources[0].text.contains("Hotel (code 200"));
    for pair in answer.sources.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].temperature, Some(0.0));
    assert_eq!(requests[0].model, "gpt-3.5-turbo");
    assert!(requests[0].system.is_some());
    assert!(requests[0].prompt.contains("00), Hotel (code 200"));
    assert!(requests[0].prompt.contains("(expenses.txt#3)"));
    assert!(requests[0].prompt.contains("Question: What is the code for Hotel?"));

    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation.turns()[0].question, "What is the code for Hotel?");
    assert_eq!(conversation.turns()[0].answer, "The code for Hotel is 200.");
}

#[tokio::test]
async fn test_top_k_larger_than_namespace() {
    let mut config = travel_config();
    config.top_k = 10;
    let (_workspace, ctx) = travel_context(config);
    ingest(&ctx, &IngestOptions::default()).await.unwrap();

    let llm = ScriptedLlm::new(vec![Ok("200".to_string())]);
    let rag = pipeline(&ctx, llm);
    let mut conversation = Conversation::new();

    let answer = rag
        .ask(&mut conversation, "Hotel code?")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(answer.sources.len(), 5);
}

#[tokio::test]
async fn test_empty_namespace_answers_without_context() {
    let (_workspace, ctx) = travel_context(travel_config());

    let llm = ScriptedLlm::new(vec![Ok("I don't know.".to_string())]);
    let rag = pipeline(&ctx, llm.clone());
    let mut conversation = Conversation::new();

    let answer = rag
        .ask(&mut conversation, "What is the code for Hotel?")
        .await
        .unwrap()
        .unwrap();

    assert!(answer.sources.is_empty());
    assert_eq!(answer.prompt.context_documents, 0);
    assert!(llm.requests()[0]
        .prompt
        .contains("No document context was retrieved"));
    assert_eq!(conversation.len(), 1);
}

#[tokio::test]
async fn test_blank_question_is_ignored() {
    let (_workspace, ctx) = travel_context(travel_config());

    let llm = ScriptedLlm::new(Vec::new());
    let rag = pipeline(&ctx, llm.clone());
    let mut conversation = Conversation::new();

    assert!(rag.ask(&mut conversation, "   \n").await.unwrap().is_none());
    assert!(llm.requests().is_empty());
    assert!(conversation.is_empty());
}

#[tokio::test]
async fn test_failed_completion_leaves_history_unchanged() {
    let (_workspace, ctx) = travel_context(travel_config());
    ingest(&ctx, &IngestOptions::default()).await.unwrap();

    let llm = ScriptedLlm::new(vec![
        Ok("The code for Hotel is 200.".to_string()),
        Err(AppError::Llm("rate limited".to_string())),
    ]);
    let rag = pipeline(&ctx, llm);
    let mut conversation = Conversation::new();

    rag.ask(&mut conversation, "What is the code for Hotel?")
        .await
        .unwrap();
    let before = conversation.clone();

    let result = rag.ask(&mut conversation, "And for Airfare?").await;

    assert!(matches!(result, Err(AppError::Llm(_))));
    assert_eq!(conversation, before);
}

#[tokio::test]
async fn test_history_is_sent_with_follow_up() {
    let (_workspace, ctx) = travel_context(travel_config());
    ingest(&ctx, &IngestOptions::default()).await.unwrap();

    let llm = ScriptedLlm::new(vec![
        Ok("The code for Hotel is 200.".to_string()),
        Ok("Airfare is code 100.".to_string()),
    ]);
    let rag = pipeline(&ctx, llm.clone());
    let mut conversation = Conversation::new();

    rag.ask(&mut conversation, "What is the code for Hotel?")
        .await
        .unwrap();
    let answer = rag
        .ask(&mut conversation, "And for Airfare?")
        .await
        .unwrap()
        .unwrap();

    assert!(answer.standalone_question.is_none());
    assert_eq!(answer.prompt.history_turns_included, 1);
    assert_eq!(conversation.len(), 2);

    let follow_up = &llm.requests()[1].prompt;
    assert!(follow_up.contains("Human: What is the code for Hotel?"));
    assert!(follow_up.contains("Assistant: The code for Hotel is 200."));
    assert!(follow_up.contains("Question: And for Airfare?"));
}

#[tokio::test]
async fn test_condensed_question_drives_retrieval() {
    let mut config = travel_config();
    config.condense_question = true;
    let (_workspace, ctx) = travel_context(config);
    ingest(&ctx, &IngestOptions::default()).await.unwrap();

    let llm = ScriptedLlm::new(vec![
        Ok("The code for Hotel is 200.".to_string()),
        Ok("What is the code for Airfare?".to_string()),
        Ok("Airfare is code 100.".to_string()),
    ]);
    let rag = pipeline(&ctx, llm.clone());
    let mut conversation = Conversation::new();

    rag.ask(&mut conversation, "What is the code for Hotel?")
        .await
        .unwrap();
    let answer = rag
        .ask(&mut conversation, "And for Airfare?")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        answer.standalone_question.as_deref(),
        Some("What is the code for Airfare?")
    );

    let requests = llm.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[1].prompt.contains("Follow Up Input: And for Airfare?"));
    assert!(requests[2]
        .prompt
        .contains("Question: What is the code for Airfare?"));

    // History records what the user actually asked
    assert_eq!(conversation.turns()[1].question, "And for Airfare?");
}

#[tokio::test]
async fn test_over_budget_prompt_drops_oldest_history() {
    let mut config = travel_config();
    config.max_prompt_chars = 900;
    let (_workspace, ctx) = travel_context(config);
    ingest(&ctx, &IngestOptions::default()).await.unwrap();

    let long_answer = "Hotel stays are booked under code 200. ".repeat(8);
    let llm = ScriptedLlm::new(vec![
        Ok(long_answer.clone()),
        Ok(long_answer),
        Ok("Airfare is code 100.".to_string()),
    ]);
    let rag = pipeline(&ctx, llm);
    let mut conversation = Conversation::new();

    rag.ask(&mut conversation, "What is the code for Hotel?")
        .await
        .unwrap();
    rag.ask(&mut conversation, "Which code covers Hotel stays?")
        .await
        .unwrap();
    let answer = rag
        .ask(&mut conversation, "And for Airfare?")
        .await
        .unwrap()
        .unwrap();

    assert!(answer.prompt.history_turns_dropped >= 1);
    assert_eq!(answer.prompt.context_documents, 3);
    assert_eq!(conversation.len(), 3);
}

#[tokio::test]
async fn test_embedding_failure_aborts_ingest() {
    let mut config = travel_config();
    config.embedding.batch_size = 2;
    let (_workspace, ctx) = travel_context(config);

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FlakyEmbedder {
        inner: MockProvider::new(DIMENSIONS),
        fail_on_call: 2,
        calls: AtomicUsize::new(0),
    });
    let ctx = KnowledgeContext::new(
        ctx.workspace.clone(),
        ctx.config.clone(),
        embedder,
        ctx.index.clone(),
    );

    let result = ingest(&ctx, &IngestOptions::default()).await;

    assert!(matches!(result, Err(AppError::Embedding(_))));
    assert_eq!(ctx.stats(None).await.unwrap().entries_count, 0);
}

#[tokio::test]
async fn test_index_write_failure_aborts_ingest() {
    let (_workspace, ctx) = travel_context(travel_config());

    let index: Arc<dyn VectorIndex> = Arc::new(FaultyIndex {
        inner: InMemoryIndex::new(DIMENSIONS),
        fail_upsert: true,
        fail_query: false,
    });
    let ctx = KnowledgeContext::new(
        ctx.workspace.clone(),
        ctx.config.clone(),
        ctx.embedder.clone(),
        index,
    );

    let result = ingest(&ctx, &IngestOptions::default()).await;

    assert!(matches!(result, Err(AppError::VectorStore(_))));
    assert_eq!(ctx.stats(None).await.unwrap().entries_count, 0);
}

#[tokio::test]
async fn test_failed_retrieval_leaves_history_unchanged() {
    let (_workspace, ctx) = travel_context(travel_config());
    ingest(&ctx, &IngestOptions::default()).await.unwrap();

    let llm = ScriptedLlm::new(vec![Ok("The code for Hotel is 200.".to_string())]);
    let working = pipeline(&ctx, llm.clone());
    let mut conversation = Conversation::new();
    working
        .ask(&mut conversation, "What is the code for Hotel?")
        .await
        .unwrap();
    let before = conversation.clone();

    let index: Arc<dyn VectorIndex> = Arc::new(FaultyIndex {
        inner: InMemoryIndex::new(DIMENSIONS),
        fail_upsert: false,
        fail_query: true,
    });
    let settings = RagSettings::from_config(&ctx.config, "gpt-3.5-turbo");
    let broken = RagPipeline::new(ctx.embedder.clone(), index, llm.clone(), settings).unwrap();

    let result = broken.ask(&mut conversation, "And for Airfare?").await;

    assert!(matches!(result, Err(AppError::VectorStore(_))));
    assert_eq!(conversation, before);
    // Retrieval failed before generation
    assert_eq!(llm.requests().len(), 1);
}
