//! Command handlers for the ragchat CLI.
//!
//! Each command lives in its own submodule; the helpers below open the
//! knowledge base and the language model the same way for all of them.

pub mod ask;
pub mod chat;
pub mod debug;
pub mod ingest;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use debug::DebugCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;

use ragchat_core::{config::AppConfig, AppError, AppResult};
use ragchat_knowledge::config::load_config;
use ragchat_knowledge::{Credentials, KnowledgeContext, RagPipeline};
use ragchat_llm::{create_client, LlmClient};
use std::sync::Arc;

/// Load a knowledge base config and connect to its services.
pub(crate) async fn open_base(
    config: &AppConfig,
    credentials: &Credentials,
    base: &str,
) -> AppResult<KnowledgeContext> {
    let kb_config = load_config(&config.workspace, base)?;
    KnowledgeContext::open(&config.workspace, kb_config, credentials).await
}

/// Create the LLM client for the active provider.
pub(crate) fn open_llm(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    config.validate()?;

    let endpoint = config.provider_endpoint();
    let api_key = config.resolve_api_key(&config.provider);

    create_client(&config.provider, endpoint.as_deref(), api_key.as_deref())
        .map_err(AppError::Config)
}

/// Build the query pipeline over an opened knowledge base.
pub(crate) fn open_pipeline(config: &AppConfig, ctx: &KnowledgeContext) -> AppResult<RagPipeline> {
    let llm = open_llm(config)?;
    RagPipeline::from_context(ctx, llm, &config.model)
}
