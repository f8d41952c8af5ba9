//! Debug command handler.
//!
//! Prints the resolved configuration without contacting any service.

use clap::Args;
use ragchat_core::{config::AppConfig, AppResult};
use ragchat_knowledge::config::{load_config, DEFAULT_BASE};
use ragchat_knowledge::embeddings::config::SUPPORTED_PROVIDERS;
use ragchat_knowledge::Credentials;
use ragchat_prompt::list_prompts;

const VECTOR_BACKENDS: &[&str] = &["pinecone", "weaviate", "lancedb", "memory"];
const LLM_PROVIDERS: &[&str] = &["openai", "ollama"];

/// Show resolved configuration
#[derive(Args, Debug)]
pub struct DebugCommand {
    /// Knowledge base name
    #[arg(short, long, default_value = DEFAULT_BASE)]
    pub base: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DebugCommand {
    pub fn execute(&self, config: &AppConfig, credentials: &Credentials) -> AppResult<()> {
        tracing::info!("Executing debug command for base '{}'", self.base);

        let kb_config = load_config(&config.workspace, &self.base)?;
        let config_errors = kb_config.validate(credentials).err().map(|e| e.to_string());
        let prompt_overrides = list_prompts(&config.workspace)?;
        let llm_key = match config.resolve_api_key(&config.provider) {
            Some(_) => "<set>",
            None => "<unset>",
        };

        let output = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspace": config.workspace,
            "llm": {
                "provider": config.provider,
                "model": config.model,
                "endpoint": config.provider_endpoint(),
                "apiKey": llm_key,
            },
            "knowledgeBase": kb_config,
            "promptOverrides": prompt_overrides,
            "credentials": credentials.redacted(),
            "supported": {
                "llmProviders": LLM_PROVIDERS,
                "embeddingProviders": SUPPORTED_PROVIDERS,
                "vectorBackends": VECTOR_BACKENDS,
            },
            "configError": config_errors,
        });

        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print!("{}", serde_yaml::to_string(&output)?);
        }

        Ok(())
    }
}
