//! Ask command handler.
//!
//! One-shot question answering with an empty history.

use clap::Args;
use ragchat_core::{config::AppConfig, AppResult};
use ragchat_knowledge::config::DEFAULT_BASE;
use ragchat_knowledge::{Conversation, Credentials, IngestOptions, RagAnswer};

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Knowledge base name
    #[arg(short, long, default_value = DEFAULT_BASE)]
    pub base: String,

    /// Ingest the configured documents first (needed by the memory backend)
    #[arg(long)]
    pub ingest: bool,

    /// Maximum tokens in the answer
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig, credentials: &Credentials) -> AppResult<()> {
        tracing::info!("Executing ask command for base '{}'", self.base);

        let ctx = super::open_base(config, credentials, &self.base).await?;
        let mut pipeline = super::open_pipeline(config, &ctx)?;
        pipeline.settings_mut().max_tokens = self.max_tokens;

        if self.ingest {
            let stats = ragchat_knowledge::ingest(&ctx, &IngestOptions::default()).await?;
            tracing::info!("Ingested {} chunks before answering", stats.chunks_count);
        }

        let mut conversation = Conversation::new();
        let Some(answer) = pipeline.ask(&mut conversation, &self.question).await? else {
            tracing::warn!("Question is blank; nothing to ask");
            return Ok(());
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answer)?);
        } else {
            print_answer(&answer);
        }

        Ok(())
    }
}

/// Print an answer followed by the metadata of every retrieved chunk.
pub(crate) fn print_answer(answer: &RagAnswer) {
    println!("{}", answer.answer);
    println!();

    if answer.sources.is_empty() {
        println!("Sources: (no document context retrieved)");
        return;
    }

    println!("Sources:");
    for source in &answer.sources {
        println!("- {} (score {:.3})", source.label(), source.score);
        println!("  {}", source.snippet);
        println!("  metadata: {}", source.metadata);
    }
}
