//! Ingest command handler.

use clap::Args;
use ragchat_core::{config::AppConfig, AppResult};
use ragchat_knowledge::config::{save_config, DEFAULT_BASE};
use ragchat_knowledge::{Credentials, IngestOptions, IngestStats};
use std::path::PathBuf;

/// Chunk, embed and upsert documents
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Documents or directories to ingest (default: the configured document_path)
    #[arg(long)]
    pub path: Vec<PathBuf>,

    /// Knowledge base name
    #[arg(short, long, default_value = DEFAULT_BASE)]
    pub base: String,

    /// Target namespace (default: the configured namespace)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig, credentials: &Credentials) -> AppResult<()> {
        tracing::info!("Executing ingest command for base '{}'", self.base);

        let ctx = super::open_base(config, credentials, &self.base).await?;

        let options = IngestOptions {
            paths: self.path.clone(),
            namespace: self.namespace.clone(),
        };

        let stats = ragchat_knowledge::ingest(&ctx, &options).await?;

        // Persist the settings the index was built with
        save_config(&config.workspace, &ctx.config)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            print_stats(&stats);
        }

        Ok(())
    }
}

pub(crate) fn print_stats(stats: &IngestStats) {
    println!(
        "Ingested {} documents ({} chunks, {} bytes) into '{}'/'{}' in {:.2}s",
        stats.documents_count,
        stats.chunks_count,
        stats.bytes_processed,
        stats.index_name,
        stats.namespace,
        stats.duration_secs
    );
}
