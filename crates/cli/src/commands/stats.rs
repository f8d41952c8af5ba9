//! Stats command handler.

use clap::Args;
use ragchat_core::{config::AppConfig, AppResult};
use ragchat_knowledge::config::DEFAULT_BASE;
use ragchat_knowledge::Credentials;

/// Show namespace statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Knowledge base name
    #[arg(short, long, default_value = DEFAULT_BASE)]
    pub base: String,

    /// Namespace to inspect (default: the configured namespace)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig, credentials: &Credentials) -> AppResult<()> {
        tracing::info!("Executing stats command for base '{}'", self.base);

        let ctx = super::open_base(config, credentials, &self.base).await?;
        let stats = ctx.stats(self.namespace.as_deref()).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Index: {} ({})", stats.index_name, stats.backend);
            println!("  Namespace: {}", stats.namespace);
            println!("  Entries: {}", stats.entries_count);
        }

        Ok(())
    }
}
