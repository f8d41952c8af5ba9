//! Chat command handler.
//!
//! Line-oriented interactive session. History lives for the session only.

use anyhow::Context;
use clap::Args;
use ragchat_core::{config::AppConfig, AppError, AppResult};
use ragchat_knowledge::config::DEFAULT_BASE;
use ragchat_knowledge::{Conversation, Credentials, IngestOptions, RagPipeline};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive chat session
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Knowledge base name
    #[arg(short, long, default_value = DEFAULT_BASE)]
    pub base: String,

    /// Ingest the configured documents first (needed by the memory backend)
    #[arg(long)]
    pub ingest: bool,
}

/// What a line of input asks the session to do.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Blank,
    Reset,
    Exit,
    Question(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Blank,
        "/reset" => Input::Reset,
        "/exit" | "/quit" => Input::Exit,
        question => Input::Question(question),
    }
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig, credentials: &Credentials) -> AppResult<()> {
        tracing::info!("Executing chat command for base '{}'", self.base);

        let ctx = super::open_base(config, credentials, &self.base).await?;
        let pipeline = super::open_pipeline(config, &ctx)?;

        if self.ingest {
            let stats = ragchat_knowledge::ingest(&ctx, &IngestOptions::default()).await?;
            super::ingest::print_stats(&stats);
        }

        run_session(&pipeline)
            .await
            .map_err(|e| AppError::Other(format!("{:#}", e)))
    }
}

async fn run_session(pipeline: &RagPipeline) -> anyhow::Result<()> {
    println!(
        "Chatting with namespace '{}'. /reset clears history, /exit quits.",
        pipeline.settings().namespace
    );

    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to write prompt")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            println!();
            break;
        };

        match parse_input(&line) {
            Input::Blank => continue,
            Input::Exit => break,
            Input::Reset => {
                conversation.clear();
                println!("History cleared.");
            }
            Input::Question(question) => match pipeline.ask(&mut conversation, question).await {
                Ok(Some(answer)) => {
                    super::ask::print_answer(&answer);
                    println!();
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Question failed: {}", e);
                    eprintln!("Error: {}", e);
                }
            },
        }
    }

    tracing::info!("Chat session ended after {} turns", conversation.len());
    Ok(())
}
