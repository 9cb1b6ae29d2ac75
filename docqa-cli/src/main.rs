//! `docqa`: ingest documents and ask questions about them.

mod cli;
mod render;
mod repl;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use docqa_rag::huggingface::HuggingFaceLoader;
use docqa_rag::{SessionManager, SourceFile};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.settings()?;

    if let Some(path) = &cli.save_config {
        config
            .save(path)
            .with_context(|| format!("failed to save settings to {}", path.display()))?;
        info!(path = %path.display(), "saved settings");
    }

    let mut loader = HuggingFaceLoader::new(cli.hf_token.clone());
    if let Some(url) = &cli.hf_url {
        loader = loader.with_base_url(url.clone());
    }
    let manager = SessionManager::new(Arc::new(loader), config.model_cache_capacity);
    let session = manager.create_session(config).await?;
    if !session.has_answer_engine() {
        warn!("answer engine unavailable, documents can be loaded but not queried");
    }

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        match SourceFile::read(path) {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read file");
                println!("✗ {e}");
            }
        }
    }
    let report = session.ingest_files(&files).await;
    println!("{}", render::ingest_report(&report));

    match &cli.question {
        Some(question) => match session.ask(question).await {
            Ok(outcome) => println!("{}", render::outcome(&outcome)),
            Err(e) => {
                eprintln!("{}", render::ask_error(&e));
                std::process::exit(1);
            }
        },
        None => repl::run(&session).await?,
    }

    Ok(())
}
