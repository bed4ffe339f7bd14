use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marginalia::anchoring::SelectorEngine;
use marginalia::annotation::ChunkOrchestrator;
use marginalia::config::Config;
use marginalia::llm::LlmProvider;
use marginalia::processing::DocumentChunker;

#[derive(Parser)]
#[command(name = "marginalia")]
#[command(about = "Chunk HTML documents, check selectors and generate anchored annotations")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a document into chunks
    Chunk {
        file: PathBuf,
    },

    /// Check whether a selector matches exactly one element
    Validate {
        file: PathBuf,
        selector: String,
        /// Text the matched element must contain
        #[arg(long)]
        text: Option<String>,
    },

    /// Re-anchor a selector from the text it should point at
    Repair {
        file: PathBuf,
        #[arg(long)]
        text: String,
        #[arg(long)]
        selector: Option<String>,
        #[arg(long)]
        xpath: Option<String>,
    },

    /// Generate annotations for every chunk of a document
    Annotate {
        file: PathBuf,
        /// Extra guidance for the model, overrides ANNOTATION_INSTRUCTIONS
        #[arg(long)]
        instructions: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marginalia=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env();
    config.validate()?;

    match args.command {
        Commands::Chunk { file } => {
            let html = read_document(&file)?;
            let chunker = DocumentChunker::new(&config.chunking)?;
            print_json(&chunker.chunk(&html))
        }
        Commands::Validate {
            file,
            selector,
            text,
        } => {
            let html = read_document(&file)?;
            let engine = SelectorEngine::new(&config.selector);
            print_json(&engine.validate_html(&html, &selector, text.as_deref()))
        }
        Commands::Repair {
            file,
            text,
            selector,
            xpath,
        } => {
            let html = read_document(&file)?;
            let engine = SelectorEngine::new(&config.selector);
            print_json(&engine.repair_selector(
                &html,
                &text,
                selector.as_deref(),
                xpath.as_deref(),
            ))
        }
        Commands::Annotate { file, instructions } => {
            let html = read_document(&file)?;

            if let Some(instructions) = instructions {
                config.orchestration.instructions = Some(instructions);
            }
            if let Some(llm_config) = &config.llm {
                tracing::info!("Initializing LLM provider: {}...", llm_config.model);
            }
            let llm = LlmProvider::new(config.llm.as_ref());
            if !llm.is_available() {
                anyhow::bail!("LLM unavailable - set LLM_MODEL (and LLM_API_KEY for hosted providers)");
            }

            let chunker = DocumentChunker::new(&config.chunking)?;
            let orchestrator = ChunkOrchestrator::new(
                Arc::new(llm),
                SelectorEngine::new(&config.selector),
                config.orchestration.clone(),
            );

            let processed = orchestrator.annotate_document(&chunker, &html).await?;
            if processed.is_partial() {
                tracing::warn!(
                    failed = processed.failed.len(),
                    "Some chunks failed; annotations are partial"
                );
            }
            print_json(&processed)
        }
    }
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
