use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::info;
use std::io;

use pdf_rag::chunking::TextSplitter;
use pdf_rag::config::Settings;
use pdf_rag::ingest::Ingestor;
use pdf_rag::provider;
use pdf_rag::rag::RagEngine;
use pdf_rag::search::{Retriever, SAMPLE_QUESTION};
use pdf_rag::store;

/// Ask questions about a PDF using embeddings stored in PostgreSQL/pgvector
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load PDF_PATH, split it into chunks and store their embeddings
    Ingest {
        /// Drop the collection before ingesting
        #[arg(long)]
        reset: bool,
    },
    /// Print the prompt that would be sent to the model for a question
    Search {
        /// Question to retrieve context for
        question: Option<String>,
    },
    /// Interactive question and answer loop
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Load configuration from environment
    let settings = Settings::from_env().context("Invalid configuration")?;
    info!(
        "Using collection {} with provider {}",
        settings.collection_name, settings.provider
    );

    let vector_store = store::connect(&settings).await?;
    let embedder = provider::embedder(&settings)?;

    match args.command {
        Command::Ingest { reset } => {
            let pdf_path = settings.pdf_path()?;
            let splitter = TextSplitter::new(settings.chunk_size, settings.chunk_overlap)?;
            let ingestor = Ingestor::new(vector_store.as_ref(), embedder.as_ref(), splitter);

            let summary = ingestor
                .ingest_file(&pdf_path, reset)
                .await
                .context("Failed to ingest document")?;

            println!(
                "Ingested {} chunks from {} pages of {}",
                summary.chunks,
                summary.pages,
                pdf_path.display()
            );
        }
        Command::Search { question } => {
            let question = question.unwrap_or_else(|| SAMPLE_QUESTION.to_string());
            let retriever =
                Retriever::new(vector_store.as_ref(), embedder.as_ref(), settings.search_k);

            println!("{}", retriever.search_prompt(&question).await?);
        }
        Command::Chat => {
            let chat = provider::chat_model(&settings)?;
            let rag_engine = RagEngine::new(vector_store, embedder, chat, settings.search_k);

            let stdin = io::stdin();
            rag_engine
                .run_chat_loop(stdin.lock(), io::stdout())
                .await
                .context("Error in chat loop")?;
        }
    }

    Ok(())
}
