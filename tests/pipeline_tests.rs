//! End-to-end ingestion, retrieval and chat loop tests.
//!
//! Embeddings and the chat model are replaced by deterministic fakes and the
//! in-memory vector store stands in for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use pdf_rag::chunking::TextSplitter;
use pdf_rag::document::{Document, Metadata};
use pdf_rag::embeddings::{Embedder, Embedding};
use pdf_rag::ingest::Ingestor;
use pdf_rag::llm::ChatModel;
use pdf_rag::rag::RagEngine;
use pdf_rag::search::{Retriever, NO_ANSWER};
use pdf_rag::store::{InMemoryStore, VectorStore};
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

// ============= Helpers =============

const DIMENSIONS: usize = 256;

/// Bag-of-words embedding: every word bumps one bucket
struct WordEmbedder;

fn embed(text: &str) -> Embedding {
    let mut values = vec![0.0; DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
            % DIMENSIONS;
        values[bucket] += 1.0;
    }
    Embedding::from(values)
}

#[async_trait]
impl Embedder for WordEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| embed(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        Ok(embed(text))
    }
}

/// Chat model that records prompts and answers with the first context line
struct RecordingChat {
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let first_line = prompt
            .split("CONTEXTO:\n")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap_or_default()
            .to_string();

        if first_line.is_empty() {
            Ok(NO_ANSWER.to_string())
        } else {
            Ok(format!("  {}  ", first_line))
        }
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
        Err(anyhow::anyhow!("invalid api key"))
    }

    async fn embed_query(&self, _text: &str) -> Result<Embedding> {
        Err(anyhow::anyhow!("invalid api key"))
    }
}

struct FailingChat;

#[async_trait]
impl ChatModel for FailingChat {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(anyhow::anyhow!("service unavailable"))
    }
}

fn page(text: &str, page: usize) -> Document {
    let metadata = json!({
        "source": "empresas.pdf",
        "page": page,
        "author": "",
        "title": null,
    });
    Document::new(text, metadata.as_object().unwrap().clone())
}

fn company_pages() -> Vec<Document> {
    vec![
        page("Gamma IA LTDA teve faturamento de R$ 10 milhões.", 0),
        page("Alfa Energia S.A. fundada em 1990 atua no setor elétrico.", 1),
        page("Beta Varejo possui lojas em todo o Brasil.", 2),
    ]
}

async fn ingested_store() -> InMemoryStore {
    let store = InMemoryStore::new("empresas");
    let ingestor = Ingestor::new(&store, &WordEmbedder, TextSplitter::default());
    ingestor.ingest_documents(&company_pages(), false).await.unwrap();
    store
}

// ============= Ingestion =============

#[tokio::test]
async fn test_ingest_assigns_sequential_ids_and_drops_empty_metadata() {
    let store = InMemoryStore::new("empresas");
    let ingestor = Ingestor::new(&store, &WordEmbedder, TextSplitter::default());

    let summary = ingestor.ingest_documents(&company_pages(), false).await.unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.chunks, 3);
    assert_eq!(store.len().await, 3);

    let first = store.get("doc-0").await.unwrap();
    assert_eq!(
        first.page_content,
        "Gamma IA LTDA teve faturamento de R$ 10 milhões."
    );
    assert_eq!(
        Value::Object(first.metadata),
        json!({"source": "empresas.pdf", "page": 0})
    );
    assert!(store.get("doc-2").await.is_some());
    assert!(store.get("doc-3").await.is_none());
}

#[tokio::test]
async fn test_long_pages_are_split_with_overlap() {
    let store = InMemoryStore::new("longo");
    let ingestor = Ingestor::new(&store, &WordEmbedder, TextSplitter::new(40, 10).unwrap());
    let text = "palavra ".repeat(30);

    let summary = ingestor.ingest_documents(&[page(&text, 0)], false).await.unwrap();

    assert!(summary.chunks > 1);
    for i in 0..summary.chunks {
        let chunk = store.get(&format!("doc-{}", i)).await.unwrap();
        assert!(chunk.page_content.chars().count() <= 40);
        assert_eq!(chunk.metadata["page"], json!(0));
    }
}

#[tokio::test]
async fn test_reingesting_replaces_chunks() {
    let store = ingested_store().await;
    let ingestor = Ingestor::new(&store, &WordEmbedder, TextSplitter::default());

    ingestor
        .ingest_documents(&[page("Delta Logística transporta cargas.", 0)], false)
        .await
        .unwrap();

    assert_eq!(store.len().await, 3);
    assert_eq!(
        store.get("doc-0").await.unwrap().page_content,
        "Delta Logística transporta cargas."
    );
}

#[tokio::test]
async fn test_empty_document_is_an_error() {
    let store = InMemoryStore::new("vazio");
    let ingestor = Ingestor::new(&store, &WordEmbedder, TextSplitter::default());

    let err = ingestor
        .ingest_documents(&[page("   \n\n  ", 0)], false)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "No documents found");
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn test_ingest_text_file_with_reset() {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(file, "Gamma IA LTDA teve faturamento de R$ 10 milhões.").unwrap();

    let store = ingested_store().await;
    let ingestor = Ingestor::new(&store, &WordEmbedder, TextSplitter::default());

    let summary = ingestor.ingest_file(file.path(), true).await.unwrap();

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.chunks, 1);
    assert_eq!(store.len().await, 1);
    assert_eq!(
        store.get("doc-0").await.unwrap().metadata["source"],
        json!(file.path().display().to_string())
    );
}

#[tokio::test]
async fn test_failed_reset_keeps_existing_chunks() {
    let empty = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    let store = ingested_store().await;
    let ingestor = Ingestor::new(&store, &WordEmbedder, TextSplitter::default());

    let err = ingestor.ingest_file(empty.path(), true).await.unwrap_err();

    assert_eq!(err.to_string(), "No documents found");
    assert_eq!(store.len().await, 3);
    assert!(store.get("doc-0").await.is_some());
}

#[tokio::test]
async fn test_embedding_failure_during_reset_keeps_existing_chunks() {
    let store = ingested_store().await;
    let ingestor = Ingestor::new(&store, &FailingEmbedder, TextSplitter::default());

    let err = ingestor
        .ingest_documents(&[page("Delta Logística transporta cargas.", 0)], true)
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("invalid api key"));
    assert_eq!(store.len().await, 3);
    assert_eq!(
        store.get("doc-0").await.unwrap().page_content,
        "Gamma IA LTDA teve faturamento de R$ 10 milhões."
    );
}

// ============= Retrieval =============

#[tokio::test]
async fn test_search_prompt_puts_closest_chunk_first() {
    let store = ingested_store().await;
    let retriever = Retriever::new(&store, &WordEmbedder, 10);

    let results = retriever
        .retrieve("Qual é o faturamento da Gamma IA LTDA?")
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].document.page_content.starts_with("Gamma IA LTDA"));

    let prompt = retriever
        .search_prompt("Qual é o faturamento da Gamma IA LTDA?")
        .await
        .unwrap();
    assert!(prompt.contains("CONTEXTO:\nGamma IA LTDA teve faturamento de R$ 10 milhões.\n"));
    assert!(prompt.contains("PERGUNTA DO USUÁRIO:\nQual é o faturamento da Gamma IA LTDA?\n"));
}

#[tokio::test]
async fn test_search_respects_k() {
    let store = ingested_store().await;
    let retriever = Retriever::new(&store, &WordEmbedder, 1);

    let results = retriever.retrieve("Beta Varejo lojas").await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].document.page_content.starts_with("Beta Varejo"));
}

#[tokio::test]
async fn test_search_before_ingest_has_empty_context() {
    let store = InMemoryStore::new("nada");
    let prompt = Retriever::new(&store, &WordEmbedder, 10)
        .search_prompt("Qual é a capital da França?")
        .await
        .unwrap();

    assert!(prompt.contains("CONTEXTO:\n\n\nREGRAS:"));
}

// ============= Chat loop =============

fn engine_with(store: InMemoryStore, chat: Box<dyn ChatModel>) -> RagEngine {
    RagEngine::new(Box::new(store), Box::new(WordEmbedder), chat, 10)
}

#[tokio::test]
async fn test_chat_loop_answers_until_exit() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let engine = engine_with(
        ingested_store().await,
        Box::new(RecordingChat {
            prompts: prompts.clone(),
        }),
    );

    let input = Cursor::new("\nQual é o faturamento da Gamma IA LTDA?\nEXIT\nnunca lida\n");
    let mut output = Vec::new();
    engine.run_chat_loop(input, &mut output).await.unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.starts_with("Faça sua pergunta e veja a resposta!\nDigite 'exit' para sair do chat.\n\n"));
    assert!(output.contains("RESPOSTA: Gamma IA LTDA teve faturamento de R$ 10 milhões.\n"));
    assert!(output.trim_end().ends_with("Obrigado!"));
    assert_eq!(output.matches("PERGUNTA: ").count(), 3);

    // blank line skipped, exit stops before the last line
    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Qual é o faturamento da Gamma IA LTDA?"));
}

#[tokio::test]
async fn test_chat_loop_stops_at_end_of_input() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let engine = engine_with(
        InMemoryStore::new("nada"),
        Box::new(RecordingChat {
            prompts: prompts.clone(),
        }),
    );

    let mut output = Vec::new();
    engine
        .run_chat_loop(Cursor::new("Qual é a capital da França?"), &mut output)
        .await
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains(&format!("RESPOSTA: {}\n", NO_ANSWER)));
    assert!(output.trim_end().ends_with("Obrigado!"));
}

#[tokio::test]
async fn test_chat_loop_survives_model_errors() {
    let engine = engine_with(ingested_store().await, Box::new(FailingChat));

    let mut output = Vec::new();
    engine
        .run_chat_loop(Cursor::new("primeira\nsegunda\nexit\n"), &mut output)
        .await
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert_eq!(output.matches("ERRO: service unavailable").count(), 2);
    assert!(!output.contains("RESPOSTA:"));
    assert!(output.trim_end().ends_with("Obrigado!"));
}

#[tokio::test]
async fn test_answer_is_trimmed() {
    let engine = engine_with(
        ingested_store().await,
        Box::new(RecordingChat {
            prompts: Arc::new(Mutex::new(Vec::new())),
        }),
    );

    let answer = engine.answer("Alfa Energia fundada").await.unwrap();
    assert_eq!(answer, "Alfa Energia S.A. fundada em 1990 atua no setor elétrico.");
}

#[tokio::test]
async fn test_store_trait_object_delete_is_idempotent() {
    let store: Box<dyn VectorStore> = Box::new(ingested_store().await);
    store.delete_collection().await.unwrap();
    store.delete_collection().await.unwrap();

    let results = store
        .similarity_search_with_score(&embed("Gamma"), 5)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_metadata_helper_type() {
    let metadata: Metadata = json!({"page": 1}).as_object().unwrap().clone();
    assert_eq!(Document::new("x", metadata).metadata["page"], json!(1));
}
