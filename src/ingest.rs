use crate::chunking::TextSplitter;
use crate::document::{load_documents, Document};
use crate::embeddings::Embedder;
use crate::store::VectorStore;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// Outcome of an ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub pages: usize,
    pub chunks: usize,
}

/// Ids assigned to chunks, in order
pub fn chunk_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("doc-{}", i)).collect()
}

/// Load a document, split it, embed the chunks and store them
pub struct Ingestor<'a> {
    store: &'a dyn VectorStore,
    embedder: &'a dyn Embedder,
    splitter: TextSplitter,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        store: &'a dyn VectorStore,
        embedder: &'a dyn Embedder,
        splitter: TextSplitter,
    ) -> Self {
        Ingestor {
            store,
            embedder,
            splitter,
        }
    }

    /// Ingest a file from disk
    pub async fn ingest_file(&self, path: &Path, reset: bool) -> Result<IngestSummary> {
        let pages = load_documents(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        info!("Loaded {} pages from {}", pages.len(), path.display());

        self.ingest_documents(&pages, reset).await
    }

    /// Split, embed and store already loaded documents.
    ///
    /// With `reset` the collection is dropped once the chunks are embedded, so a
    /// failed run leaves the stored documents untouched.
    pub async fn ingest_documents(
        &self,
        pages: &[Document],
        reset: bool,
    ) -> Result<IngestSummary> {
        let splits = self.splitter.split_documents(pages);

        if splits.is_empty() {
            return Err(anyhow::anyhow!("No documents found"));
        }
        info!("Split into {} chunks", splits.len());

        let enriched: Vec<Document> = splits
            .into_iter()
            .map(Document::without_empty_metadata)
            .collect();
        let ids = chunk_ids(enriched.len());

        let texts: Vec<String> = enriched.iter().map(|d| d.page_content.clone()).collect();
        let embeddings = self
            .embedder
            .embed_documents(&texts)
            .await
            .context("Failed to embed chunks")?;

        if embeddings.len() != enriched.len() {
            return Err(anyhow::anyhow!(
                "Expected {} embeddings, got {}",
                enriched.len(),
                embeddings.len()
            ));
        }

        if reset {
            info!("Dropping collection before storing new chunks");
            self.store.delete_collection().await?;
        }

        let dimensions = embeddings[0].dimensions();
        self.store.ensure_collection(dimensions).await?;
        let stored = self
            .store
            .add_documents(&ids, &enriched, &embeddings)
            .await?;

        info!(
            "Ingested {} chunks into {} store",
            stored,
            self.store.provider_name()
        );

        Ok(IngestSummary {
            pages: pages.len(),
            chunks: stored,
        })
    }
}
