//! Vector store backends.
//!
//! Every store is bound to one named collection. Scores are cosine
//! distances: lower means closer, results come back in ascending order.

mod memory;
mod pgvector;
mod qdrant;

pub use memory::InMemoryStore;
pub use pgvector::PgVectorStore;
pub use qdrant::QdrantStore;

use crate::config::{Settings, StoreBackend};
use crate::document::Document;
use crate::embeddings::Embedding;
use anyhow::Result;
use async_trait::async_trait;

/// A document returned by a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    /// Cosine distance to the query
    pub distance: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the backend, for logging
    fn provider_name(&self) -> &'static str;

    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self, dimensions: usize) -> Result<()>;

    /// Insert or replace documents by id; returns the number written
    async fn add_documents(
        &self,
        ids: &[String],
        documents: &[Document],
        embeddings: &[Embedding],
    ) -> Result<usize>;

    /// Up to `k` nearest documents, closest first
    async fn similarity_search_with_score(
        &self,
        query: &Embedding,
        k: usize,
    ) -> Result<Vec<ScoredDocument>>;

    /// Drop the collection and everything in it; a missing collection is not an error
    async fn delete_collection(&self) -> Result<()>;
}

/// Connect to the backend selected in the settings
pub async fn connect(settings: &Settings) -> Result<Box<dyn VectorStore>> {
    match &settings.store {
        StoreBackend::PgVector { database_url } => {
            let store = PgVectorStore::connect(database_url, &settings.collection_name).await?;
            Ok(Box::new(store))
        }
        StoreBackend::Qdrant { url, api_key } => {
            let store = QdrantStore::new(url, api_key.clone(), &settings.collection_name)?;
            Ok(Box::new(store))
        }
    }
}

/// Ids, documents and embeddings are parallel slices
fn check_batch(ids: &[String], documents: &[Document], embeddings: &[Embedding]) -> Result<()> {
    if ids.len() != documents.len() || documents.len() != embeddings.len() {
        return Err(anyhow::anyhow!(
            "Mismatched batch: {} ids, {} documents, {} embeddings",
            ids.len(),
            documents.len(),
            embeddings.len()
        ));
    }
    Ok(())
}
