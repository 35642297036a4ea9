use super::{check_batch, ScoredDocument, VectorStore};
use crate::document::Document;
use crate::embeddings::{cosine_distance, Embedding};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Brute-force store kept in process memory
pub struct InMemoryStore {
    collection_name: String,
    collection: RwLock<Option<Collection>>,
}

struct Collection {
    dimensions: usize,
    entries: BTreeMap<String, (Document, Embedding)>,
}

impl InMemoryStore {
    pub fn new(collection_name: impl Into<String>) -> Self {
        InMemoryStore {
            collection_name: collection_name.into(),
            collection: RwLock::new(None),
        }
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.collection
            .read()
            .await
            .as_ref()
            .map_or(0, |c| c.entries.len())
    }

    pub async fn get(&self, id: &str) -> Option<Document> {
        self.collection
            .read()
            .await
            .as_ref()
            .and_then(|c| c.entries.get(id))
            .map(|(doc, _)| doc.clone())
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        let mut collection = self.collection.write().await;
        if collection.is_none() {
            *collection = Some(Collection {
                dimensions,
                entries: BTreeMap::new(),
            });
        }
        Ok(())
    }

    async fn add_documents(
        &self,
        ids: &[String],
        documents: &[Document],
        embeddings: &[Embedding],
    ) -> Result<usize> {
        check_batch(ids, documents, embeddings)?;

        let mut guard = self.collection.write().await;
        let collection = guard.as_mut().ok_or_else(|| {
            anyhow::anyhow!("Collection '{}' does not exist", self.collection_name)
        })?;

        for ((id, document), embedding) in ids.iter().zip(documents).zip(embeddings) {
            if embedding.dimensions() != collection.dimensions {
                return Err(anyhow::anyhow!(
                    "Embedding for {} has {} dimensions, collection '{}' expects {}",
                    id,
                    embedding.dimensions(),
                    self.collection_name,
                    collection.dimensions
                ));
            }
            collection
                .entries
                .insert(id.clone(), (document.clone(), embedding.clone()));
        }

        Ok(ids.len())
    }

    async fn similarity_search_with_score(
        &self,
        query: &Embedding,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let guard = self.collection.read().await;
        let Some(collection) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let mut results: Vec<ScoredDocument> = collection
            .entries
            .values()
            .map(|(document, embedding)| ScoredDocument {
                document: document.clone(),
                distance: cosine_distance(&query.values, &embedding.values),
            })
            .collect();

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);

        Ok(results)
    }

    async fn delete_collection(&self) -> Result<()> {
        *self.collection.write().await = None;
        Ok(())
    }
}
