use super::{check_batch, ScoredDocument, VectorStore};
use crate::document::{Document, Metadata};
use crate::embeddings::Embedding;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use uuid::Uuid;

/// Client for a single Qdrant collection
pub struct QdrantStore {
    client: Qdrant,
    collection_name: String,
}

impl QdrantStore {
    /// Create a new Qdrant client
    pub fn new(url: &str, api_key: Option<String>, collection_name: &str) -> Result<Self> {
        let config_builder = Qdrant::from_url(url);
        let config_builder = if let Some(api_key) = api_key {
            config_builder.api_key(api_key)
        } else {
            config_builder
        };

        let client = config_builder
            .build()
            .context("Failed to initialize Qdrant client")?;

        Ok(QdrantStore {
            client,
            collection_name: collection_name.to_string(),
        })
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        self.client
            .collection_exists(self.collection_name.clone())
            .await
            .with_context(|| {
                format!(
                    "Failed to check existence of collection {}",
                    self.collection_name
                )
            })
    }
}

/// Qdrant only accepts integers and UUIDs as point ids
fn point_id(id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()
}

fn payload(id: &str, document: &Document) -> HashMap<String, Value> {
    let mut payload = HashMap::new();
    payload.insert("id".to_string(), Value::from(id.to_string()));
    payload.insert(
        "page_content".to_string(),
        Value::from(document.page_content.clone()),
    );
    payload.insert(
        "metadata".to_string(),
        Value::from(serde_json::Value::Object(document.metadata.clone())),
    );
    payload
}

fn document_from_payload(payload: &HashMap<String, Value>) -> Option<Document> {
    let page_content = payload.get("page_content")?.as_str()?.to_string();
    let metadata = payload
        .get("metadata")
        .and_then(|v| match serde_json::Value::from(v.clone()) {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_else(Metadata::new);

    Some(Document::new(page_content, metadata))
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn provider_name(&self) -> &'static str {
        "qdrant"
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine));

        self.client
            .create_collection(create_collection)
            .await
            .with_context(|| format!("Failed to create collection {}", self.collection_name))?;

        info!(
            "Created Qdrant collection {} ({} dimensions)",
            self.collection_name, dimensions
        );
        Ok(())
    }

    async fn add_documents(
        &self,
        ids: &[String],
        documents: &[Document],
        embeddings: &[Embedding],
    ) -> Result<usize> {
        check_batch(ids, documents, embeddings)?;

        let points: Vec<PointStruct> = ids
            .iter()
            .zip(documents)
            .zip(embeddings)
            .map(|((id, document), embedding)| {
                PointStruct::new(
                    point_id(id),
                    embedding.values.clone(),
                    payload(id, document),
                )
            })
            .collect();

        let count = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true))
            .await
            .with_context(|| {
                format!(
                    "Failed to upsert points in collection {}",
                    self.collection_name
                )
            })?;

        Ok(count)
    }

    async fn similarity_search_with_score(
        &self,
        query: &Embedding,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        if !self.collection_exists().await? {
            warn!("Collection {} has not been ingested yet", self.collection_name);
            return Ok(Vec::new());
        }

        let search_request =
            SearchPointsBuilder::new(self.collection_name.clone(), query.values.clone(), k as u64)
                .with_payload(true);

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .with_context(|| format!("Failed to search collection {}", self.collection_name))?;

        // Qdrant reports cosine similarity
        Ok(search_response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let document = document_from_payload(&scored_point.payload)?;
                Some(ScoredDocument {
                    document,
                    distance: 1.0 - scored_point.score,
                })
            })
            .collect())
    }

    async fn delete_collection(&self) -> Result<()> {
        if !self.collection_exists().await? {
            return Ok(());
        }

        self.client
            .delete_collection(self.collection_name.clone())
            .await
            .with_context(|| format!("Failed to delete collection {}", self.collection_name))?;

        info!("Deleted Qdrant collection {}", self.collection_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_ids_are_stable_uuids() {
        assert_eq!(point_id("doc-0"), point_id("doc-0"));
        assert_ne!(point_id("doc-0"), point_id("doc-1"));
        assert!(Uuid::parse_str(&point_id("doc-7")).is_ok());
    }

    #[test]
    fn test_payload_roundtrip_keeps_metadata() {
        let metadata = json!({"source": "a.pdf", "page": 2});
        let document = Document::new("chunk text", metadata.as_object().unwrap().clone());

        let restored = document_from_payload(&payload("doc-3", &document)).unwrap();

        assert_eq!(restored.page_content, "chunk text");
        assert_eq!(restored.metadata["source"], json!("a.pdf"));
        assert_eq!(restored.metadata["page"].as_i64(), Some(2));
    }
}
