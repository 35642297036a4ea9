use super::{check_batch, ScoredDocument, VectorStore};
use crate::document::{Document, Metadata};
use crate::embeddings::Embedding;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

/// Same table layout LangChain's PGVector uses, so collections are interchangeable
const SCHEMA: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS vector",
    "CREATE TABLE IF NOT EXISTS langchain_pg_collection (
        uuid UUID PRIMARY KEY,
        name VARCHAR NOT NULL UNIQUE,
        cmetadata JSON
    )",
    "CREATE TABLE IF NOT EXISTS langchain_pg_embedding (
        id VARCHAR PRIMARY KEY,
        collection_id UUID REFERENCES langchain_pg_collection (uuid) ON DELETE CASCADE,
        embedding VECTOR,
        document VARCHAR,
        cmetadata JSONB
    )",
    "CREATE INDEX IF NOT EXISTS ix_cmetadata_gin
        ON langchain_pg_embedding USING gin (cmetadata jsonb_path_ops)",
];

const MAX_CONNECTIONS: u32 = 5;

/// PostgreSQL + pgvector store
pub struct PgVectorStore {
    pool: PgPool,
    collection_name: String,
}

impl PgVectorStore {
    /// Open a connection pool
    pub async fn connect(database_url: &str, collection_name: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(PgVectorStore {
            pool,
            collection_name: collection_name.to_string(),
        })
    }

    async fn create_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to run schema statement: {}", statement))?;
        }
        Ok(())
    }

    /// Id of the collection, if it has been created
    async fn collection_id(&self) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT uuid FROM langchain_pg_collection WHERE name = $1")
            .bind(&self.collection_name)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to look up collection {}", self.collection_name))?;

        Ok(match row {
            Some(row) => Some(row.try_get("uuid")?),
            None => None,
        })
    }

    async fn tables_exist(&self) -> Result<bool> {
        let row = sqlx::query("SELECT to_regclass('langchain_pg_collection') IS NOT NULL AS present")
            .fetch_one(&self.pool)
            .await
            .context("Failed to inspect database schema")?;

        Ok(row.try_get("present")?)
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn provider_name(&self) -> &'static str {
        "pgvector"
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        self.create_schema().await?;

        sqlx::query(
            "INSERT INTO langchain_pg_collection (uuid, name, cmetadata)
             VALUES ($1, $2, $3::json)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(&self.collection_name)
        .bind(Json(serde_json::json!({ "dimensions": dimensions })))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create collection {}", self.collection_name))?;

        debug!(
            "Collection {} ready ({} dimensions)",
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

        let collection_id = self
            .collection_id()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Collection '{}' does not exist", self.collection_name))?;

        let mut tx = self.pool.begin().await?;

        for ((id, document), embedding) in ids.iter().zip(documents).zip(embeddings) {
            // ids are global; a row owned by another collection is never taken over
            let result = sqlx::query(
                "INSERT INTO langchain_pg_embedding (id, collection_id, embedding, document, cmetadata)
                 VALUES ($1, $2, $3::vector, $4, $5)
                 ON CONFLICT (id) DO UPDATE SET
                    embedding = EXCLUDED.embedding,
                    document = EXCLUDED.document,
                    cmetadata = EXCLUDED.cmetadata
                 WHERE langchain_pg_embedding.collection_id = EXCLUDED.collection_id",
            )
            .bind(id)
            .bind(collection_id)
            .bind(embedding.to_pgvector())
            .bind(&document.page_content)
            .bind(Json(&document.metadata))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert {}", id))?;

            if result.rows_affected() == 0 {
                return Err(anyhow::anyhow!(
                    "Id {} already belongs to another collection than '{}'",
                    id,
                    self.collection_name
                ));
            }
        }

        tx.commit().await?;

        info!(
            "Stored {} documents in collection {}",
            ids.len(),
            self.collection_name
        );
        Ok(ids.len())
    }

    async fn similarity_search_with_score(
        &self,
        query: &Embedding,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        if !self.tables_exist().await? {
            warn!("Collection {} has not been ingested yet", self.collection_name);
            return Ok(Vec::new());
        }
        let Some(collection_id) = self.collection_id().await? else {
            warn!("Collection {} has not been ingested yet", self.collection_name);
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            "SELECT document, cmetadata, (embedding <=> $1::vector)::float8 AS distance
             FROM langchain_pg_embedding
             WHERE collection_id = $2
             ORDER BY distance ASC
             LIMIT $3",
        )
        .bind(query.to_pgvector())
        .bind(collection_id)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to search collection {}", self.collection_name))?;

        rows.into_iter()
            .map(|row| -> Result<ScoredDocument> {
                let page_content: Option<String> = row.try_get("document")?;
                let metadata: Option<Json<Metadata>> = row.try_get("cmetadata")?;
                let distance: f64 = row.try_get("distance")?;

                Ok(ScoredDocument {
                    document: Document::new(
                        page_content.unwrap_or_default(),
                        metadata.map(|m| m.0).unwrap_or_default(),
                    ),
                    distance: distance as f32,
                })
            })
            .collect()
    }

    async fn delete_collection(&self) -> Result<()> {
        if !self.tables_exist().await? {
            return Ok(());
        }

        let result = sqlx::query("DELETE FROM langchain_pg_collection WHERE name = $1")
            .bind(&self.collection_name)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete collection {}", self.collection_name))?;

        info!(
            "Deleted collection {} ({} rows)",
            self.collection_name,
            result.rows_affected()
        );
        Ok(())
    }
}
