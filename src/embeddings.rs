use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// Render as a pgvector literal, e.g. `[0.1,0.2,0.3]`
    pub fn to_pgvector(&self) -> String {
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        format!("[{}]", values.join(","))
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Embedding { values }
    }
}

/// Maps text to vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; the result has one embedding per input, in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Embedding>;
}

/// Cosine distance between two vectors (0 = same direction, 2 = opposite)
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}
