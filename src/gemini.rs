use crate::config::ProviderConfig;
use crate::embeddings::{Embedder, Embedding};
use crate::llm::ChatModel;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// batchEmbedContents accepts at most 100 requests per call
const MAX_BATCH_SIZE: usize = 100;

/// Configuration for the Gemini API
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
}

impl From<&ProviderConfig> for GeminiConfig {
    fn from(config: &ProviderConfig) -> Self {
        GeminiConfig {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            embedding_model: model_path(&config.embedding_model),
            chat_model: model_path(&config.chat_model),
        }
    }
}

/// Gemini model names are addressed as `models/<name>`
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/{}:{}?key={}",
            self.config.base_url, model, method, self.config.api_key
        )
    }

    async fn post<T, R>(&self, url: &str, request: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.client.post(url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Gemini API request failed: {} {}",
                status,
                error_text
            ));
        }

        Ok(response.json().await?)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.config.embedding_model,
                    content: Content::new(text, None),
                })
                .collect(),
        };

        let url = self.url(&self.config.embedding_model, "batchEmbedContents");
        let response: BatchEmbedResponse = self.post(&url, &request).await?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Gemini returned {} embeddings for {} inputs",
                response.embeddings.len(),
                texts.len()
            ));
        }

        Ok(response
            .embeddings
            .into_iter()
            .map(|e| Embedding { values: e.values })
            .collect())
    }

    /// Generate text using the configured Gemini model
    pub async fn generate_text(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::new(prompt, Some("user"))],
            generation_config: GenerationConfig { temperature },
        };

        let url = self.url(&self.config.chat_model, "generateContent");
        let response: GenerateResponse = self.post(&url, &request).await?;

        // Extract the generated text from the first candidate
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No response generated"))?;

        Ok(candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH_SIZE) {
            debug!("Embedding batch of {} texts with Gemini", batch.len());
            embeddings.extend(self.embed_batch(batch).await?);
        }

        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        let request = EmbedContentRequest {
            model: &self.config.embedding_model,
            content: Content::new(text, None),
        };

        let url = self.url(&self.config.embedding_model, "embedContent");
        let response: EmbedContentResponse = self.post(&url, &request).await?;

        Ok(Embedding {
            values: response.embedding.values,
        })
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt, 0.0).await
    }
}

// Request/response structures for the Gemini API

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize, Debug)]
struct EmbedContentResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
}

impl<'a> Content<'a> {
    fn new(text: &'a str, role: Option<&'static str>) -> Self {
        Content {
            parts: vec![Part { text }],
            role,
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}
