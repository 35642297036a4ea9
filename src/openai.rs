use crate::config::ProviderConfig;
use crate::embeddings::{Embedder, Embedding};
use crate::llm::ChatModel;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Inputs sent per embeddings request
const MAX_BATCH_SIZE: usize = 512;

/// Configuration for the OpenAI API
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
}

impl From<&ProviderConfig> for OpenAiConfig {
    fn from(config: &ProviderConfig) -> Self {
        OpenAiConfig {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
        }
    }
}

/// Client for the OpenAI embeddings and chat completions endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = reqwest::Client::new();
        OpenAiClient { config, client }
    }

    async fn post<T, R>(&self, path: &str, request: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "OpenAI API request failed: {} {}",
                status,
                error_text
            ));
        }

        Ok(response.json().await?)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
        };

        let response: EmbeddingResponse = self.post("embeddings", &request).await?;

        if response.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "OpenAI returned {} embeddings for {} inputs",
                response.data.len(),
                texts.len()
            ));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);

        Ok(data
            .into_iter()
            .map(|d| Embedding {
                values: d.embedding,
            })
            .collect())
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH_SIZE) {
            debug!("Embedding batch of {} texts with OpenAI", batch.len());
            embeddings.extend(self.embed_batch(batch).await?);
        }

        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response: ChatResponse = self.post("chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No response generated"))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}
