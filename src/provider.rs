use crate::config::{Provider, Settings};
use crate::embeddings::Embedder;
use crate::gemini::{GeminiClient, GeminiConfig};
use crate::llm::ChatModel;
use crate::openai::{OpenAiClient, OpenAiConfig};
use anyhow::Result;
use log::info;

/// Build the embedding client for the configured provider
pub fn embedder(settings: &Settings) -> Result<Box<dyn Embedder>> {
    let config = settings.provider_config()?;
    info!(
        "Using {} embeddings with model {}",
        settings.provider, config.embedding_model
    );

    let embedder: Box<dyn Embedder> = match settings.provider {
        Provider::OpenAi => Box::new(OpenAiClient::new(OpenAiConfig::from(config))),
        Provider::Google => Box::new(GeminiClient::new(GeminiConfig::from(config))),
    };
    Ok(embedder)
}

/// Build the chat model for the configured provider
pub fn chat_model(settings: &Settings) -> Result<Box<dyn ChatModel>> {
    let config = settings.provider_config()?;
    info!("Using {} chat model {}", settings.provider, config.chat_model);

    let chat: Box<dyn ChatModel> = match settings.provider {
        Provider::OpenAi => Box::new(OpenAiClient::new(OpenAiConfig::from(config))),
        Provider::Google => Box::new(GeminiClient::new(GeminiConfig::from(config))),
    };
    Ok(chat)
}
