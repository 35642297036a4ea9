use anyhow::Result;
use async_trait::async_trait;

/// A chat completion model answering a single prompt
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
