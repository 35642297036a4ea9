pub mod chunking;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod gemini;
pub mod ingest;
pub mod llm;
pub mod openai;
pub mod provider;
pub mod rag;
pub mod search;
pub mod store;
