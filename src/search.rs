//! Retrieval and prompt assembly.

use crate::embeddings::Embedder;
use crate::store::{ScoredDocument, VectorStore};
use anyhow::{Context, Result};
use log::debug;

/// Reply the model must give when the context does not contain the answer
pub const NO_ANSWER: &str = "Não tenho informações necessárias para responder sua pergunta.";

pub const PROMPT_TEMPLATE: &str = r#"
CONTEXTO:
{contexto}

REGRAS:
- Responda somente com base no CONTEXTO.
- Se a informação não estiver explicitamente no CONTEXTO, responda:
  "Não tenho informações necessárias para responder sua pergunta."
- Nunca invente ou use conhecimento externo.
- Nunca produza opiniões ou interpretações além do que está escrito.

EXEMPLOS DE PERGUNTAS FORA DO CONTEXTO:
Pergunta: "Qual é a capital da França?"
Resposta: "Não tenho informações necessárias para responder sua pergunta."

Pergunta: "Quantos clientes temos em 2024?"
Resposta: "Não tenho informações necessárias para responder sua pergunta."

Pergunta: "Você acha isso bom ou ruim?"
Resposta: "Não tenho informações necessárias para responder sua pergunta."

PERGUNTA DO USUÁRIO:
{pergunta}

RESPONDA A "PERGUNTA DO USUÁRIO"
"#;

/// Question used by the `search` command when none is given
pub const SAMPLE_QUESTION: &str = "Qual é o faturamento da Gamma IA LTDA?";

/// Join retrieved chunks, one trimmed chunk per line, in retrieval order
pub fn build_context(results: &[ScoredDocument]) -> String {
    results
        .iter()
        .map(|r| format!("{}\n", r.document.page_content.trim()))
        .collect()
}

/// Fill the prompt template in a single pass, so placeholder-like text in
/// the inputs is kept verbatim
pub fn format_prompt(context: &str, question: &str) -> String {
    let mut prompt =
        String::with_capacity(PROMPT_TEMPLATE.len() + context.len() + question.len());
    let mut rest = PROMPT_TEMPLATE;

    while let Some(start) = rest.find('{') {
        prompt.push_str(&rest[..start]);
        let tail = &rest[start..];

        if let Some(after) = tail.strip_prefix("{contexto}") {
            prompt.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{pergunta}") {
            prompt.push_str(question);
            rest = after;
        } else {
            prompt.push('{');
            rest = &tail[1..];
        }
    }
    prompt.push_str(rest);

    prompt
}

/// Embeds questions, retrieves the closest chunks and builds the grounded prompt
pub struct Retriever<'a> {
    store: &'a dyn VectorStore,
    embedder: &'a dyn Embedder,
    k: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a dyn VectorStore, embedder: &'a dyn Embedder, k: usize) -> Self {
        Retriever { store, embedder, k }
    }

    /// The `k` nearest chunks for a question
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredDocument>> {
        let query = self
            .embedder
            .embed_query(question)
            .await
            .context("Failed to embed question")?;

        let results = self
            .store
            .similarity_search_with_score(&query, self.k)
            .await?;

        for result in &results {
            debug!(
                "distance={:.4} metadata={}",
                result.distance,
                serde_json::Value::Object(result.document.metadata.clone())
            );
        }

        Ok(results)
    }

    /// The full prompt for a question
    pub async fn search_prompt(&self, question: &str) -> Result<String> {
        let results = self.retrieve(question).await?;
        Ok(format_prompt(&build_context(&results), question))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Metadata};

    fn scored(text: &str, distance: f32) -> ScoredDocument {
        ScoredDocument {
            document: Document::new(text, Metadata::new()),
            distance,
        }
    }

    #[test]
    fn test_build_context_trims_each_chunk() {
        let context = build_context(&[scored("  first chunk \n", 0.1), scored("second", 0.2)]);
        assert_eq!(context, "first chunk\nsecond\n");
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_format_prompt_fills_both_placeholders() {
        let prompt = format_prompt("Faturamento: R$ 10", "Qual o faturamento?");

        assert!(prompt.contains("CONTEXTO:\nFaturamento: R$ 10\n"));
        assert!(prompt.contains("PERGUNTA DO USUÁRIO:\nQual o faturamento?\n"));
        assert!(!prompt.contains("{contexto}"));
        assert!(!prompt.contains("{pergunta}"));
        assert!(prompt.contains(NO_ANSWER));
    }

    #[test]
    fn test_placeholders_inside_context_are_left_alone() {
        let prompt = format_prompt("literal {pergunta} in text", "q");
        assert!(prompt.contains("literal {pergunta} in text"));
        assert!(prompt.contains("PERGUNTA DO USUÁRIO:\nq\n"));
    }
}
