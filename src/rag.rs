use crate::embeddings::Embedder;
use crate::llm::ChatModel;
use crate::search::Retriever;
use crate::store::VectorStore;
use anyhow::Result;
use log::{error, info};
use std::io::{BufRead, Write};

const RULE: &str = "==================================================";

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine {
    store: Box<dyn VectorStore>,
    embedder: Box<dyn Embedder>,
    chat: Box<dyn ChatModel>,
    search_k: usize,
}

impl RagEngine {
    /// Create a new RAG engine
    pub fn new(
        store: Box<dyn VectorStore>,
        embedder: Box<dyn Embedder>,
        chat: Box<dyn ChatModel>,
        search_k: usize,
    ) -> Self {
        RagEngine {
            store,
            embedder,
            chat,
            search_k,
        }
    }

    pub fn retriever(&self) -> Retriever<'_> {
        Retriever::new(self.store.as_ref(), self.embedder.as_ref(), self.search_k)
    }

    /// Answer a question from the stored chunks only
    pub async fn answer(&self, question: &str) -> Result<String> {
        let prompt = self.retriever().search_prompt(question).await?;
        let answer = self.chat.complete(&prompt).await?;
        Ok(answer.trim().to_string())
    }

    /// Interactive question loop; ends on `exit` or end of input
    pub async fn run_chat_loop<R, W>(&self, mut input: R, mut output: W) -> Result<()>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(output, "Faça sua pergunta e veja a resposta!")?;
        writeln!(output, "Digite 'exit' para sair do chat.\n")?;

        let mut buffer = String::new();

        loop {
            writeln!(output, "{}", RULE)?;
            write!(output, "PERGUNTA: ")?;
            output.flush()?;

            buffer.clear();
            if input.read_line(&mut buffer)? == 0 {
                writeln!(output)?;
                break;
            }

            let question = buffer.trim();

            if question.eq_ignore_ascii_case("exit") {
                break;
            }
            if question.is_empty() {
                continue;
            }

            info!("Answering question: {}", question);
            match self.answer(question).await {
                Ok(answer) => {
                    writeln!(output, "RESPOSTA: {}", answer)?;
                    writeln!(output, "{} \n", RULE)?;
                }
                Err(e) => {
                    error!("Failed to answer question: {:#}", e);
                    writeln!(output, "ERRO: {:#}", e)?;
                }
            }
        }

        writeln!(output, "Obrigado!")?;
        Ok(())
    }
}
