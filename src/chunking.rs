use crate::document::Document;
use anyhow::Result;
use log::warn;

pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text recursively on a list of separators until every piece fits
/// into `chunk_size` characters, carrying up to `chunk_overlap` characters
/// from the end of one chunk into the start of the next.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter with the default separators (paragraph, line, word, character)
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_overlap >= chunk_size {
            return Err(anyhow::anyhow!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap,
                chunk_size
            ));
        }

        Ok(Self::with_sizes(chunk_size, chunk_overlap))
    }

    fn with_sizes(chunk_size: usize, chunk_overlap: usize) -> Self {
        TextSplitter {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Split every document, copying its metadata onto each chunk
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.page_content)
                    .into_iter()
                    .map(|text| Document::new(text, doc.metadata.clone()))
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];

        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate.as_str();
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            chunks.extend(self.merge_splits(&good_splits));
        }

        chunks
    }

    /// Greedily join small pieces into chunks; the separator is already part of each piece
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0;

        for split in splits {
            let len = char_len(split);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(chunk) = join_pieces(&current) {
                        chunks.push(chunk);
                    }

                    // Drop leading pieces until only the overlap is left and the next one fits
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        total -= char_len(current[0]);
                        current.remove(0);
                    }
                }
            }

            current.push(split);
            total += len;
        }

        if let Some(chunk) = join_pieces(&current) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        TextSplitter::with_sizes(
            crate::config::DEFAULT_CHUNK_SIZE,
            crate::config::DEFAULT_CHUNK_OVERLAP,
        )
    }
}

/// Split on `separator`, prefixing every piece after the first with it; empty pieces are dropped
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    for (i, part) in text.split(separator).enumerate() {
        let piece = if i == 0 {
            part.to_string()
        } else {
            format!("{}{}", separator, part)
        };
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    pieces
}

fn join_pieces(pieces: &[&str]) -> Option<String> {
    let text = pieces.concat();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
