use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text_by_pages;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Key-value metadata attached to a document or chunk
pub type Metadata = Map<String, Value>;

/// A piece of text together with the metadata describing where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The actual text content
    pub page_content: String,
    /// Source file, page number and similar attributes
    pub metadata: Metadata,
}

impl Document {
    pub fn new(page_content: impl Into<String>, metadata: Metadata) -> Self {
        Document {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// Copy of this document without metadata entries that are empty strings or null
    pub fn without_empty_metadata(self) -> Self {
        let metadata = self
            .metadata
            .into_iter()
            .filter(|(_, value)| !is_empty_value(value))
            .collect();

        Document {
            page_content: self.page_content,
            metadata,
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Load a file as a list of documents, one per PDF page, or a single one for text files
pub fn load_documents<P: AsRef<Path>>(file_path: P) -> Result<Vec<Document>> {
    let path = file_path.as_ref();

    // Detect MIME type
    let mime = from_path(path).first_or_octet_stream();
    let mime_type = mime.to_string();
    debug!("Detected MIME type: {}", mime_type);

    let source = path.display().to_string();

    match mime_type.as_str() {
        mime if mime.starts_with("application/pdf") => {
            info!("Processing PDF document: {}", source);
            let pages = extract_text_by_pages(path)
                .with_context(|| format!("Failed to extract text from PDF: {}", source))?;

            Ok(pdf_pages(&pages, &source))
        }

        mime if mime.starts_with("text/") => {
            info!("Processing text document: {}", source);
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", source))?;

            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), Value::from(source));
            Ok(vec![Document::new(content, metadata)])
        }

        _ => Err(anyhow::anyhow!(
            "Unsupported document format: {}. Only text and PDF files are supported.",
            mime_type
        )),
    }
}

/// Turn the text of each PDF page into a document; blank pages are skipped but still counted
fn pdf_pages<S: AsRef<str>>(pages: &[S], source: &str) -> Vec<Document> {
    let total_pages = pages.len();

    let documents: Vec<Document> = pages
        .iter()
        .enumerate()
        .filter_map(|(page, text)| {
            let text = normalize_whitespace(text.as_ref());
            if text.is_empty() {
                debug!("Skipping empty page {} of {}", page + 1, source);
                return None;
            }

            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), Value::from(source));
            metadata.insert("page".to_string(), Value::from(page));
            metadata.insert("page_label".to_string(), Value::from((page + 1).to_string()));
            metadata.insert("total_pages".to_string(), Value::from(total_pages));

            Some(Document::new(text, metadata))
        })
        .collect();

    if documents.is_empty() {
        warn!(
            "No text extracted from PDF: {}. It might be a scanned document.",
            source
        );
    }

    documents
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                // Add at most two newlines (paragraph break)
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    normalized.trim().to_string()
}
