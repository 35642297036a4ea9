use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OPENAI_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GOOGLE_CHAT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;
pub const DEFAULT_SEARCH_K: usize = 10;

/// Errors raised while validating configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("{var} points to a non-existent path: {path}")]
    PathNotFound { var: String, path: PathBuf },

    #[error("{var} should be a file, but a directory was given: {path}")]
    IsDirectory { var: String, path: PathBuf },

    #[error(
        "You must configure either OpenAI or Google embedding provider. \
         Set both OPENAI_API_KEY and OPENAI_EMBEDDING_MODEL, or both GOOGLE_API_KEY and GOOGLE_EMBEDDING_MODEL."
    )]
    NoProvider,

    #[error("PROVIDER is set to {provider} but {missing} is not configured")]
    IncompleteProvider { provider: Provider, missing: String },

    #[error("{var} has an invalid value: {value}")]
    Invalid { var: String, value: String },
}

/// Embedding / chat provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Google,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Google => write!(f, "google"),
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "google" | "gemini" => Ok(Provider::Google),
            other => Err(ConfigError::Invalid {
                var: "PROVIDER".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Vector store backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    PgVector { database_url: String },
    Qdrant { url: String, api_key: Option<String> },
}

/// Credentials and model names for one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub base_url: String,
}

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Only present when `PDF_PATH` is set; `ingest` calls [`Settings::pdf_path`]
    pdf_path: Option<String>,
    pub collection_name: String,
    pub store: StoreBackend,
    pub provider: Provider,
    pub openai: Option<ProviderConfig>,
    pub google: Option<ProviderConfig>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub search_k: usize,
}

impl Settings {
    /// Create the settings from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Create the settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let collection_name = require(
            "PG_VECTOR_COLLECTION_NAME",
            lookup("PG_VECTOR_COLLECTION_NAME"),
        )?;

        let store = match non_empty(lookup("VECTOR_STORE")) {
            None => StoreBackend::PgVector {
                database_url: require("DATABASE_URL", lookup("DATABASE_URL"))?,
            },
            Some(value) => match value.to_lowercase().as_str() {
                "pgvector" | "postgres" => StoreBackend::PgVector {
                    database_url: require("DATABASE_URL", lookup("DATABASE_URL"))?,
                },
                "qdrant" => StoreBackend::Qdrant {
                    url: require("QDRANT_URL", lookup("QDRANT_URL"))?,
                    api_key: non_empty(lookup("QDRANT_API_KEY")),
                },
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "VECTOR_STORE".to_string(),
                        value,
                    })
                }
            },
        };

        let openai = provider_config(
            &lookup,
            "OPENAI",
            DEFAULT_OPENAI_CHAT_MODEL,
            DEFAULT_OPENAI_BASE_URL,
        );
        let google = provider_config(
            &lookup,
            "GOOGLE",
            DEFAULT_GOOGLE_CHAT_MODEL,
            DEFAULT_GOOGLE_BASE_URL,
        );

        let provider = match non_empty(lookup("PROVIDER")) {
            Some(value) => {
                let provider: Provider = value.parse()?;
                let configured = match provider {
                    Provider::OpenAi => openai.is_some(),
                    Provider::Google => google.is_some(),
                };
                if !configured {
                    let prefix = match provider {
                        Provider::OpenAi => "OPENAI",
                        Provider::Google => "GOOGLE",
                    };
                    return Err(ConfigError::IncompleteProvider {
                        provider,
                        missing: format!("{prefix}_API_KEY / {prefix}_EMBEDDING_MODEL"),
                    });
                }
                provider
            }
            None if openai.is_some() => Provider::OpenAi,
            None if google.is_some() => Provider::Google,
            None => return Err(ConfigError::NoProvider),
        };

        let chunk_size = parse_positive(&lookup, "CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let chunk_overlap = match non_empty(lookup("CHUNK_OVERLAP")) {
            Some(value) => value.parse::<usize>().map_err(|_| ConfigError::Invalid {
                var: "CHUNK_OVERLAP".to_string(),
                value: value.clone(),
            })?,
            None => DEFAULT_CHUNK_OVERLAP.min(chunk_size.saturating_sub(1)),
        };
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::Invalid {
                var: "CHUNK_OVERLAP".to_string(),
                value: format!("{chunk_overlap} (must be smaller than CHUNK_SIZE={chunk_size})"),
            });
        }

        Ok(Settings {
            pdf_path: non_empty(lookup("PDF_PATH")),
            collection_name,
            store,
            provider,
            openai,
            google,
            chunk_size,
            chunk_overlap,
            search_k: parse_positive(&lookup, "SEARCH_K", DEFAULT_SEARCH_K)?,
        })
    }

    /// Path of the document to ingest; must exist and be a regular file
    pub fn pdf_path(&self) -> Result<PathBuf, ConfigError> {
        require_file("PDF_PATH", self.pdf_path.clone())
    }

    /// Configuration of the selected provider
    pub fn provider_config(&self) -> Result<&ProviderConfig, ConfigError> {
        let config = match self.provider {
            Provider::OpenAi => self.openai.as_ref(),
            Provider::Google => self.google.as_ref(),
        };
        config.ok_or(ConfigError::NoProvider)
    }
}

/// Return the value, or an error naming the variable when it is unset or blank
pub fn require(var_name: &str, value: Option<String>) -> Result<String, ConfigError> {
    non_empty(value).ok_or_else(|| ConfigError::Missing(var_name.to_string()))
}

/// Like [`require`], and the value must point at an existing regular file
pub fn require_file(var_name: &str, value: Option<String>) -> Result<PathBuf, ConfigError> {
    let path = PathBuf::from(require(var_name, value)?);
    check_file(var_name, &path)?;
    Ok(path)
}

fn check_file(var_name: &str, path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::PathNotFound {
            var: var_name.to_string(),
            path: path.to_path_buf(),
        });
    }
    if path.is_dir() {
        return Err(ConfigError::IsDirectory {
            var: var_name.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn provider_config<F>(
    lookup: &F,
    prefix: &str,
    default_chat_model: &str,
    default_base_url: &str,
) -> Option<ProviderConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = non_empty(lookup(&format!("{prefix}_API_KEY")))?;
    let embedding_model = non_empty(lookup(&format!("{prefix}_EMBEDDING_MODEL")))?;
    let chat_model = non_empty(lookup(&format!("{prefix}_CHAT_MODEL")))
        .unwrap_or_else(|| default_chat_model.to_string());
    let base_url = non_empty(lookup(&format!("{prefix}_BASE_URL")))
        .unwrap_or_else(|| default_base_url.to_string())
        .trim_end_matches('/')
        .to_string();

    Some(ProviderConfig {
        api_key,
        embedding_model,
        chat_model,
        base_url,
    })
}

fn parse_positive<F>(lookup: &F, var_name: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(var_name)) {
        None => Ok(default),
        Some(value) => match value.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::Invalid {
                var: var_name.to_string(),
                value,
            }),
        },
    }
}
