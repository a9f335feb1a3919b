//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which embedding backend to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    OpenAi,
    Hash,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub allowed_origin: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub content_dir: PathBuf,
    pub vector_db_path: PathBuf,
    pub user_db_path: PathBuf,
    pub prompts_path: PathBuf,
    pub chat_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_top_k: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address = parse_var(&lookup, "BIND_ADDRESS", "0.0.0.0:8000")?;
        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;
        let allowed_origin = var_or("ALLOWED_ORIGIN", "http://localhost:8000");

        // --- Provider Credentials (required) ---
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let openai_base_url = var_or("OPENAI_BASE_URL", "https://api.openai.com/v1")
            .trim_end_matches('/')
            .to_string();

        // --- Storage Paths ---
        let content_dir = PathBuf::from(var_or("CONTENT_DIR", "./course_content"));
        let vector_db_path = PathBuf::from(var_or("VECTOR_DB_PATH", "./chroma_db"));
        let user_db_path = PathBuf::from(var_or("USER_DB_PATH", "./user_db"));
        let prompts_path = PathBuf::from(var_or("PROMPTS_PATH", "./prompts"));

        // --- Model Settings ---
        let chat_model = var_or("CHAT_MODEL", "gpt-3.5-turbo-1106");
        let llm_temperature: f32 = parse_var(&lookup, "LLM_TEMPERATURE", "0.7")?;
        let llm_max_tokens: u32 = parse_var(&lookup, "LLM_MAX_TOKENS", "2000")?;
        let embedding_provider = match var_or("EMBEDDING_PROVIDER", "openai").to_lowercase().as_str() {
            "openai" => EmbeddingProvider::OpenAi,
            "hash" => EmbeddingProvider::Hash,
            other => {
                return Err(ConfigError::InvalidValue(
                    "EMBEDDING_PROVIDER".to_string(),
                    format!("'{}' is not one of openai, hash", other),
                ))
            }
        };
        let embedding_model = var_or("EMBEDDING_MODEL", "text-embedding-ada-002");

        // --- Retrieval Settings ---
        let chunk_size: usize = parse_var(&lookup, "CHUNK_SIZE", "1000")?;
        let chunk_overlap: usize = parse_var(&lookup, "CHUNK_OVERLAP", "200")?;
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ConfigError::InvalidValue(
                "CHUNK_OVERLAP".to_string(),
                format!("overlap {} must be smaller than chunk size {}", chunk_overlap, chunk_size),
            ));
        }
        let retrieval_top_k: usize = parse_var(&lookup, "RETRIEVAL_TOP_K", "3")?;
        if retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue(
                "RETRIEVAL_TOP_K".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            log_level,
            allowed_origin,
            openai_api_key,
            openai_base_url,
            content_dir,
            vector_db_path,
            user_db_path,
            prompts_path,
            chat_model,
            llm_temperature,
            llm_max_tokens,
            embedding_provider,
            embedding_model,
            chunk_size,
            chunk_overlap,
            retrieval_top_k,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(name).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
