//! services/api/src/adapters/embeddings.rs
//!
//! Embedding providers. `OpenAiEmbeddingAdapter` talks to any endpoint that
//! speaks the OpenAI `/embeddings` API; `build_embedder` picks it or the
//! offline hashing embedder from the configuration.

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use tutor_core::embedding::HashEmbedder;
use tutor_core::ports::{EmbeddingService, PortError, PortResult};

#[derive(Clone)]
pub struct OpenAiEmbeddingAdapter {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddingAdapter {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingAdapter {
    async fn embed_batch(&self, inputs: &[String]) -> PortResult<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let payload = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        debug!("Requesting {} embeddings from {}", inputs.len(), url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("embeddings request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "embeddings request failed: {}",
                response.status()
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed embeddings response: {}", e)))?;
        if parsed.data.len() != inputs.len() {
            return Err(PortError::Unexpected(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Creates the embedding service named by `EMBEDDING_PROVIDER`.
pub fn build_embedder(config: &Config) -> Arc<dyn EmbeddingService> {
    match config.embedding_provider {
        EmbeddingProvider::OpenAi => {
            info!("Using OpenAI-compatible embeddings ({})", config.embedding_model);
            Arc::new(OpenAiEmbeddingAdapter::new(
                &config.openai_base_url,
                &config.openai_api_key,
                &config.embedding_model,
            ))
        }
        EmbeddingProvider::Hash => {
            info!("Using the offline hashing embedder");
            Arc::new(HashEmbedder::default())
        }
    }
}
