//! OpenAI Embeddings provider
//!
//! Default model is text-embedding-3-small (1536 dimensions), which is what
//! the quality pipeline stores and searches against.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::DEFAULT_TIMEOUT_SECS;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Embedding capability consumed by the quality pipeline.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier written alongside stored vectors.
    fn model_name(&self) -> &str;

    /// Advertised vector dimension.
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, preserving input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI embedding models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiEmbeddingModel {
    /// text-embedding-3-small: 1536 dimensions, fast and cheap.
    TextEmbedding3Small,
    /// text-embedding-3-large: 3072 dimensions, best quality.
    TextEmbedding3Large,
}

impl OpenAiEmbeddingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenAiEmbeddingModel::TextEmbedding3Small => "text-embedding-3-small",
            OpenAiEmbeddingModel::TextEmbedding3Large => "text-embedding-3-large",
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            OpenAiEmbeddingModel::TextEmbedding3Small => 1536,
            OpenAiEmbeddingModel::TextEmbedding3Large => 3072,
        }
    }
}

pub struct OpenAiEmbeddings {
    client: Client,
    api_key: String,
    model: OpenAiEmbeddingModel,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    encoding_format: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbeddings {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, OpenAiEmbeddingModel::TextEmbedding3Small)
    }

    pub fn with_model(api_key: String, model: OpenAiEmbeddingModel) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        self.model.as_str()
    }

    fn dimensions(&self) -> usize {
        self.model.dimensions()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Generating {} embeddings in batch", texts.len());

        let request = EmbeddingRequest {
            input: texts,
            model: self.model.as_str(),
            encoding_format: "float",
        };

        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI embeddings API error: {} - {}", status, body);
        }

        let api_response: EmbeddingResponse = response.json().await?;

        // The API may return items out of order; restore input order by the
        // returned index before handing vectors back.
        let mut data = api_response.data;
        data.sort_by_key(|d| d.index);

        if data.len() != texts.len() {
            anyhow::bail!(
                "Embedding batch size mismatch: requested {}, received {}",
                texts.len(),
                data.len()
            );
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}
