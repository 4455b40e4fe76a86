//! Embedding service
//!
//! Wraps the embedding provider and the vector index: generation, idempotent
//! storage keyed by message id, and cosine top-K lookup scoped to a
//! conversation.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::providers::embeddings::EmbeddingProvider;
use crate::store::{ScoredMessage, SqliteStore, VectorIndex};

pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    store: SqliteStore,
}

impl EmbeddingService {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        store: SqliteStore,
    ) -> Self {
        Self {
            provider,
            index,
            store,
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed a single text.
    pub async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.provider.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding provider returned no vector"))
    }

    /// Embed a batch, preserving input order.
    pub async fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.provider.embed(texts).await
    }

    /// Store a message's vector. Inserting twice for the same message id is
    /// a no-op: the bookkeeping row is inserted once and the index upsert
    /// overwrites the identical point.
    pub async fn store(
        &self,
        conversation_id: &str,
        message_id: &str,
        vector: Vec<f32>,
    ) -> Result<()> {
        let inserted = self
            .store
            .record_embedding(message_id, self.provider.model_name())
            .await?;
        if !inserted {
            debug!("Embedding for {} already stored, skipping", message_id);
            return Ok(());
        }

        self.index
            .upsert(conversation_id, message_id, vector, self.provider.model_name())
            .await
    }

    /// Cosine top-K among this conversation's embeddings, filtered by
    /// `similarity >= threshold`, descending, capped at `limit`.
    pub async fn find_similar(
        &self,
        conversation_id: &str,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredMessage>> {
        let mut hits = self
            .index
            .search(conversation_id, query, threshold, limit)
            .await?;
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Cosine similarity clamped to [0, 1]. Zero-norm inputs yield 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    similarity.clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![0.5, -0.25, 1.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_clamp_to_zero() {
        let v = vec![1.0, 2.0, 3.0];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert_eq!(cosine_similarity(&v, &neg), 0.0);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn zero_norm_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
