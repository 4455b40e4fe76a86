//! Vector index capability
//!
//! Production deployments use Qdrant: one cosine-distance (HNSW) collection
//! holding every utterance embedding, payload-filtered by conversation id.
//! Tests swap in a brute-force in-memory implementation of the same trait.

use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::{debug, info};

/// A similarity hit returned by [`VectorIndex::search`].
#[derive(Debug, Clone)]
pub struct ScoredMessage {
    pub message_id: String,
    pub similarity: f32,
}

/// Cosine top-K lookup over stored utterance embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite the vector for `message_id`. Calling twice with
    /// the same id is a no-op as far as observers are concerned.
    async fn upsert(
        &self,
        conversation_id: &str,
        message_id: &str,
        vector: Vec<f32>,
        model_name: &str,
    ) -> Result<()>;

    /// Top-K cosine similarity among embeddings of `conversation_id`,
    /// filtered by `similarity >= threshold`, descending, capped at `limit`.
    async fn search(
        &self,
        conversation_id: &str,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredMessage>>;
}

/// Qdrant-backed vector index.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    /// Connect and make sure the collection exists with the right geometry.
    pub async fn new(url: &str, collection: &str, dimensions: usize) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .context("Failed to connect to Qdrant")?;

        let index = Self {
            client,
            collection: collection.to_string(),
        };
        index.ensure_collection(dimensions as u64).await?;

        Ok(index)
    }

    async fn ensure_collection(&self, dimensions: u64) -> Result<()> {
        let exists = self.client.collection_exists(&self.collection).await?;

        if !exists {
            info!("Creating Qdrant collection: {}", self.collection);
            match self
                .client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(dimensions, Distance::Cosine)),
                )
                .await
            {
                Ok(_) => {}
                Err(e) => {
                    // Another process may have won the creation race.
                    if e.to_string().contains("already exists") {
                        debug!("Collection {} already exists", self.collection);
                    } else {
                        return Err(e)
                            .context(format!("Failed to create collection: {}", self.collection));
                    }
                }
            }
        }

        Ok(())
    }

    /// Qdrant point ids are u64 or UUID; message ids are opaque strings, so
    /// hash them down to a stable u64.
    fn point_id(message_id: &str) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        message_id.hash(&mut hasher);
        hasher.finish()
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(
        &self,
        conversation_id: &str,
        message_id: &str,
        vector: Vec<f32>,
        model_name: &str,
    ) -> Result<()> {
        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert(
            "conversation_id".to_string(),
            conversation_id.to_string().into(),
        );
        payload.insert("message_id".to_string(), message_id.to_string().into());
        payload.insert("model".to_string(), model_name.to_string().into());

        let point = PointStruct::new(Self::point_id(message_id), vector, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .context("Failed to upsert point to Qdrant")?;

        debug!("Upserted embedding for message {}", message_id);
        Ok(())
    }

    async fn search(
        &self,
        conversation_id: &str,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredMessage>> {
        let filter = Filter::must([Condition::matches(
            "conversation_id",
            conversation_id.to_string(),
        )]);

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query.to_vec(), limit as u64)
                    .filter(filter)
                    .score_threshold(threshold)
                    .with_payload(true),
            )
            .await
            .context("Failed to search Qdrant")?;

        Ok(results
            .result
            .into_iter()
            .filter_map(|point| {
                let message_id = point.payload.get("message_id")?.as_str()?.to_string();
                Some(ScoredMessage {
                    message_id,
                    similarity: point.score,
                })
            })
            .collect())
    }
}
