// tests/common/mod.rs
// Shared test doubles: scripted chat provider, deterministic embeddings,
// and a brute-force in-memory vector index.

// Each integration binary compiles this module; not every binary uses every
// helper.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use quorum::debate::events::StampedEvent;
use quorum::debate::orchestrator::Orchestrator;
use quorum::debate::registry::DebateRegistry;
use quorum::debate::{DebateConfig, Participant};
use quorum::providers::embeddings::EmbeddingProvider;
use quorum::providers::{ChatProvider, ChatRequest, ModelFamily, ProviderRegistry};
use quorum::quality::{
    cosine_similarity, ContradictionDetector, EmbeddingService, HealthScorer, LoopDetector,
    QualityPipeline,
};
use quorum::state::AppState;
use quorum::store::{ScoredMessage, SqliteStore, VectorIndex};

// ============================================================================
// Chat provider double
// ============================================================================

/// Scripted chat provider serving both participant turns and the cheap
/// auxiliary calls (judge / explain / intervention), discriminated by
/// prompt shape the way the real endpoints would be by model.
pub struct MockChatProvider {
    responses: Mutex<VecDeque<String>>,
    pub judge_answer: Mutex<String>,
    pub explanation: Mutex<String>,
    fail_next: AtomicBool,
    delay: Mutex<Option<std::time::Duration>>,
}

impl MockChatProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            judge_answer: Mutex::new("NO".to_string()),
            explanation: Mutex::new("They disagree on emphasis.".to_string()),
            fail_next: AtomicBool::new(false),
            delay: Mutex::new(None),
        }
    }

    pub fn set_judge_answer(&self, answer: &str) {
        *self.judge_answer.lock().unwrap() = answer.to_string();
    }

    pub fn set_explanation(&self, explanation: &str) {
        *self.explanation.lock().unwrap() = explanation.to_string();
    }

    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    fn scripted(&self, request: &ChatRequest) -> Result<String> {
        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if last.contains("Respond with ONLY") {
            return Ok(self.judge_answer.lock().unwrap().clone());
        }
        if last.contains("Explain how these two statements contradict") {
            return Ok(self.explanation.lock().unwrap().clone());
        }
        if last.contains("repetitive loop") {
            return Ok("You're circling the same ground. Try examining the trade-offs from the \
                       user's perspective instead."
                .to_string());
        }

        let mut responses = self.responses.lock().unwrap();
        Ok(responses
            .pop_front()
            .unwrap_or_else(|| "I have nothing further to add.".to_string()))
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("mock provider failure");
        }
        self.scripted(request)
    }

    async fn stream(&self, request: &ChatRequest, tx: mpsc::Sender<String>) -> Result<String> {
        let text = self.complete(request).await?;
        // Stream in word-sized deltas to exercise chunk accumulation.
        let words: Vec<&str> = text.split_inclusive(' ').collect();
        for word in &words {
            let _ = tx.send(word.to_string()).await;
        }
        Ok(text)
    }
}

// ============================================================================
// Embedding double
// ============================================================================

/// Deterministic embeddings: explicit vectors per content, with a seeded
/// pseudo-random fallback for everything else.
pub struct MockEmbeddingProvider {
    dims: usize,
    fixed: Mutex<HashMap<String, Vec<f32>>>,
}

impl MockEmbeddingProvider {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            fixed: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_vector(&self, content: &str, vector: Vec<f32>) {
        self.fixed.lock().unwrap().insert(content.to_string(), vector);
    }

    fn vector_for(&self, content: &str) -> Vec<f32> {
        if let Some(vector) = self.fixed.lock().unwrap().get(content) {
            return vector.clone();
        }

        // Seeded LCG over the content hash; normalised.
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        content.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut vector: Vec<f32> = (0..self.dims)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((seed >> 33) as f32 / (1u64 << 31) as f32) - 1.0
            })
            .collect();
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

// ============================================================================
// Vector index double
// ============================================================================

#[derive(Default)]
pub struct InMemoryVectorIndex {
    points: Mutex<HashMap<String, (String, Vec<f32>)>>,
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(
        &self,
        conversation_id: &str,
        message_id: &str,
        vector: Vec<f32>,
        _model_name: &str,
    ) -> Result<()> {
        self.points
            .lock()
            .unwrap()
            .insert(message_id.to_string(), (conversation_id.to_string(), vector));
        Ok(())
    }

    async fn search(
        &self,
        conversation_id: &str,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredMessage>> {
        let points = self.points.lock().unwrap();
        let mut hits: Vec<ScoredMessage> = points
            .iter()
            .filter(|(_, (conv, _))| conv == conversation_id)
            .map(|(id, (_, vector))| ScoredMessage {
                message_id: id.clone(),
                similarity: cosine_similarity(query, vector),
            })
            .filter(|hit| hit.similarity >= threshold)
            .collect();
        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        hits.truncate(limit);
        Ok(hits)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct TestHarness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: SqliteStore,
    pub chat: Arc<MockChatProvider>,
    pub embeddings: Arc<MockEmbeddingProvider>,
}

impl TestHarness {
    pub async fn new(responses: Vec<&str>) -> Self {
        Self::with_turn_timeout(responses, None).await
    }

    pub async fn with_turn_timeout(
        responses: Vec<&str>,
        turn_timeout: Option<std::time::Duration>,
    ) -> Self {
        let store = SqliteStore::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");

        let chat = Arc::new(MockChatProvider::new(responses));
        let mut providers = ProviderRegistry::new();
        providers.insert(ModelFamily::OpenAi, chat.clone());
        let providers = Arc::new(providers);

        let embeddings_provider = Arc::new(MockEmbeddingProvider::new(16));
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::default());
        let embeddings = Arc::new(EmbeddingService::new(
            embeddings_provider.clone(),
            index,
            store.clone(),
        ));

        let pipeline = Arc::new(QualityPipeline::new(
            store.clone(),
            embeddings.clone(),
            ContradictionDetector::new(embeddings.clone(), providers.clone(), store.clone()),
            LoopDetector::new(providers.clone(), store.clone()),
            HealthScorer::new(embeddings, store.clone()),
        ));

        let registry = Arc::new(DebateRegistry::new());
        let mut orchestrator = Orchestrator::new(registry, providers, pipeline);
        if let Some(timeout) = turn_timeout {
            orchestrator = orchestrator.with_turn_timeout(timeout);
        }
        let orchestrator = Arc::new(orchestrator);

        Self {
            orchestrator,
            store,
            chat,
            embeddings: embeddings_provider,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.orchestrator.clone(), self.store.clone())
    }

    /// Drive one turn to completion and return its events in order.
    pub async fn drive_turn(&self, id: &str) -> Vec<StampedEvent> {
        let (tx, mut rx) = mpsc::channel(1024);
        self.orchestrator
            .next_turn(id, tx)
            .await
            .expect("next_turn refused");

        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Drive turns until a `debate_complete` frame shows up, returning the
    /// concatenated event sequence.
    pub async fn drive_to_completion(&self, id: &str, max_turns: usize) -> Vec<StampedEvent> {
        let mut all = vec![];
        for _ in 0..max_turns {
            let events = self.drive_turn(id).await;
            let finished = events
                .iter()
                .any(|e| e.event.event_type() == "debate_complete");
            all.extend(events);
            if finished {
                return all;
            }
        }
        panic!("debate did not complete within {max_turns} turns");
    }
}

pub fn two_participant_config(max_rounds: u32) -> DebateConfig {
    DebateConfig {
        topic: "Should microservices be the default architecture?".to_string(),
        participants: vec![
            Participant {
                name: "Agent 1".to_string(),
                model: "model-alpha".to_string(),
                system_prompt: "You favour microservices.".to_string(),
                temperature: 0.7,
            },
            Participant {
                name: "Agent 2".to_string(),
                model: "model-beta".to_string(),
                system_prompt: "You favour monoliths.".to_string(),
                temperature: 0.7,
            },
        ],
        max_rounds,
        context_window_rounds: 10,
        cost_warning_threshold: 1.0,
    }
}

/// Event types in emission order, convenient for sequence assertions.
pub fn event_types(events: &[StampedEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event.event_type()).collect()
}
