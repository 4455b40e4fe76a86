//! Per-turn quality pipeline
//!
//! Runs after a participant's utterance is committed: persist the message,
//! embed it, check contradictions, check loops on every third utterance,
//! recompute health. Each step is fenced; a failure becomes a non-critical
//! event and the remaining steps still run.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use super::contradiction::ContradictionDetector;
use super::embedding::EmbeddingService;
use super::health::HealthScorer;
use super::loops::LoopDetector;
use crate::store::{MessageRow, SqliteStore};

/// Messages inspected by loop detection and health scoring.
const ANALYSIS_WINDOW: i64 = 10;
/// Loop detection runs on every utterance whose one-indexed ordinal is a
/// multiple of this.
const LOOP_CHECK_INTERVAL: i64 = 3;

/// Everything the pipeline needs to know about a committed turn.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub debate_id: String,
    pub topic: String,
    pub participant_name: String,
    pub participant_model: String,
    pub content: String,
    pub sequence_number: i64,
    pub round_number: u32,
    pub turn_index: usize,
    pub tokens_used: usize,
    pub response_time_ms: f64,
    pub participant_count: usize,
}

/// Quality findings surfaced to the event stream, in emission order.
#[derive(Debug, Clone)]
pub enum QualityEvent {
    Contradiction {
        contradiction_id: String,
        severity: String,
        similarity: f64,
        explanation: String,
    },
    Loop {
        loop_id: String,
        repetition_count: i64,
        intervention_text: String,
    },
    HealthScore {
        score: f64,
        status: String,
        coherence: f64,
        progress: f64,
        productivity: f64,
        message_count: usize,
    },
    /// A pipeline step failed; the stream keeps going.
    NonCriticalError { error: String },
}

pub struct QualityPipeline {
    store: SqliteStore,
    embeddings: Arc<EmbeddingService>,
    contradictions: ContradictionDetector,
    loops: LoopDetector,
    health: HealthScorer,
}

impl QualityPipeline {
    pub fn new(
        store: SqliteStore,
        embeddings: Arc<EmbeddingService>,
        contradictions: ContradictionDetector,
        loops: LoopDetector,
        health: HealthScorer,
    ) -> Self {
        Self {
            store,
            embeddings,
            contradictions,
            loops,
            health,
        }
    }

    /// Process one committed turn. Never fails the caller; persistence or
    /// provider errors surface as [`QualityEvent::NonCriticalError`].
    pub async fn process_turn(&self, record: &TurnRecord) -> Vec<QualityEvent> {
        let mut events = vec![];
        let conversation_id = record.debate_id.clone();

        // 1. Lazy conversation row (title and topic are the debate topic).
        if let Err(e) = self
            .store
            .ensure_conversation(&conversation_id, &record.topic, &record.topic)
            .await
        {
            error!("Failed to ensure conversation {conversation_id}: {e}");
            events.push(QualityEvent::NonCriticalError {
                error: format!("Quality check error: {e}"),
            });
            // Without the conversation row nothing downstream can persist.
            return events;
        }

        // 2. Persist the utterance.
        let message = MessageRow {
            id: format!("msg_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
            conversation_id: conversation_id.clone(),
            sequence_number: record.sequence_number,
            round_number: record.round_number as i64,
            turn_index: record.turn_index as i64,
            agent_name: record.participant_name.clone(),
            agent_model: record.participant_model.clone(),
            content: record.content.clone(),
            tokens_used: record.tokens_used as i64,
            response_time_ms: record.response_time_ms,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.insert_message(&message).await {
            error!("Failed to persist utterance {}: {e}", message.id);
            events.push(QualityEvent::NonCriticalError {
                error: format!("Quality check error: {e}"),
            });
            return events;
        }

        // 3. Embedding. Contradiction detection reuses the vector and
        // handles the (idempotent) storage itself.
        let vector = match self.embeddings.generate(&record.content).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                error!("Error generating embedding: {e}");
                events.push(QualityEvent::NonCriticalError {
                    error: format!("Quality check error: {e}"),
                });
                None
            }
        };

        // 4. Contradictions.
        if let Some(vector) = &vector {
            match self
                .contradictions
                .detect(&conversation_id, &message, vector)
                .await
            {
                Ok(found) => {
                    for contradiction in found {
                        events.push(QualityEvent::Contradiction {
                            contradiction_id: contradiction.id,
                            severity: contradiction.severity,
                            similarity: contradiction.similarity,
                            explanation: contradiction.explanation,
                        });
                    }
                }
                Err(e) => {
                    error!("Error detecting contradictions: {e}");
                    events.push(QualityEvent::NonCriticalError {
                        error: format!("Quality check error: {e}"),
                    });
                }
            }
        }

        // 5. Loops, every third utterance. Sequence numbers are 0-indexed;
        // the cadence counts utterances, so the third, sixth, ... trigger.
        if (record.sequence_number + 1) % LOOP_CHECK_INTERVAL == 0 {
            match self.store.recent_messages(&conversation_id, ANALYSIS_WINDOW).await {
                Ok(recent) => match self.loops.detect(&conversation_id, &recent).await {
                    Ok(Some(found)) => {
                        info!(
                            "Loop detected in conversation {}: {}",
                            conversation_id, found.fingerprint
                        );
                        events.push(QualityEvent::Loop {
                            loop_id: found.id,
                            repetition_count: found.repetition_count,
                            intervention_text: found.intervention_text,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Error detecting loops: {e}");
                        events.push(QualityEvent::NonCriticalError {
                            error: format!("Quality check error: {e}"),
                        });
                    }
                },
                Err(e) => {
                    error!("Error loading loop window: {e}");
                    events.push(QualityEvent::NonCriticalError {
                        error: format!("Quality check error: {e}"),
                    });
                }
            }
        }

        // 6. Health, every utterance.
        match self.store.recent_messages(&conversation_id, ANALYSIS_WINDOW).await {
            Ok(recent) => {
                match self
                    .health
                    .score(&conversation_id, &recent, record.participant_count)
                    .await
                {
                    Ok(score) => {
                        if let Err(e) = self
                            .store
                            .update_conversation_health(&conversation_id, score.overall)
                            .await
                        {
                            error!("Failed to update conversation health: {e}");
                        }
                        events.push(QualityEvent::HealthScore {
                            score: score.overall,
                            status: score.status.as_str().to_string(),
                            coherence: score.coherence,
                            progress: score.progress,
                            productivity: score.productivity,
                            message_count: score.message_count,
                        });
                    }
                    Err(e) => {
                        error!("Error calculating health score: {e}");
                        events.push(QualityEvent::NonCriticalError {
                            error: format!("Quality check error: {e}"),
                        });
                    }
                }
            }
            Err(e) => {
                error!("Error loading health window: {e}");
                events.push(QualityEvent::NonCriticalError {
                    error: format!("Quality check error: {e}"),
                });
            }
        }

        events
    }
}
