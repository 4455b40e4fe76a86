//! Contradiction detection
//!
//! Finds semantically similar prior utterances, asks a cheap judge model
//! whether they oppose the new one, and persists classified contradictions.
//! Judge failures default to "not a contradiction" so provider hiccups never
//! produce false positives.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::embedding::EmbeddingService;
use crate::providers::{ChatMessage, ChatRequest, ProviderRegistry, Role};
use crate::store::{ContradictionRow, MessageRow, SqliteStore};

/// Minimum cosine similarity for a candidate pair.
pub const SIMILARITY_THRESHOLD: f32 = 0.85;
/// Candidates fetched per new utterance.
pub const CANDIDATE_LIMIT: usize = 20;
/// Cheap classification model for judge/explain calls.
const JUDGE_MODEL: &str = "gpt-4o-mini";

const EXPLANATION_FALLBACK: &str = "Unable to generate explanation";

/// Explanation phrases that upgrade a borderline pair to High.
const STRONG_INDICATORS: &[&str] = &[
    "directly contradicts",
    "completely opposite",
    "mutually exclusive",
    "impossible",
    "logically inconsistent",
];

/// Contradiction severity. `Critical` is reserved; the classifier never
/// emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

pub struct ContradictionDetector {
    embeddings: Arc<EmbeddingService>,
    registry: Arc<ProviderRegistry>,
    store: SqliteStore,
}

impl ContradictionDetector {
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        registry: Arc<ProviderRegistry>,
        store: SqliteStore,
    ) -> Self {
        Self {
            embeddings,
            registry,
            store,
        }
    }

    /// Detect contradictions between `message` and the conversation history.
    ///
    /// `new_vector` is the utterance's embedding, computed by the caller;
    /// the detector persists it (idempotently) before searching so the
    /// vector index always covers the utterance under test.
    pub async fn detect(
        &self,
        conversation_id: &str,
        message: &MessageRow,
        new_vector: &[f32],
    ) -> Result<Vec<ContradictionRow>> {
        debug!("Detecting contradictions for message {}", message.id);

        self.embeddings
            .store(conversation_id, &message.id, new_vector.to_vec())
            .await?;

        let similar = self
            .embeddings
            .find_similar(conversation_id, new_vector, SIMILARITY_THRESHOLD, CANDIDATE_LIMIT)
            .await?;

        // Discard the self-match.
        let candidates: Vec<_> = similar
            .into_iter()
            .filter(|hit| hit.message_id != message.id)
            .collect();

        if candidates.is_empty() {
            debug!("No similar messages found");
            return Ok(vec![]);
        }

        let ids: Vec<String> = candidates.iter().map(|c| c.message_id.clone()).collect();
        let rows = self.store.messages_by_ids(&ids).await?;

        let mut contradictions = vec![];
        for candidate in &candidates {
            let Some(other) = rows.iter().find(|r| r.id == candidate.message_id) else {
                continue;
            };

            if !self.judge_opposition(&message.content, &other.content).await {
                continue;
            }

            let explanation = self.explain(&message.content, &other.content).await;
            let severity = classify_severity(candidate.similarity, &explanation);

            let row = ContradictionRow {
                id: format!("contra_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
                conversation_id: conversation_id.to_string(),
                message_id_a: message.id.clone(),
                message_id_b: other.id.clone(),
                similarity: candidate.similarity as f64,
                severity: severity.as_str().to_string(),
                explanation,
                detected_at: Utc::now(),
            };
            self.store.insert_contradiction(&row).await?;
            contradictions.push(row);
        }

        if !contradictions.is_empty() {
            info!(
                "Detected {} contradictions for message {}",
                contradictions.len(),
                message.id
            );
        }
        Ok(contradictions)
    }

    /// Binary YES/NO opposition judgement. Any failure or unparsable answer
    /// counts as NO.
    async fn judge_opposition(&self, new_text: &str, candidate_text: &str) -> bool {
        let prompt = format!(
            "Analyze these two statements and determine if they express opposing or \
             contradictory viewpoints.\n\n\
             Statement 1: {new_text}\n\n\
             Statement 2: {candidate_text}\n\n\
             Consider:\n\
             1. Do they make opposite claims about the same topic?\n\
             2. Do they contradict each other's core assertions?\n\
             3. Would accepting both statements create a logical inconsistency?\n\n\
             Respond with ONLY \"YES\" if they are contradictory, or \"NO\" if they are not."
        );

        let request = ChatRequest::new(
            vec![
                ChatMessage::new(
                    Role::System,
                    "You are an expert at detecting logical contradictions and opposing viewpoints.",
                ),
                ChatMessage::new(Role::User, prompt),
            ],
            JUDGE_MODEL,
            0.0,
        );

        match self.judge_call(&request).await {
            Ok(response) => response.trim().to_uppercase().starts_with("YES"),
            Err(e) => {
                error!("Opposition judgement failed: {e}");
                false
            }
        }
    }

    /// 2-3 sentence explanation of the contradiction; literal placeholder on
    /// failure.
    async fn explain(&self, new_text: &str, candidate_text: &str) -> String {
        let prompt = format!(
            "Explain how these two statements contradict each other. Be specific and \
             concise (2-3 sentences).\n\n\
             Statement 1: {new_text}\n\n\
             Statement 2: {candidate_text}\n\n\
             Explanation:"
        );

        let request = ChatRequest::new(
            vec![
                ChatMessage::new(Role::System, "You are an expert at analyzing logical contradictions."),
                ChatMessage::new(Role::User, prompt),
            ],
            JUDGE_MODEL,
            0.0,
        );

        match self.judge_call(&request).await {
            Ok(response) => response.trim().to_string(),
            Err(e) => {
                error!("Contradiction explanation failed: {e}");
                EXPLANATION_FALLBACK.to_string()
            }
        }
    }

    async fn judge_call(&self, request: &ChatRequest) -> Result<String> {
        let provider = self.registry.provider_for(&request.model)?;
        provider.complete(request).await
    }
}

/// Classify severity from similarity and the explanation text.
pub fn classify_severity(similarity: f32, explanation: &str) -> Severity {
    if similarity >= 0.90 {
        return Severity::High;
    }
    if similarity >= SIMILARITY_THRESHOLD {
        let lowered = explanation.to_lowercase();
        if STRONG_INDICATORS
            .iter()
            .any(|indicator| lowered.contains(indicator))
        {
            return Severity::High;
        }
        return Severity::Medium;
    }
    Severity::Low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn very_similar_pairs_are_high() {
        assert_eq!(classify_severity(0.93, "whatever"), Severity::High);
        assert_eq!(classify_severity(0.90, ""), Severity::High);
    }

    #[test]
    fn borderline_pairs_upgrade_on_strong_indicators() {
        assert_eq!(
            classify_severity(0.87, "Statement 1 directly contradicts statement 2."),
            Severity::High
        );
        assert_eq!(
            classify_severity(0.87, "These claims are Mutually Exclusive."),
            Severity::High
        );
        assert_eq!(
            classify_severity(0.87, "They disagree on emphasis."),
            Severity::Medium
        );
    }

    #[test]
    fn low_similarity_is_low_severity() {
        assert_eq!(classify_severity(0.5, "directly contradicts"), Severity::Low);
    }

    #[test]
    fn critical_is_never_classified() {
        for similarity in [0.0, 0.85, 0.9, 0.99, 1.0] {
            assert_ne!(
                classify_severity(similarity, "impossible, completely opposite"),
                Severity::Critical
            );
        }
    }
}
