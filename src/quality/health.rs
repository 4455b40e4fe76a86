//! Health scoring
//!
//! Composite 0-100 conversation health from three axes: coherence (semantic
//! adjacency of consecutive utterances), progress (length/diversity/
//! participation) and productivity (timing/density/turn efficiency). Each
//! call persists a time-series sample.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

use super::embedding::{cosine_similarity, EmbeddingService};
use crate::store::{HealthSampleRow, MessageRow, SqliteStore};

const COHERENCE_WEIGHT: f64 = 0.4;
const PROGRESS_WEIGHT: f64 = 0.3;
const PRODUCTIVITY_WEIGHT: f64 = 0.3;

const EXCELLENT_THRESHOLD: f64 = 85.0;
const GOOD_THRESHOLD: f64 = 70.0;
const FAIR_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => "excellent",
            HealthStatus::Good => "good",
            HealthStatus::Fair => "fair",
            HealthStatus::Poor => "poor",
        }
    }

    pub fn from_score(overall: f64) -> Self {
        if overall >= EXCELLENT_THRESHOLD {
            HealthStatus::Excellent
        } else if overall >= GOOD_THRESHOLD {
            HealthStatus::Good
        } else if overall >= FAIR_THRESHOLD {
            HealthStatus::Fair
        } else {
            HealthStatus::Poor
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthScore {
    pub overall: f64,
    pub coherence: f64,
    pub progress: f64,
    pub productivity: f64,
    pub status: HealthStatus,
    pub message_count: usize,
}

pub struct HealthScorer {
    embeddings: Arc<EmbeddingService>,
    store: SqliteStore,
}

impl HealthScorer {
    pub fn new(embeddings: Arc<EmbeddingService>, store: SqliteStore) -> Self {
        Self { embeddings, store }
    }

    /// Score the conversation over `recent` messages and persist a sample.
    /// `participant_count` is the configured participant total, used for the
    /// participation factor.
    pub async fn score(
        &self,
        conversation_id: &str,
        recent: &[MessageRow],
        participant_count: usize,
    ) -> Result<HealthScore> {
        if recent.is_empty() {
            return Ok(HealthScore {
                overall: 50.0,
                coherence: 50.0,
                progress: 50.0,
                productivity: 50.0,
                status: HealthStatus::Fair,
                message_count: 0,
            });
        }

        let coherence = self.coherence(recent).await;
        let progress = progress_score(recent, participant_count);
        let productivity = productivity_score(recent);

        let overall = (coherence * COHERENCE_WEIGHT
            + progress * PROGRESS_WEIGHT
            + productivity * PRODUCTIVITY_WEIGHT)
            .clamp(0.0, 100.0);
        let status = HealthStatus::from_score(overall);

        debug!(
            "Health for {}: overall={:.1} coherence={:.1} progress={:.1} productivity={:.1} ({})",
            conversation_id,
            overall,
            coherence,
            progress,
            productivity,
            status.as_str()
        );

        let score = HealthScore {
            overall,
            coherence,
            progress,
            productivity,
            status,
            message_count: recent.len(),
        };
        self.persist(conversation_id, &score).await?;

        Ok(score)
    }

    /// Mean cosine similarity of consecutive utterances, rescaled to 0-100.
    /// Single-message windows are perfectly coherent; provider failure
    /// degrades to the neutral 50.
    async fn coherence(&self, recent: &[MessageRow]) -> f64 {
        if recent.len() < 2 {
            return 100.0;
        }

        let contents: Vec<String> = recent.iter().map(|m| m.content.clone()).collect();
        let vectors = match self.embeddings.generate_batch(&contents).await {
            Ok(vectors) => vectors,
            Err(e) => {
                error!("Coherence embedding failed: {e}");
                return 50.0;
            }
        };

        let mut similarities = vec![];
        for pair in vectors.windows(2) {
            similarities.push(cosine_similarity(&pair[0], &pair[1]) as f64);
        }
        let avg = similarities.iter().sum::<f64>() / similarities.len() as f64;

        // 0.7+ reads as good, below 0.3 as incoherent.
        ((avg - 0.30) * (100.0 / 0.70)).clamp(0.0, 100.0)
    }

    async fn persist(&self, conversation_id: &str, score: &HealthScore) -> Result<()> {
        let metadata = serde_json::json!({
            "status": score.status.as_str(),
            "progress_score": round2(score.progress),
            "productivity_score": round2(score.productivity),
            "message_count": score.message_count,
        });

        self.store
            .insert_health_sample(&HealthSampleRow {
                id: format!("hs_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
                conversation_id: conversation_id.to_string(),
                health_score: score.overall,
                coherence_score: score.coherence,
                // Placeholder columns; dedicated services own these signals.
                contradiction_score: 100.0,
                loop_score: 100.0,
                citation_score: 100.0,
                message_count: score.message_count as i64,
                analysis_metadata: metadata,
                created_at: Utc::now(),
            })
            .await
    }
}

/// Progress: 0.3 length + 0.4 lexical diversity + 0.3 participation.
pub fn progress_score(recent: &[MessageRow], participant_count: usize) -> f64 {
    if recent.is_empty() {
        return 0.0;
    }

    let lengths: Vec<f64> = recent.iter().map(|m| m.content.len() as f64).collect();
    let mean_length = lengths.iter().sum::<f64>() / lengths.len() as f64;
    let variance = lengths
        .iter()
        .map(|len| (len - mean_length).powi(2))
        .sum::<f64>()
        / lengths.len() as f64;
    let length_factor = (mean_length / 10.0 + variance.sqrt() / 5.0).clamp(0.0, 100.0);

    let mut total_words = 0usize;
    let mut unique_words: HashSet<String> = HashSet::new();
    for message in recent {
        for word in message.content.split_whitespace() {
            total_words += 1;
            unique_words.insert(word.to_lowercase());
        }
    }
    let diversity_factor = if total_words > 0 {
        (unique_words.len() as f64 / total_words as f64) * 100.0
    } else {
        0.0
    };

    let distinct_speakers: HashSet<&str> = recent.iter().map(|m| m.agent_name.as_str()).collect();
    let participation_factor = ((distinct_speakers.len() as f64
        / participant_count.max(1) as f64)
        * 100.0)
        .clamp(0.0, 100.0);

    (length_factor * 0.3 + diversity_factor * 0.4 + participation_factor * 0.3).clamp(0.0, 100.0)
}

/// Productivity: 0.3 timing + 0.4 density + 0.3 turn efficiency.
pub fn productivity_score(recent: &[MessageRow]) -> f64 {
    if recent.len() < 2 {
        return 100.0;
    }

    // Timing: mean gap between consecutive utterances.
    let gaps: Vec<f64> = recent
        .windows(2)
        .map(|pair| (pair[1].created_at - pair[0].created_at).num_milliseconds() as f64 / 1000.0)
        .collect();
    let timing = if gaps.is_empty() {
        75.0
    } else {
        let avg_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;
        if (30.0..=120.0).contains(&avg_gap) {
            100.0
        } else if avg_gap < 30.0 {
            70.0
        } else if avg_gap <= 300.0 {
            80.0
        } else {
            60.0
        }
    };

    // Density: words per utterance, ideal 50-200.
    let word_counts: Vec<f64> = recent
        .iter()
        .map(|m| m.content.split_whitespace().count() as f64)
        .collect();
    let avg_words = word_counts.iter().sum::<f64>() / word_counts.len() as f64;
    let density = if (50.0..=200.0).contains(&avg_words) {
        100.0
    } else if avg_words < 50.0 {
        avg_words.max(50.0)
    } else {
        (100.0 - (avg_words - 200.0) / 10.0).max(70.0)
    };

    // Efficiency: penalise consecutive turns by the same speaker.
    let consecutive_same = recent
        .windows(2)
        .filter(|pair| pair[0].agent_name == pair[1].agent_name)
        .count();
    let efficiency = (1.0 - consecutive_same as f64 / recent.len().max(1) as f64) * 100.0;

    (timing * 0.3 + density * 0.4 + efficiency * 0.3).clamp(0.0, 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn message(seq: i64, agent: &str, content: &str, offset_secs: i64) -> MessageRow {
        MessageRow {
            id: format!("m{seq}"),
            conversation_id: "c1".to_string(),
            sequence_number: seq,
            round_number: 1,
            turn_index: 0,
            agent_name: agent.to_string(),
            agent_model: "gpt-4o".to_string(),
            content: content.to_string(),
            tokens_used: 0,
            response_time_ms: 0.0,
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(HealthStatus::from_score(90.0), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_score(85.0), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_score(75.0), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(60.0), HealthStatus::Fair);
        assert_eq!(HealthStatus::from_score(40.0), HealthStatus::Poor);
    }

    #[test]
    fn participation_uses_configured_count() {
        // Two distinct speakers out of four configured participants.
        let recent = vec![
            message(0, "A", &words(60), 0),
            message(1, "B", &words(60), 60),
        ];
        let with_four = progress_score(&recent, 4);
        let with_two = progress_score(&recent, 2);
        assert!(with_four < with_two);
    }

    #[test]
    fn productivity_single_message_is_max() {
        let recent = vec![message(0, "A", "only one", 0)];
        assert_eq!(productivity_score(&recent), 100.0);
    }

    #[test]
    fn productivity_ideal_window() {
        // 60s gaps, ~100 words each, alternating speakers: all three factors
        // at their maxima.
        let recent = vec![
            message(0, "A", &words(100), 0),
            message(1, "B", &words(100), 60),
            message(2, "A", &words(100), 120),
        ];
        assert!((productivity_score(&recent) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn productivity_penalises_rapid_fire_and_repeats() {
        let recent = vec![
            message(0, "A", &words(100), 0),
            message(1, "A", &words(100), 1),
            message(2, "A", &words(100), 2),
        ];
        // timing=70 (too fast), density=100, efficiency=(1-2/3)*100.
        let expected = 70.0 * 0.3 + 100.0 * 0.4 + (1.0 - 2.0 / 3.0) * 100.0 * 0.3;
        assert!((productivity_score(&recent) - expected).abs() < 1e-9);
    }

    #[test]
    fn density_penalises_very_short_messages() {
        let recent = vec![
            message(0, "A", &words(5), 0),
            message(1, "B", &words(5), 60),
        ];
        // avg 5 words -> density max(50, 5) = 50.
        let score = productivity_score(&recent);
        let expected = 100.0 * 0.3 + 50.0 * 0.4 + 100.0 * 0.3;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn density_penalises_very_long_messages() {
        let recent = vec![
            message(0, "A", &words(600), 0),
            message(1, "B", &words(600), 60),
        ];
        // avg 600 words -> density max(70, 100 - 40) = 70.
        let score = productivity_score(&recent);
        let expected = 100.0 * 0.3 + 70.0 * 0.4 + 100.0 * 0.3;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn progress_is_deterministic() {
        let recent = vec![
            message(0, "A", &words(80), 0),
            message(1, "B", &words(90), 60),
        ];
        assert_eq!(progress_score(&recent, 2), progress_score(&recent, 2));
    }
}
