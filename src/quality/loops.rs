//! Loop detection
//!
//! Looks for repeated speaker-sequence patterns in the recent window,
//! fingerprints the repeated body text, and synthesises an intervention
//! message. A fingerprint already stored for the conversation is not
//! re-inserted, which makes detection idempotent.

use anyhow::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::providers::{ChatMessage, ChatRequest, ProviderRegistry, Role};
use crate::store::{LoopRow, MessageRow, SqliteStore};

/// Minimum messages in a pattern.
pub const MIN_PATTERN_LENGTH: usize = 2;
/// Minimum repetitions to trigger detection.
pub const MIN_REPETITIONS: usize = 2;
/// Recent messages analysed per call.
pub const LOOKBACK_WINDOW: usize = 20;
/// Longest speaker pattern considered.
const MAX_PATTERN_LENGTH: usize = 6;

const INTERVENTION_MODEL: &str = "gpt-4o-mini";

pub struct LoopDetector {
    registry: Arc<ProviderRegistry>,
    store: SqliteStore,
}

/// A repeating pattern found in the speaker sequence.
struct PatternHit {
    /// Speaker names forming the repeated tuple.
    pattern: Vec<String>,
    repetition_count: usize,
    /// Window start offsets of every occurrence.
    occurrences: Vec<usize>,
}

impl LoopDetector {
    pub fn new(registry: Arc<ProviderRegistry>, store: SqliteStore) -> Self {
        Self { registry, store }
    }

    /// Detect a repetitive pattern over `recent` (the caller's tail of the
    /// conversation). Returns the stored loop, or `None` when nothing
    /// repeats or the fingerprint is already known.
    pub async fn detect(
        &self,
        conversation_id: &str,
        recent: &[MessageRow],
    ) -> Result<Option<LoopRow>> {
        if recent.len() < MIN_PATTERN_LENGTH * MIN_REPETITIONS {
            debug!("Not enough messages to detect loops");
            return Ok(None);
        }

        // Clamp to the lookback window.
        let start = recent.len().saturating_sub(LOOKBACK_WINDOW);
        let window = &recent[start..];
        let speakers: Vec<&str> = window.iter().map(|m| m.agent_name.as_str()).collect();

        let max_length = (speakers.len() / 2).min(MAX_PATTERN_LENGTH);
        for pattern_length in (MIN_PATTERN_LENGTH..=max_length).rev() {
            let Some(hit) = find_repeating_pattern(&speakers, pattern_length) else {
                continue;
            };

            // Union of covered message ids, order preserved.
            let mut message_ids: Vec<String> = vec![];
            let mut covered: Vec<&MessageRow> = vec![];
            for &occurrence in &hit.occurrences {
                for offset in 0..pattern_length {
                    let message = &window[occurrence + offset];
                    if !message_ids.contains(&message.id) {
                        message_ids.push(message.id.clone());
                        covered.push(message);
                    }
                }
            }

            let fingerprint = pattern_fingerprint(&covered);
            if self.store.loop_exists(conversation_id, &fingerprint).await? {
                debug!("Loop fingerprint {} already recorded", &fingerprint[..16]);
                return Ok(None);
            }

            let pattern_str = hit.pattern.join(" -> ");
            let mut agents_involved: Vec<String> = vec![];
            for name in &hit.pattern {
                if !agents_involved.contains(name) {
                    agents_involved.push(name.clone());
                }
            }

            let intervention = self
                .generate_intervention(&pattern_str, hit.repetition_count, &covered)
                .await;

            let row = LoopRow {
                id: format!("loop_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
                conversation_id: conversation_id.to_string(),
                pattern: pattern_str.clone(),
                fingerprint,
                message_ids,
                repetition_count: hit.repetition_count as i64,
                agents_involved,
                intervention_text: intervention,
                detected_at: Utc::now(),
            };
            self.store.insert_loop(&row).await?;

            info!(
                "Detected loop in conversation {}: {} repetitions of pattern '{}'",
                conversation_id, row.repetition_count, pattern_str
            );
            return Ok(Some(row));
        }

        debug!("No loops detected");
        Ok(None)
    }

    /// LLM intervention suggesting a new angle; fixed template on failure.
    async fn generate_intervention(
        &self,
        pattern_str: &str,
        repetition_count: usize,
        messages: &[&MessageRow],
    ) -> String {
        let mut summaries = vec![];
        for message in messages.iter().take(6) {
            let snippet = if message.content.len() > 150 {
                format!("{}...", truncate_chars(&message.content, 150))
            } else {
                message.content.clone()
            };
            summaries.push(format!("{}: {}", message.agent_name, snippet));
        }

        let prompt = format!(
            "A conversation has entered a repetitive loop. The pattern \"{pattern_str}\" has \
             repeated {repetition_count} times.\n\n\
             Recent messages in the loop:\n{}\n\n\
             Generate a brief, constructive intervention message (2-3 sentences) that:\n\
             1. Acknowledges the repetition\n\
             2. Suggests a new angle or approach\n\
             3. Encourages moving forward productively\n\n\
             Intervention:",
            summaries.join("\n")
        );

        let request = ChatRequest::new(
            vec![
                ChatMessage::new(
                    Role::System,
                    "You are a facilitator helping conversations avoid repetitive patterns.",
                ),
                ChatMessage::new(Role::User, prompt),
            ],
            INTERVENTION_MODEL,
            0.7,
        );

        let result = match self.registry.provider_for(INTERVENTION_MODEL) {
            Ok(provider) => provider.complete(&request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                error!("Loop intervention generation failed: {e}");
                format!(
                    "The conversation appears to be repeating the pattern '{pattern_str}'. \
                     Let's explore a different angle or approach to move forward productively."
                )
            }
        }
    }
}

/// Find the most frequent `pattern_length`-tuple occurring at least
/// [`MIN_REPETITIONS`] times. Ties are broken by first occurrence.
fn find_repeating_pattern(speakers: &[&str], pattern_length: usize) -> Option<PatternHit> {
    if speakers.len() < pattern_length * MIN_REPETITIONS {
        return None;
    }

    let mut occurrences: HashMap<Vec<&str>, Vec<usize>> = HashMap::new();
    for start in 0..=(speakers.len() - pattern_length) {
        let tuple = speakers[start..start + pattern_length].to_vec();
        occurrences.entry(tuple).or_default().push(start);
    }

    occurrences
        .into_iter()
        .filter(|(_, starts)| starts.len() >= MIN_REPETITIONS)
        .min_by_key(|(_, starts)| (std::cmp::Reverse(starts.len()), starts[0]))
        .map(|(pattern, starts)| PatternHit {
            pattern: pattern.into_iter().map(String::from).collect(),
            repetition_count: starts.len(),
            occurrences: starts,
        })
}

/// Stable SHA-256 fingerprint of the covered utterances: speaker name plus
/// the first 100 characters of each body, normalised.
pub fn pattern_fingerprint(messages: &[&MessageRow]) -> String {
    let segments: Vec<String> = messages
        .iter()
        .map(|m| {
            let snippet = truncate_chars(&m.content, 100).trim().to_lowercase();
            format!("{}:{}", m.agent_name, snippet)
        })
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(segments.join("|").as_bytes());
    format!("{:x}", hasher.finalize())
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speakers(names: &[&'static str]) -> Vec<&'static str> {
        names.to_vec()
    }

    fn message(id: &str, agent: &str, content: &str) -> MessageRow {
        MessageRow {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            sequence_number: 0,
            round_number: 1,
            turn_index: 0,
            agent_name: agent.to_string(),
            agent_model: "gpt-4o".to_string(),
            content: content.to_string(),
            tokens_used: 0,
            response_time_ms: 0.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn finds_alternating_pair_pattern() {
        let seq = speakers(&["A", "B", "A", "B"]);
        let hit = find_repeating_pattern(&seq, 2).unwrap();
        assert_eq!(hit.pattern, vec!["A", "B"]);
        assert_eq!(hit.repetition_count, 2);
        assert_eq!(hit.occurrences, vec![0, 2]);
    }

    #[test]
    fn no_pattern_in_distinct_sequence() {
        let seq = speakers(&["A", "B", "C", "D"]);
        assert!(find_repeating_pattern(&seq, 2).is_none());
    }

    #[test]
    fn ties_break_on_first_occurrence() {
        // Both ("A","B") and ("B","A") repeat twice; ("A","B") appears first.
        let seq = speakers(&["A", "B", "A", "B", "A"]);
        let hit = find_repeating_pattern(&seq, 2).unwrap();
        assert_eq!(hit.pattern, vec!["A", "B"]);
    }

    #[test]
    fn fingerprint_is_stable_and_normalised() {
        let a1 = message("m1", "A", "Hello World");
        let b1 = message("m2", "B", "Reply");
        let a2 = message("m1", "A", "  hello world  ");
        let b2 = message("m2", "B", "reply");

        let f1 = pattern_fingerprint(&[&a1, &b1]);
        let f2 = pattern_fingerprint(&[&a2, &b2]);
        assert_eq!(f1.len(), 64);
        assert_eq!(f1, f2);
        assert_ne!(f1, pattern_fingerprint(&[&b1, &a1]));
    }

    #[test]
    fn fingerprint_uses_first_100_chars_only() {
        let long_a = message("m1", "A", &format!("{}{}", "x".repeat(100), "AAA"));
        let long_b = message("m1", "A", &format!("{}{}", "x".repeat(100), "BBB"));
        assert_eq!(
            pattern_fingerprint(&[&long_a]),
            pattern_fingerprint(&[&long_b])
        );
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 5), "héllo");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }

    #[tokio::test]
    async fn too_few_messages_returns_none() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let registry = Arc::new(ProviderRegistry::new());
        let detector = LoopDetector::new(registry, store);

        let recent = vec![
            message("m1", "A", "one"),
            message("m2", "B", "two"),
            message("m3", "A", "three"),
        ];
        let result = detector.detect("c1", &recent).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn detects_and_deduplicates_by_fingerprint() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        // Empty registry: intervention falls back to the template.
        let registry = Arc::new(ProviderRegistry::new());
        let detector = LoopDetector::new(registry, store.clone());

        let recent = vec![
            message("m1", "A", "same point"),
            message("m2", "B", "same reply"),
            message("m3", "A", "same point"),
            message("m4", "B", "same reply"),
        ];

        let first = detector.detect("c1", &recent).await.unwrap().unwrap();
        assert!(first.repetition_count >= 2);
        assert!(first.pattern.contains("A"));
        assert!(first.intervention_text.contains("different angle"));
        assert!(!first.message_ids.is_empty());

        // Second run over identical state yields no new rows.
        let second = detector.detect("c1", &recent).await.unwrap();
        assert!(second.is_none());
        assert_eq!(store.loop_count("c1").await.unwrap(), 1);
    }
}
