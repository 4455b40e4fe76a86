//! Debate events and the push-stream wire encoding
//!
//! The driver emits [`DebateEvent`]s on a channel; the HTTP adapter encodes
//! each one as an [`EventFrame`] — the JSON object carried in a single SSE
//! `data:` frame. Field names are part of the external contract.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::quality::QualityEvent;
use crate::tokens::CostWarningLevel;

/// A domain event produced by the turn driver, in stream order.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    DebateStart {
        topic: String,
        participants: Vec<String>,
        max_rounds: u32,
    },
    RoundStart {
        round_number: u32,
        max_rounds: u32,
    },
    ParticipantStart {
        participant_name: String,
        participant_index: usize,
        model: String,
    },
    Chunk {
        text: String,
        participant_name: String,
    },
    ParticipantComplete {
        participant_name: String,
        tokens_used: usize,
        cost: f64,
        response_time_ms: f64,
    },
    QualityUpdate(QualityEvent),
    CostUpdate {
        total_cost: f64,
        round_cost: f64,
        total_tokens: HashMap<String, u64>,
        warning_threshold: f64,
        warning_level: CostWarningLevel,
    },
    RoundComplete {
        round_number: u32,
        responses_count: usize,
        round_cost: f64,
    },
    DebateComplete {
        message: String,
        rounds_completed: usize,
        stopped_manually: bool,
        total_cost: f64,
    },
    Error {
        error: String,
        participant_name: Option<String>,
        non_critical: bool,
    },
}

impl DebateEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DebateEvent::DebateStart { .. } => "debate_start",
            DebateEvent::RoundStart { .. } => "round_start",
            DebateEvent::ParticipantStart { .. } => "participant_start",
            DebateEvent::Chunk { .. } => "chunk",
            DebateEvent::ParticipantComplete { .. } => "participant_complete",
            DebateEvent::QualityUpdate(_) => "quality_update",
            DebateEvent::CostUpdate { .. } => "cost_update",
            DebateEvent::RoundComplete { .. } => "round_complete",
            DebateEvent::DebateComplete { .. } => "debate_complete",
            DebateEvent::Error { .. } => "error",
        }
    }

    fn data(&self) -> Value {
        match self {
            DebateEvent::DebateStart {
                topic,
                participants,
                max_rounds,
            } => json!({
                "topic": topic,
                "participants": participants,
                "max_rounds": max_rounds,
            }),
            DebateEvent::RoundStart {
                round_number,
                max_rounds,
            } => json!({
                "round_number": round_number,
                "max_rounds": max_rounds,
            }),
            DebateEvent::ParticipantStart {
                participant_name,
                participant_index,
                model,
            } => json!({
                "participant_name": participant_name,
                "participant_index": participant_index,
                "model": model,
            }),
            DebateEvent::Chunk {
                text,
                participant_name,
            } => json!({
                "text": text,
                "participant_name": participant_name,
            }),
            DebateEvent::ParticipantComplete {
                participant_name,
                tokens_used,
                cost,
                response_time_ms,
            } => json!({
                "participant_name": participant_name,
                "tokens_used": tokens_used,
                "cost": cost,
                "response_time_ms": response_time_ms,
            }),
            DebateEvent::QualityUpdate(event) => quality_data(event),
            DebateEvent::CostUpdate {
                total_cost,
                round_cost,
                total_tokens,
                warning_threshold,
                warning_level,
            } => json!({
                "total_cost": total_cost,
                "round_cost": round_cost,
                "total_tokens": total_tokens,
                "warning_threshold": warning_threshold,
                "warning_level": warning_level,
            }),
            DebateEvent::RoundComplete {
                round_number,
                responses_count,
                round_cost,
            } => json!({
                "round_number": round_number,
                "responses_count": responses_count,
                "round_cost": round_cost,
            }),
            DebateEvent::DebateComplete {
                message,
                rounds_completed,
                stopped_manually,
                total_cost,
            } => json!({
                "message": message,
                "rounds_completed": rounds_completed,
                "stopped_manually": stopped_manually,
                "total_cost": total_cost,
            }),
            DebateEvent::Error {
                error,
                participant_name,
                non_critical,
            } => {
                let mut data = json!({ "error": error });
                if let Some(name) = participant_name {
                    data["participant_name"] = json!(name);
                }
                if *non_critical {
                    data["non_critical"] = json!(true);
                }
                data
            }
        }
    }
}

fn quality_data(event: &QualityEvent) -> Value {
    match event {
        QualityEvent::Contradiction {
            contradiction_id,
            severity,
            similarity,
            explanation,
        } => json!({
            "quality_type": "contradiction",
            "contradiction_id": contradiction_id,
            "severity": severity,
            "similarity_score": similarity,
            "explanation": explanation,
        }),
        QualityEvent::Loop {
            loop_id,
            repetition_count,
            intervention_text,
        } => json!({
            "quality_type": "loop",
            "loop_id": loop_id,
            "repetition_count": repetition_count,
            "intervention_text": intervention_text,
        }),
        QualityEvent::HealthScore {
            score,
            status,
            coherence,
            progress,
            productivity,
            message_count,
        } => json!({
            "quality_type": "health_score",
            "score": score,
            "status": status,
            "coherence": coherence,
            "progress": progress,
            "productivity": productivity,
            "details": { "message_count": message_count },
        }),
        QualityEvent::NonCriticalError { error } => json!({
            "quality_type": "error",
            "error": error,
        }),
    }
}

/// One SSE frame: `data: <this, as JSON>\n\n`.
#[derive(Debug, Clone, Serialize)]
pub struct EventFrame {
    pub event_type: &'static str,
    pub debate_id: String,
    pub round_number: u32,
    pub turn_index: usize,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl EventFrame {
    pub fn new(event: &DebateEvent, debate_id: &str, round_number: u32, turn_index: usize) -> Self {
        Self {
            event_type: event.event_type(),
            debate_id: debate_id.to_string(),
            round_number,
            turn_index,
            data: event.data(),
            timestamp: Utc::now(),
        }
    }

    /// JSON payload for the `data:` line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// An event stamped with the turn pointer it was emitted under.
#[derive(Debug, Clone)]
pub struct StampedEvent {
    pub event: DebateEvent,
    pub round_number: u32,
    pub turn_index: usize,
}

impl StampedEvent {
    pub fn frame(&self, debate_id: &str) -> EventFrame {
        EventFrame::new(&self.event, debate_id, self.round_number, self.turn_index)
    }
}
