//! Debate domain model
//!
//! Types for the per-debate state machine: configuration, rounds, responses
//! and the mutable `Debate` owned by the orchestrator. Validation bounds
//! live here so the HTTP layer stays a thin adapter.

pub mod events;
pub mod orchestrator;
pub mod registry;
pub mod summary;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::QuorumError;

pub const MIN_PARTICIPANTS: usize = 2;
pub const MAX_PARTICIPANTS: usize = 4;
pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 5;
pub const MIN_CONTEXT_WINDOW_ROUNDS: u32 = 3;
pub const MAX_CONTEXT_WINDOW_ROUNDS: u32 = 20;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a thoughtful debate participant. Engage with the \
     topic and other participants' arguments carefully and respectfully.";

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_context_window_rounds() -> u32 {
    10
}

fn default_cost_warning_threshold() -> f64 {
    1.0
}

// ============================================================================
// Configuration
// ============================================================================

/// One debate participant. `name` is unique within a config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    /// Opaque model identifier understood by the provider layer.
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Immutable debate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    pub topic: String,
    pub participants: Vec<Participant>,
    pub max_rounds: u32,
    #[serde(default = "default_context_window_rounds")]
    pub context_window_rounds: u32,
    #[serde(default = "default_cost_warning_threshold")]
    pub cost_warning_threshold: f64,
}

impl DebateConfig {
    /// Validate all bounds, returning the first violation with its field
    /// path.
    pub fn validate(&self) -> Result<(), QuorumError> {
        if self.topic.trim().is_empty() {
            return Err(QuorumError::validation("topic", "must not be empty"));
        }
        if self.participants.len() < MIN_PARTICIPANTS || self.participants.len() > MAX_PARTICIPANTS {
            return Err(QuorumError::validation(
                "participants",
                format!(
                    "must have {MIN_PARTICIPANTS}-{MAX_PARTICIPANTS} entries, got {}",
                    self.participants.len()
                ),
            ));
        }
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&self.max_rounds) {
            return Err(QuorumError::validation(
                "max_rounds",
                format!("must be {MIN_ROUNDS}-{MAX_ROUNDS}, got {}", self.max_rounds),
            ));
        }
        if !(MIN_CONTEXT_WINDOW_ROUNDS..=MAX_CONTEXT_WINDOW_ROUNDS)
            .contains(&self.context_window_rounds)
        {
            return Err(QuorumError::validation(
                "context_window_rounds",
                format!(
                    "must be {MIN_CONTEXT_WINDOW_ROUNDS}-{MAX_CONTEXT_WINDOW_ROUNDS}, got {}",
                    self.context_window_rounds
                ),
            ));
        }
        if self.cost_warning_threshold < 0.0 {
            return Err(QuorumError::validation(
                "cost_warning_threshold",
                "must be non-negative",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (index, participant) in self.participants.iter().enumerate() {
            if participant.name.trim().is_empty() {
                return Err(QuorumError::validation(
                    format!("participants[{index}].name"),
                    "must not be empty",
                ));
            }
            if !seen.insert(participant.name.clone()) {
                return Err(QuorumError::validation(
                    format!("participants[{index}].name"),
                    format!("duplicate participant name '{}'", participant.name),
                ));
            }
            if !(0.0..=2.0).contains(&participant.temperature) {
                return Err(QuorumError::validation(
                    format!("participants[{index}].temperature"),
                    format!("must be 0.0-2.0, got {}", participant.temperature),
                ));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Runtime state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStatus {
    Initialized,
    Running,
    Paused,
    Stopped,
    Completed,
    Error,
}

impl DebateStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DebateStatus::Stopped | DebateStatus::Completed | DebateStatus::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DebateStatus::Initialized => "initialized",
            DebateStatus::Running => "running",
            DebateStatus::Paused => "paused",
            DebateStatus::Stopped => "stopped",
            DebateStatus::Completed => "completed",
            DebateStatus::Error => "error",
        }
    }
}

/// One participant's committed contribution within a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub participant_name: String,
    pub participant_index: usize,
    pub model: String,
    pub content: String,
    /// Input + output tokens of the producing call.
    pub tokens_used: usize,
    pub response_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// One cycle in which every participant speaks once, in config order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// 1-indexed; matches position in `Debate::rounds`.
    pub round_number: u32,
    pub responses: Vec<Response>,
    pub tokens_used: HashMap<String, u64>,
    pub cost_estimate: f64,
    pub timestamp: DateTime<Utc>,
}

impl Round {
    pub fn new(round_number: u32) -> Self {
        Self {
            round_number,
            responses: vec![],
            tokens_used: HashMap::new(),
            cost_estimate: 0.0,
            timestamp: Utc::now(),
        }
    }
}

/// Mutable per-debate state. Single owner: the orchestrator; observers get
/// cloned snapshots from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debate {
    pub id: String,
    pub config: DebateConfig,
    pub status: DebateStatus,
    pub rounds: Vec<Round>,
    /// 1-indexed pointer into `rounds`.
    pub current_round: u32,
    /// 0-indexed pointer within the current round; equals the number of
    /// responses committed so far this round.
    pub current_turn: usize,
    pub total_tokens: HashMap<String, u64>,
    pub total_cost: f64,
    pub stopped_manually: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debate {
    pub fn new(config: DebateConfig) -> Self {
        let now = Utc::now();
        Self {
            id: format!("debate_v2_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
            config,
            status: DebateStatus::Initialized,
            rounds: vec![Round::new(1)],
            current_round: 1,
            current_turn: 0,
            total_tokens: HashMap::new(),
            total_cost: 0.0,
            stopped_manually: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_participant(&self) -> &Participant {
        &self.config.participants[self.current_turn]
    }

    /// A debate is complete iff stopped manually, past its round budget, or
    /// already in a terminal state.
    pub fn is_complete(&self) -> bool {
        self.stopped_manually
            || self.current_round > self.config.max_rounds
            || self.status.is_terminal()
    }

    /// Total committed responses; also the next utterance sequence number.
    pub fn response_count(&self) -> usize {
        self.rounds.iter().map(|r| r.responses.len()).sum()
    }
}
