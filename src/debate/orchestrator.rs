//! Debate orchestrator
//!
//! Owns the per-debate state machine and drives one turn per `next_turn`
//! call, emitting a totally ordered event sequence on the caller's channel.
//! The turn pointer is committed to the registry *before*
//! `participant_complete` goes out: a common client closes the stream on
//! that event, and a later read must never observe a stale pointer.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::events::{DebateEvent, StampedEvent};
use super::registry::DebateRegistry;
use super::{Debate, DebateConfig, DebateStatus, Response, Round};
use crate::context;
use crate::error::{QuorumError, QuorumResult};
use crate::providers::{ChatProvider, ChatRequest, ProviderRegistry};
use crate::quality::{QualityEvent, QualityPipeline, TurnRecord};
use crate::tokens;

/// Per-turn wall-clock budget.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);

pub struct Orchestrator {
    registry: Arc<DebateRegistry>,
    providers: Arc<ProviderRegistry>,
    pipeline: Arc<QualityPipeline>,
    turn_timeout: Duration,
}

/// How the provider call for a turn ended.
enum StreamOutcome {
    /// Full text accumulated, turn can commit.
    Finished(String),
    /// A stop request was observed mid-stream; the turn is abandoned.
    Stopped,
    /// Provider failure; the debate enters the Error state.
    Failed(String),
    TimedOut,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<DebateRegistry>,
        providers: Arc<ProviderRegistry>,
        pipeline: Arc<QualityPipeline>,
    ) -> Self {
        Self {
            registry,
            providers,
            pipeline,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
        }
    }

    pub fn with_turn_timeout(mut self, turn_timeout: Duration) -> Self {
        self.turn_timeout = turn_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<DebateRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Lifecycle operations
    // ------------------------------------------------------------------

    pub async fn create_debate(&self, config: DebateConfig) -> QuorumResult<Debate> {
        config.validate()?;
        let debate = Debate::new(config);
        info!(
            "Created debate {} with {} participants, {} rounds",
            debate.id,
            debate.config.participants.len(),
            debate.config.max_rounds
        );
        self.registry.insert(debate.clone()).await;
        Ok(debate)
    }

    pub async fn get_debate(&self, id: &str) -> QuorumResult<Debate> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| QuorumError::NotFound(id.to_string()))
    }

    pub async fn list_debates(&self) -> Vec<Debate> {
        self.registry.list().await
    }

    pub async fn delete_debate(&self, id: &str) -> QuorumResult<()> {
        if self.registry.remove(id).await {
            Ok(())
        } else {
            Err(QuorumError::NotFound(id.to_string()))
        }
    }

    pub async fn stop(&self, id: &str) -> QuorumResult<Debate> {
        let debate = self.registry.stop(id).await?;
        info!(
            "Debate {} stopped manually at round {}, turn {}",
            id, debate.current_round, debate.current_turn
        );
        Ok(debate)
    }

    pub async fn pause(&self, id: &str) -> QuorumResult<Debate> {
        self.registry.pause(id).await
    }

    pub async fn resume(&self, id: &str) -> QuorumResult<Debate> {
        self.registry.resume(id).await
    }

    // ------------------------------------------------------------------
    // The turn driver
    // ------------------------------------------------------------------

    /// Drive one participant turn, emitting events on `tx`.
    ///
    /// Refuses with `NotFound`/`InvalidState` before anything is emitted;
    /// once the stream is live, failures surface as events and the call
    /// returns `Ok`.
    pub async fn next_turn(&self, id: &str, tx: mpsc::Sender<StampedEvent>) -> QuorumResult<()> {
        let mut debate = self.get_debate(id).await?;

        // Pause refuses the next turn; it never cancels an in-flight one.
        if debate.status == DebateStatus::Paused {
            return Err(QuorumError::InvalidState(format!(
                "Debate {id} is paused"
            )));
        }

        // Already complete: emit the (idempotent) terminal event and leave.
        if debate.is_complete() {
            self.finalize(&mut debate, "Debate is complete", &tx).await;
            return Ok(());
        }

        if debate.status == DebateStatus::Initialized {
            debate.status = DebateStatus::Running;
            debate.updated_at = chrono::Utc::now();
            self.registry.commit(debate.clone()).await;
            send(
                &tx,
                DebateEvent::DebateStart {
                    topic: debate.config.topic.clone(),
                    participants: debate
                        .config
                        .participants
                        .iter()
                        .map(|p| p.name.clone())
                        .collect(),
                    max_rounds: debate.config.max_rounds,
                },
                debate.current_round,
                0,
            )
            .await;
        }

        let participant = debate.current_participant().clone();
        let round_number = debate.current_round;
        let turn_index = debate.current_turn;

        info!(
            "Debate {}: Round {}, Turn {} ({})",
            id, round_number, turn_index, participant.name
        );

        send(
            &tx,
            DebateEvent::ParticipantStart {
                participant_name: participant.name.clone(),
                participant_index: turn_index,
                model: participant.model.clone(),
            },
            round_number,
            turn_index,
        )
        .await;

        // Bounded context for this participant.
        let assembled = context::build_context(&debate.config, &debate.rounds, &participant);
        let input_tokens = assembled.input_tokens;
        let request = ChatRequest::new(
            assembled.messages,
            participant.model.clone(),
            participant.temperature,
        );

        let started = std::time::Instant::now();
        let outcome = match self.providers.provider_for(&participant.model) {
            Ok(provider) => {
                self.run_provider_call(id, provider, request, &participant.name, round_number, turn_index, &tx)
                    .await
            }
            Err(e) => StreamOutcome::Failed(e.to_string()),
        };

        let accumulated = match outcome {
            StreamOutcome::Finished(text) => text,
            StreamOutcome::Stopped => {
                // Wind down without committing the abandoned turn. The
                // authoritative record already carries the stop.
                if let Some(latest) = self.registry.get(id).await {
                    debate = latest;
                }
                self.finalize(&mut debate, "Debate is complete", &tx).await;
                return Ok(());
            }
            StreamOutcome::Failed(message) => {
                error!("Provider error in debate {id}: {message}");
                debate.status = DebateStatus::Error;
                debate.updated_at = chrono::Utc::now();
                self.registry.commit(debate).await;
                send(
                    &tx,
                    DebateEvent::Error {
                        error: message,
                        participant_name: Some(participant.name.clone()),
                        non_critical: false,
                    },
                    round_number,
                    turn_index,
                )
                .await;
                return Ok(());
            }
            StreamOutcome::TimedOut => {
                warn!("Turn timed out in debate {id} after {:?}", self.turn_timeout);
                debate.status = DebateStatus::Error;
                debate.updated_at = chrono::Utc::now();
                self.registry.commit(debate).await;
                send(
                    &tx,
                    DebateEvent::Error {
                        error: "timeout".to_string(),
                        participant_name: Some(participant.name.clone()),
                        non_critical: false,
                    },
                    round_number,
                    turn_index,
                )
                .await;
                return Ok(());
            }
        };

        // Commit the response and advance the turn pointer.
        let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let output_tokens = tokens::count_tokens(&accumulated, &participant.model);
        let total_turn_tokens = input_tokens + output_tokens;
        let cost = tokens::estimate_cost(input_tokens, output_tokens, &participant.model);

        let round_slot = (round_number - 1) as usize;
        if round_slot >= debate.rounds.len() || turn_index >= debate.config.participants.len() {
            // Internal invariant broken; never silently continue.
            debate.status = DebateStatus::Error;
            self.registry.commit(debate).await;
            send(
                &tx,
                DebateEvent::Error {
                    error: format!(
                        "internal: turn pointer ({round_number},{turn_index}) out of range"
                    ),
                    participant_name: None,
                    non_critical: false,
                },
                round_number,
                turn_index,
            )
            .await;
            return Ok(());
        }

        {
            let round = &mut debate.rounds[round_slot];
            round.responses.push(Response {
                participant_name: participant.name.clone(),
                participant_index: turn_index,
                model: participant.model.clone(),
                content: accumulated.clone(),
                tokens_used: total_turn_tokens,
                response_time_ms,
                timestamp: chrono::Utc::now(),
            });
            *round.tokens_used.entry(participant.model.clone()).or_insert(0) +=
                total_turn_tokens as u64;
            round.cost_estimate += cost;
        }
        *debate
            .total_tokens
            .entry(participant.model.clone())
            .or_insert(0) += total_turn_tokens as u64;
        debate.total_cost += cost;

        // Advance before participant_complete (see module docs). A fresh
        // round is appended only while within the round budget.
        let participant_count = debate.config.participants.len();
        let mut wrapped = false;
        debate.current_turn += 1;
        if debate.current_turn >= participant_count {
            debate.current_turn = 0;
            debate.current_round += 1;
            wrapped = true;
            if debate.current_round <= debate.config.max_rounds {
                debate.rounds.push(Round::new(debate.current_round));
            }
        }
        debate.updated_at = chrono::Utc::now();

        // A stop or pause may have landed on the authoritative record while
        // this turn was in flight; committing must not erase it.
        if let Some(latest) = self.registry.get(id).await {
            if latest.stopped_manually {
                debate.stopped_manually = true;
                debate.status = DebateStatus::Stopped;
            } else if latest.status == DebateStatus::Paused {
                debate.status = DebateStatus::Paused;
            }
        }
        self.registry.commit(debate.clone()).await;

        send(
            &tx,
            DebateEvent::ParticipantComplete {
                participant_name: participant.name.clone(),
                tokens_used: total_turn_tokens,
                cost,
                response_time_ms,
            },
            round_number,
            turn_index,
        )
        .await;

        // Quality pipeline for this utterance. Sequence number is the count
        // of utterances before this turn.
        let sequence_number = ((round_number - 1) as usize * participant_count + turn_index) as i64;
        let record = TurnRecord {
            debate_id: debate.id.clone(),
            topic: debate.config.topic.clone(),
            participant_name: participant.name.clone(),
            participant_model: participant.model.clone(),
            content: accumulated,
            sequence_number,
            round_number,
            turn_index,
            tokens_used: total_turn_tokens,
            response_time_ms,
            participant_count,
        };
        for event in self.pipeline.process_turn(&record).await {
            let event = match event {
                QualityEvent::NonCriticalError { error } => DebateEvent::Error {
                    error,
                    participant_name: None,
                    non_critical: true,
                },
                other => DebateEvent::QualityUpdate(other),
            };
            send(&tx, event, round_number, turn_index).await;
        }

        let round_cost = debate.rounds[round_slot].cost_estimate;
        send(
            &tx,
            DebateEvent::CostUpdate {
                total_cost: debate.total_cost,
                round_cost,
                total_tokens: debate.total_tokens.clone(),
                warning_threshold: debate.config.cost_warning_threshold,
                warning_level: tokens::cost_warning_level(
                    debate.total_cost,
                    debate.config.cost_warning_threshold,
                ),
            },
            round_number,
            turn_index,
        )
        .await;

        if wrapped {
            send(
                &tx,
                DebateEvent::RoundComplete {
                    round_number,
                    responses_count: debate.rounds[round_slot].responses.len(),
                    round_cost,
                },
                round_number,
                0,
            )
            .await;

            if !debate.is_complete() {
                send(
                    &tx,
                    DebateEvent::RoundStart {
                        round_number: debate.current_round,
                        max_rounds: debate.config.max_rounds,
                    },
                    debate.current_round,
                    0,
                )
                .await;
            }
        }

        if debate.is_complete() {
            self.finalize(&mut debate, "Debate completed all rounds", &tx).await;
        }

        Ok(())
    }

    /// Transition to the terminal state, commit, and emit `debate_complete`.
    async fn finalize(&self, debate: &mut Debate, message: &str, tx: &mpsc::Sender<StampedEvent>) {
        if !debate.status.is_terminal() {
            debate.status = if debate.stopped_manually {
                DebateStatus::Stopped
            } else {
                DebateStatus::Completed
            };
            debate.updated_at = chrono::Utc::now();
            self.registry.commit(debate.clone()).await;
        }

        send(
            tx,
            DebateEvent::DebateComplete {
                message: message.to_string(),
                rounds_completed: debate.rounds.len(),
                stopped_manually: debate.stopped_manually,
                total_cost: debate.total_cost,
            },
            debate.current_round,
            debate.current_turn,
        )
        .await;
    }

    /// Run the provider call for a turn, relaying chunks and honouring stop
    /// requests and the per-turn deadline.
    #[allow(clippy::too_many_arguments)]
    async fn run_provider_call(
        &self,
        id: &str,
        provider: Arc<dyn ChatProvider>,
        request: ChatRequest,
        participant_name: &str,
        round_number: u32,
        turn_index: usize,
        tx: &mpsc::Sender<StampedEvent>,
    ) -> StreamOutcome {
        let deadline = Instant::now() + self.turn_timeout;

        if !provider.supports_streaming() {
            // Known-unreliable streaming for this family: complete, then
            // relay the reply as a single chunk.
            let result = tokio::time::timeout_at(deadline, provider.complete(&request)).await;
            return match result {
                Err(_) => StreamOutcome::TimedOut,
                Ok(Err(e)) => StreamOutcome::Failed(e.to_string()),
                Ok(Ok(text)) => {
                    if !text.is_empty() {
                        send(
                            tx,
                            DebateEvent::Chunk {
                                text: text.clone(),
                                participant_name: participant_name.to_string(),
                            },
                            round_number,
                            turn_index,
                        )
                        .await;
                    }
                    if self.registry.stop_requested(id).await {
                        StreamOutcome::Stopped
                    } else {
                        StreamOutcome::Finished(text)
                    }
                }
            };
        }

        let (delta_tx, mut delta_rx) = mpsc::channel::<String>(100);
        let stream_provider = provider.clone();
        let stream_request = request.clone();
        let handle =
            tokio::spawn(async move { stream_provider.stream(&stream_request, delta_tx).await });

        let mut accumulated = String::new();
        loop {
            match tokio::time::timeout_at(deadline, delta_rx.recv()).await {
                Err(_) => {
                    handle.abort();
                    return StreamOutcome::TimedOut;
                }
                Ok(None) => break,
                Ok(Some(delta)) => {
                    if delta.is_empty() {
                        continue;
                    }
                    accumulated.push_str(&delta);
                    send(
                        tx,
                        DebateEvent::Chunk {
                            text: delta,
                            participant_name: participant_name.to_string(),
                        },
                        round_number,
                        turn_index,
                    )
                    .await;

                    // Delta arrival is a suspension point: honour stop after
                    // finishing the in-flight delta.
                    if self.registry.stop_requested(id).await {
                        handle.abort();
                        return StreamOutcome::Stopped;
                    }
                }
            }
        }

        match tokio::time::timeout_at(deadline, handle).await {
            Err(_) => StreamOutcome::TimedOut,
            Ok(Ok(Ok(_full_text))) => StreamOutcome::Finished(accumulated),
            Ok(Ok(Err(e))) => StreamOutcome::Failed(e.to_string()),
            Ok(Err(e)) => StreamOutcome::Failed(format!("provider task failed: {e}")),
        }
    }
}

async fn send(
    tx: &mpsc::Sender<StampedEvent>,
    event: DebateEvent,
    round_number: u32,
    turn_index: usize,
) {
    // A closed subscriber must not stall the driver; state is already
    // committed where it matters.
    let _ = tx
        .send(StampedEvent {
            event,
            round_number,
            turn_index,
        })
        .await;
}
