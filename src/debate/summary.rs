//! Summary rendering
//!
//! Pure function from final debate state to a summary: per-participant
//! statistics plus a markdown transcript. Computed lazily by the summary
//! endpoint; nothing here mutates the debate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::{Debate, DebateStatus};

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantStats {
    pub name: String,
    pub model: String,
    pub total_tokens: u64,
    /// Share of the debate cost proportional to this participant's tokens.
    pub total_cost: f64,
    pub average_response_time_ms: f64,
    pub response_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebateSummary {
    pub debate_id: String,
    pub topic: String,
    pub status: DebateStatus,
    pub rounds_completed: usize,
    pub total_rounds: u32,
    pub participants: Vec<String>,
    pub participant_stats: Vec<ParticipantStats>,
    pub total_tokens: HashMap<String, u64>,
    pub total_cost: f64,
    pub duration_seconds: f64,
    pub markdown_transcript: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Render the summary for a debate in any state.
pub fn generate_summary(debate: &Debate) -> DebateSummary {
    let participant_stats = calculate_participant_stats(debate);
    let markdown_transcript = generate_markdown_transcript(debate, &participant_stats);
    let duration_seconds = (debate.updated_at - debate.created_at).num_milliseconds() as f64 / 1000.0;

    DebateSummary {
        debate_id: debate.id.clone(),
        topic: debate.config.topic.clone(),
        status: debate.status,
        rounds_completed: debate.rounds.len(),
        total_rounds: debate.config.max_rounds,
        participants: debate.config.participants.iter().map(|p| p.name.clone()).collect(),
        participant_stats,
        total_tokens: debate.total_tokens.clone(),
        total_cost: debate.total_cost,
        duration_seconds,
        markdown_transcript,
        created_at: debate.created_at,
        completed_at: debate.updated_at,
    }
}

fn calculate_participant_stats(debate: &Debate) -> Vec<ParticipantStats> {
    struct Tally {
        model: String,
        total_tokens: u64,
        response_times: Vec<f64>,
    }

    // Keep config order.
    let mut tallies: Vec<(String, Tally)> = debate
        .config
        .participants
        .iter()
        .map(|p| {
            (
                p.name.clone(),
                Tally {
                    model: p.model.clone(),
                    total_tokens: 0,
                    response_times: vec![],
                },
            )
        })
        .collect();

    for round in &debate.rounds {
        for response in &round.responses {
            if let Some((_, tally)) = tallies.iter_mut().find(|(name, _)| *name == response.participant_name)
            {
                tally.total_tokens += response.tokens_used as u64;
                tally.response_times.push(response.response_time_ms);
            }
        }
    }

    let total_tokens_all: u64 = debate.total_tokens.values().sum();

    tallies
        .into_iter()
        .map(|(name, tally)| {
            // Cost attribution is proportional to token usage.
            let total_cost = if total_tokens_all > 0 {
                debate.total_cost * (tally.total_tokens as f64 / total_tokens_all as f64)
            } else {
                0.0
            };
            let average_response_time_ms = if tally.response_times.is_empty() {
                0.0
            } else {
                tally.response_times.iter().sum::<f64>() / tally.response_times.len() as f64
            };
            ParticipantStats {
                name,
                model: tally.model,
                total_tokens: tally.total_tokens,
                total_cost,
                average_response_time_ms,
                response_count: tally.response_times.len(),
            }
        })
        .collect()
}

fn generate_markdown_transcript(debate: &Debate, participant_stats: &[ParticipantStats]) -> String {
    let mut lines = vec![];

    lines.push("# Debate Transcript\n".to_string());
    lines.push(format!("**Topic:** {}\n", debate.config.topic));
    lines.push(format!("**Status:** {}\n", debate.status.as_str()));
    lines.push(format!(
        "**Rounds Completed:** {} / {}\n",
        debate.rounds.len(),
        debate.config.max_rounds
    ));
    lines.push(format!(
        "**Participants:** {}\n",
        debate
            .config
            .participants
            .iter()
            .map(|p| p.name.clone())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    lines.push(format!("**Total Cost:** ${:.4}\n", debate.total_cost));
    lines.push(format!(
        "**Created:** {}\n",
        debate.created_at.format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(format!(
        "**Completed:** {}\n",
        debate.updated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push("\n---\n".to_string());

    for round in &debate.rounds {
        lines.push(format!("\n## Round {}\n", round.round_number));
        lines.push(format!("*Cost: ${:.4}*\n", round.cost_estimate));

        for response in &round.responses {
            lines.push(format!(
                "\n### {} ({})\n",
                response.participant_name, response.model
            ));
            lines.push(format!(
                "*Tokens: {} | Response Time: {:.0}ms*\n",
                response.tokens_used, response.response_time_ms
            ));
            lines.push(format!("\n{}\n", response.content));
        }

        lines.push("\n---\n".to_string());
    }

    lines.push("\n## Statistics\n".to_string());
    lines.push("\n### Participant Performance\n".to_string());
    for stats in participant_stats {
        lines.push(format!("\n**{}** ({})", stats.name, stats.model));
        lines.push(format!("- Responses: {}", stats.response_count));
        lines.push(format!("- Total Tokens: {}", stats.total_tokens));
        lines.push(format!("- Cost: ${:.4}", stats.total_cost));
        lines.push(format!(
            "- Avg Response Time: {:.0}ms\n",
            stats.average_response_time_ms
        ));
    }

    lines.push("\n### Token Usage by Model\n".to_string());
    for (model, tokens) in &debate.total_tokens {
        lines.push(format!("- **{model}**: {tokens} tokens\n"));
    }

    lines.push("\n### Total Cost\n".to_string());
    lines.push(format!("**${:.4}**\n", debate.total_cost));

    lines.join("")
}
