// src/context.rs
// Bounded context assembly for a participant's turn.

use tracing::{debug, warn};

use crate::debate::{DebateConfig, Participant, Round};
use crate::providers::{ChatMessage, Role};
use crate::tokens;

/// Default per-model context ceiling in tokens.
pub const MAX_CONTEXT_TOKENS: usize = 100_000;

/// Messages plus their counted input tokens, ready for a provider call.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub messages: Vec<ChatMessage>,
    pub input_tokens: usize,
}

/// Build the message sequence for `participant`'s next turn.
///
/// Chat APIs expect the final entry before the model responds to carry the
/// user role, so the transcript is folded into a single user message rather
/// than replayed as alternating turns. The system message carries only the
/// participant's own instructions.
pub fn build_context(
    config: &DebateConfig,
    rounds: &[Round],
    participant: &Participant,
) -> AssembledContext {
    build_context_with_budget(config, rounds, participant, MAX_CONTEXT_TOKENS)
}

pub fn build_context_with_budget(
    config: &DebateConfig,
    rounds: &[Round],
    participant: &Participant,
    max_tokens: usize,
) -> AssembledContext {
    let system = ChatMessage::new(Role::System, participant.system_prompt.clone());

    // Sliding window over prior rounds.
    let window = config.context_window_rounds as usize;
    let start = rounds.len().saturating_sub(window);
    let mut transcript: Vec<String> = rounds[start..]
        .iter()
        .flat_map(|round| round.responses.iter())
        .map(|response| format!("{}: {}", response.participant_name, response.content))
        .collect();

    let mut messages = vec![
        system.clone(),
        ChatMessage::new(Role::User, render_user_prompt(config, participant, &transcript)),
    ];
    let mut input_tokens = tokens::count_message_tokens(&messages, &participant.model);

    // Drop transcript lines from the oldest end until the budget holds. The
    // system message and the user-prompt skeleton are never dropped.
    while input_tokens > max_tokens && !transcript.is_empty() {
        transcript.remove(0);
        messages = vec![
            system.clone(),
            ChatMessage::new(Role::User, render_user_prompt(config, participant, &transcript)),
        ];
        input_tokens = tokens::count_message_tokens(&messages, &participant.model);
    }

    if input_tokens > max_tokens {
        warn!(
            "Context for {} still at {} tokens after dropping full transcript (budget {})",
            participant.name, input_tokens, max_tokens
        );
    }

    debug!(
        "Built context for {}: {} messages, {} transcript lines, {} tokens",
        participant.name,
        messages.len(),
        transcript.len(),
        input_tokens
    );

    AssembledContext {
        messages,
        input_tokens,
    }
}

fn render_user_prompt(
    config: &DebateConfig,
    participant: &Participant,
    transcript: &[String],
) -> String {
    let mut lines = vec![
        format!("Topic: {}", config.topic),
        String::new(),
        format!("You are {}. Provide your next debate response.", participant.name),
        "Be concise, reference earlier arguments when helpful, and continue the conversation naturally."
            .to_string(),
        String::new(),
        "IMPORTANT: Do NOT prefix your response with your name or 'Agent X:'. Your response should start directly with your argument."
            .to_string(),
    ];

    if !transcript.is_empty() {
        lines.push(String::new());
        lines.push("Transcript so far:".to_string());
        lines.extend(transcript.iter().cloned());
        lines.push(String::new());
        lines.push("Consider the transcript above when crafting your response.".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::Response;
    use chrono::Utc;

    fn participant(name: &str) -> Participant {
        Participant {
            name: name.to_string(),
            model: "gpt-4o".to_string(),
            system_prompt: format!("You argue as {name}."),
            temperature: 0.7,
        }
    }

    fn config() -> DebateConfig {
        DebateConfig {
            topic: "Tabs or spaces".to_string(),
            participants: vec![participant("A"), participant("B")],
            max_rounds: 3,
            context_window_rounds: 10,
            cost_warning_threshold: 1.0,
        }
    }

    fn round_with(round_number: u32, entries: &[(&str, &str)]) -> Round {
        let mut round = Round::new(round_number);
        for (index, (name, content)) in entries.iter().enumerate() {
            round.responses.push(Response {
                participant_name: name.to_string(),
                participant_index: index,
                model: "gpt-4o".to_string(),
                content: content.to_string(),
                tokens_used: 10,
                response_time_ms: 5.0,
                timestamp: Utc::now(),
            });
        }
        round
    }

    #[test]
    fn empty_rounds_produce_prompt_without_transcript() {
        let cfg = config();
        let ctx = build_context(&cfg, &[Round::new(1)], &cfg.participants[0]);

        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[0].role, Role::System);
        assert_eq!(ctx.messages[1].role, Role::User);
        assert!(ctx.messages[1].content.contains("Topic: Tabs or spaces"));
        assert!(!ctx.messages[1].content.contains("Transcript so far:"));
        assert!(ctx.input_tokens > 0);
    }

    #[test]
    fn transcript_lines_render_name_prefixed() {
        let cfg = config();
        let rounds = vec![round_with(1, &[("A", "Tabs."), ("B", "Spaces.")])];
        let ctx = build_context(&cfg, &rounds, &cfg.participants[0]);

        let user = &ctx.messages[1].content;
        assert!(user.contains("Transcript so far:"));
        assert!(user.contains("A: Tabs."));
        assert!(user.contains("B: Spaces."));
    }

    #[test]
    fn sliding_window_drops_old_rounds() {
        let mut cfg = config();
        cfg.context_window_rounds = 3;
        let rounds: Vec<Round> = (1..=5)
            .map(|n| round_with(n, &[("A", &format!("round {n} a")), ("B", &format!("round {n} b"))]))
            .collect();

        let ctx = build_context(&cfg, &rounds, &cfg.participants[0]);
        let user = &ctx.messages[1].content;
        assert!(!user.contains("round 1 a"));
        assert!(!user.contains("round 2 a"));
        assert!(user.contains("round 3 a"));
        assert!(user.contains("round 5 b"));
    }

    #[test]
    fn truncation_respects_budget_and_keeps_skeleton() {
        let cfg = config();
        let long = "word ".repeat(200);
        let rounds = vec![round_with(1, &[("A", &long), ("B", &long), ("A", &long)])];

        let ctx = build_context_with_budget(&cfg, &rounds, &cfg.participants[1], 200);

        assert!(ctx.input_tokens <= 200, "got {} tokens", ctx.input_tokens);
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[0].role, Role::System);
        assert!(ctx.messages[1].content.contains("Topic: Tabs or spaces"));
    }

    #[test]
    fn truncation_drops_oldest_lines_first() {
        let cfg = config();
        let filler = "filler ".repeat(120);
        let rounds = vec![round_with(
            1,
            &[("A", &filler), ("B", "newest short line")],
        )];

        // Budget fits the skeleton plus roughly one short line.
        let ctx = build_context_with_budget(&cfg, &rounds, &cfg.participants[0], 150);
        let user = &ctx.messages[1].content;
        assert!(!user.contains("filler"));
        assert!(user.contains("newest short line"));
    }
}
