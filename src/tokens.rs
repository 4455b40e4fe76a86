// src/tokens.rs
// Token counting and cost accounting shared by the orchestrator and the
// quality pipeline.

use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};
use tracing::warn;

use crate::providers::ChatMessage;

/// Per-message framing overhead applied by chat templates.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;
/// Trailing assistant primer tokens.
const REPLY_PRIMER_TOKENS: usize = 2;

// Encoders are expensive to construct; build each once and share.
static CL100K: Lazy<Option<CoreBPE>> = Lazy::new(|| cl100k_base().ok());
static O200K: Lazy<Option<CoreBPE>> = Lazy::new(|| o200k_base().ok());

/// Pricing per 1M tokens in USD: (input, output).
const PRICING: &[(&str, f64, f64)] = &[
    // OpenAI
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-4", 30.00, 60.00),
    ("gpt-3.5-turbo", 0.50, 1.50),
    // Anthropic
    ("claude-3-5-sonnet-20241022", 3.00, 15.00),
    ("claude-3-5-haiku-20241022", 0.80, 4.00),
    ("claude-3-opus-20240229", 15.00, 75.00),
    ("claude-3-sonnet-20240229", 3.00, 15.00),
    ("claude-3-haiku-20240307", 0.25, 1.25),
    // Google
    ("gemini-1.5-pro", 1.25, 5.00),
    ("gemini-1.5-flash", 0.075, 0.30),
    ("gemini-pro", 0.50, 1.50),
    // Mistral
    ("mistral-large-latest", 2.00, 6.00),
    ("mistral-medium-latest", 2.70, 8.10),
    ("mistral-small-latest", 0.20, 0.60),
    ("open-mistral-7b", 0.25, 0.25),
];

/// Model whose pricing is used when the table has no entry.
const FALLBACK_PRICING_MODEL: &str = "gpt-4o";

/// Cost warning tier relative to the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostWarningLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

fn encoder_for(model: &str) -> Option<&'static CoreBPE> {
    // gpt-4o and the o-series use the o200k vocabulary; everything else in
    // the table (including Claude and Gemini approximations) counts with
    // cl100k, matching the upstream tokenizer conventions.
    let lower = model.to_lowercase();
    if lower.contains("gpt-4o") || lower.starts_with("o1") || lower.starts_with("o3") {
        O200K.as_ref().or(CL100K.as_ref())
    } else {
        CL100K.as_ref()
    }
}

/// Count tokens in `text` for `model`.
///
/// Never panics: if no encoder can be acquired the count falls back to
/// `ceil(len/4)` and callers treat that estimate as authoritative.
pub fn count_tokens(text: &str, model: &str) -> usize {
    match encoder_for(model) {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.len().div_ceil(4),
    }
}

/// Count tokens for a message sequence, including the fixed chat-template
/// framing overhead per message and the trailing reply primer.
pub fn count_message_tokens(messages: &[ChatMessage], model: &str) -> usize {
    let mut total = 0;
    for message in messages {
        total += MESSAGE_OVERHEAD_TOKENS;
        total += count_tokens(&message.content, model);
    }
    total + REPLY_PRIMER_TOKENS
}

/// Estimate the USD cost of a call from input/output token counts.
pub fn estimate_cost(input_tokens: usize, output_tokens: usize, model: &str) -> f64 {
    let (input_price, output_price) = pricing_for(model);
    (input_tokens as f64 / 1_000_000.0) * input_price
        + (output_tokens as f64 / 1_000_000.0) * output_price
}

fn pricing_for(model: &str) -> (f64, f64) {
    if let Some((_, input, output)) = PRICING.iter().find(|(name, _, _)| *name == model) {
        return (*input, *output);
    }
    warn!("No pricing entry for model {model}, falling back to {FALLBACK_PRICING_MODEL}");
    PRICING
        .iter()
        .find(|(name, _, _)| *name == FALLBACK_PRICING_MODEL)
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or((2.50, 10.00))
}

/// Map accumulated cost against the warning threshold to a tier.
pub fn cost_warning_level(cost: f64, threshold: f64) -> CostWarningLevel {
    if threshold <= 0.0 {
        return CostWarningLevel::None;
    }
    let ratio = cost / threshold;
    if ratio >= 1.5 {
        CostWarningLevel::Critical
    } else if ratio >= 1.0 {
        CostWarningLevel::High
    } else if ratio >= 0.75 {
        CostWarningLevel::Medium
    } else if ratio >= 0.5 {
        CostWarningLevel::Low
    } else {
        CostWarningLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, Role};

    #[test]
    fn counts_are_monotonic_under_concatenation() {
        let a = "The quick brown fox";
        let b = " jumps over the lazy dog";
        let combined = format!("{a}{b}");
        assert!(count_tokens(&combined, "gpt-4o") >= count_tokens(a, "gpt-4o"));
        assert!(count_tokens(&combined, "claude-3-haiku-20240307") >= count_tokens(a, "claude-3-haiku-20240307"));
    }

    #[test]
    fn empty_text_counts_zero() {
        assert_eq!(count_tokens("", "gpt-4o"), 0);
    }

    #[test]
    fn message_counting_adds_framing_overhead() {
        let messages = vec![
            ChatMessage::new(Role::System, "You are terse."),
            ChatMessage::new(Role::User, "Say hi."),
        ];
        let content_only: usize = messages
            .iter()
            .map(|m| count_tokens(&m.content, "gpt-4o"))
            .sum();
        let framed = count_message_tokens(&messages, "gpt-4o");
        assert_eq!(framed, content_only + 2 * 4 + 2);
    }

    #[test]
    fn known_model_pricing() {
        // 1M input + 1M output of gpt-4o-mini is $0.15 + $0.60.
        let cost = estimate_cost(1_000_000, 1_000_000, "gpt-4o-mini");
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_uses_flagship_pricing() {
        let unknown = estimate_cost(1_000_000, 0, "some-new-model");
        let flagship = estimate_cost(1_000_000, 0, "gpt-4o");
        assert!((unknown - flagship).abs() < 1e-9);
    }

    #[test]
    fn warning_tiers_at_boundaries() {
        let threshold = 1.0;
        assert_eq!(cost_warning_level(0.40, threshold), CostWarningLevel::None);
        assert_eq!(cost_warning_level(0.60, threshold), CostWarningLevel::Low);
        assert_eq!(cost_warning_level(0.80, threshold), CostWarningLevel::Medium);
        assert_eq!(cost_warning_level(1.10, threshold), CostWarningLevel::High);
        assert_eq!(cost_warning_level(1.60, threshold), CostWarningLevel::Critical);
    }

    #[test]
    fn zero_threshold_disables_warnings() {
        assert_eq!(cost_warning_level(5.0, 0.0), CostWarningLevel::None);
    }
}
