//! Chat Providers - LLM provider implementations
//!
//! Each provider family lives in its own module. The orchestrator never
//! inspects model strings itself; it asks the [`ProviderRegistry`] for the
//! bundle that serves a model's family.

mod anthropic;
mod gemini;
mod mistral;
mod openai;

pub mod embeddings;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use mistral::MistralProvider;
pub use openai::OpenAiProvider;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Core Types
// ============================================================================

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat message handed to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request to a chat provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Opaque model identifier understood by the provider family.
    pub model: String,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature,
        }
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Core chat provider capability.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging/identification.
    fn name(&self) -> &'static str;

    /// Whether the orchestrator should use the streaming path for this
    /// family. When false, callers invoke [`ChatProvider::complete`] and
    /// relay the result as a single chunk.
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Non-streaming completion (blocks until the full text is available).
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Stream deltas into `tx`, returning the accumulated text when the
    /// stream finishes.
    async fn stream(&self, request: &ChatRequest, tx: mpsc::Sender<String>) -> Result<String>;
}

// ============================================================================
// Model Families
// ============================================================================

/// Provider family a model identifier belongs to. Classification happens
/// once, at registry lookup; nothing downstream sniffs model strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    OpenAi,
    Anthropic,
    Google,
    Mistral,
}

impl ModelFamily {
    pub fn classify(model: &str) -> ModelFamily {
        let lower = model.to_lowercase();
        if lower.contains("claude") || lower.contains("anthropic") {
            ModelFamily::Anthropic
        } else if lower.contains("gemini") || lower.contains("google") {
            ModelFamily::Google
        } else if lower.contains("mistral") {
            ModelFamily::Mistral
        } else {
            // gpt-*, o-series, and anything unrecognised go through the
            // OpenAI-compatible endpoint.
            ModelFamily::OpenAi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::OpenAi => "openai",
            ModelFamily::Anthropic => "anthropic",
            ModelFamily::Google => "google",
            ModelFamily::Mistral => "mistral",
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Maps model families to configured providers.
pub struct ProviderRegistry {
    providers: HashMap<ModelFamily, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    /// Build the registry from environment API keys. Families without a key
    /// are simply absent; requesting a turn with one is a provider failure.
    pub fn from_env() -> Self {
        let mut providers: HashMap<ModelFamily, Arc<dyn ChatProvider>> = HashMap::new();

        if let Ok(openai) = OpenAiProvider::from_env() {
            providers.insert(ModelFamily::OpenAi, Arc::new(openai));
        }
        if let Ok(anthropic) = AnthropicProvider::from_env() {
            providers.insert(ModelFamily::Anthropic, Arc::new(anthropic));
        }
        if let Ok(gemini) = GeminiProvider::from_env() {
            providers.insert(ModelFamily::Google, Arc::new(gemini));
        }
        if let Ok(mistral) = MistralProvider::from_env() {
            providers.insert(ModelFamily::Mistral, Arc::new(mistral));
        }

        Self { providers }
    }

    /// Registry with explicit providers (used by tests and embedding setups).
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, family: ModelFamily, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(family, provider);
    }

    /// Resolve the provider bundle for a model identifier.
    pub fn provider_for(&self, model: &str) -> Result<Arc<dyn ChatProvider>> {
        let family = ModelFamily::classify(model);
        self.providers
            .get(&family)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No {} provider configured for model {model}", family.as_str()))
    }

    pub fn available_families(&self) -> Vec<ModelFamily> {
        self.providers.keys().copied().collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_model_families() {
        assert_eq!(ModelFamily::classify("gpt-4o"), ModelFamily::OpenAi);
        assert_eq!(
            ModelFamily::classify("claude-3-5-sonnet-20241022"),
            ModelFamily::Anthropic
        );
        assert_eq!(ModelFamily::classify("gemini-1.5-pro"), ModelFamily::Google);
        assert_eq!(
            ModelFamily::classify("mistral-large-latest"),
            ModelFamily::Mistral
        );
        // Unknown models fall through to the OpenAI-compatible endpoint.
        assert_eq!(ModelFamily::classify("some-new-model"), ModelFamily::OpenAi);
    }

    #[test]
    fn missing_family_is_an_error() {
        let registry = ProviderRegistry::new();
        assert!(registry.provider_for("gpt-4o").is_err());
    }
}
