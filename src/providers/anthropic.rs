//! Anthropic provider (Messages API)
//!
//! The Claude family is served through the non-streaming path: streaming for
//! this family proved unreliable behind the aggregation layer the project
//! started from, so `supports_streaming` is false and the orchestrator
//! relays the completion as a single chunk.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{ChatProvider, ChatRequest, Role, DEFAULT_TIMEOUT_SECS};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
}

impl AnthropicProvider {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Option<Vec<AnthropicContent>>,
    error: Option<AnthropicError>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicError {
    message: String,
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "Anthropic"
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        // The Messages API takes the system prompt out-of-band and requires
        // the conversation itself to alternate user/assistant turns.
        let mut system: Option<String> = None;
        let mut messages = vec![];

        for message in &request.messages {
            match message.role {
                Role::System => {
                    system = Some(match system.take() {
                        Some(existing) => format!("{existing}\n\n{}", message.content),
                        None => message.content.clone(),
                    });
                }
                role => {
                    messages.push(AnthropicMessage {
                        role: role.as_str().to_string(),
                        content: message.content.clone(),
                    });
                }
            }
        }

        let api_request = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages,
            temperature: request.temperature,
            system,
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&api_request)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error: {} - {}", status, body);
        }

        let api_response: AnthropicResponse = response.json().await?;

        if let Some(error) = api_response.error {
            anyhow::bail!("Anthropic error: {}", error.message);
        }

        // Concatenate text blocks, skipping anything else.
        Ok(api_response
            .content
            .map(|contents| {
                contents
                    .into_iter()
                    .filter(|c| c.content_type.as_deref() == Some("text"))
                    .filter_map(|c| c.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }

    async fn stream(&self, request: &ChatRequest, tx: mpsc::Sender<String>) -> Result<String> {
        // Non-streaming family: complete and relay the text as one delta.
        let text = self.complete(request).await?;
        if !text.is_empty() {
            let _ = tx.send(text.clone()).await;
        }
        Ok(text)
    }
}
