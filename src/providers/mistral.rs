//! Mistral provider (OpenAI-compatible chat completions endpoint)

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::openai::parse_openai_sse;
use super::{ChatProvider, ChatRequest, DEFAULT_TIMEOUT_SECS};

const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";

pub struct MistralProvider {
    client: Client,
    api_key: String,
}

impl MistralProvider {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("MISTRAL_API_KEY")
            .map_err(|_| anyhow::anyhow!("MISTRAL_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> MistralRequest {
        MistralRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| MistralMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            stream: stream.then_some(true),
        }
    }
}

#[derive(Serialize)]
struct MistralRequest {
    model: String,
    messages: Vec<MistralMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
struct MistralMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MistralResponse {
    choices: Option<Vec<MistralChoice>>,
}

#[derive(Deserialize)]
struct MistralChoice {
    message: MistralMessageResponse,
}

#[derive(Deserialize)]
struct MistralMessageResponse {
    content: Option<String>,
}

#[async_trait]
impl ChatProvider for MistralProvider {
    fn name(&self) -> &'static str {
        "Mistral"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let api_request = self.build_request(request, false);

        let response = self
            .client
            .post(MISTRAL_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&api_request)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mistral API error: {} - {}", status, body);
        }

        let api_response: MistralResponse = response.json().await?;

        Ok(api_response
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn stream(&self, request: &ChatRequest, tx: mpsc::Sender<String>) -> Result<String> {
        let api_request = self.build_request(request, true);

        let response = self
            .client
            .post(MISTRAL_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&api_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mistral API error: {} - {}", status, body);
        }

        // Mistral streams the same chunk format as OpenAI.
        parse_openai_sse(response, tx).await
    }
}
