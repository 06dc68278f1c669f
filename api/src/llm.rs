//! Text-generation collaborator: an OpenAI-compatible chat-completions client.
//!
//! Only the rebalance conflict-resolution path talks to this service. Failures
//! and timeouts are caught at the call site and degrade to the deterministic
//! reduced-load fallback — they are never surfaced to the end user.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

const BASE_URL_ENV: &str = "PACER_LLM_BASE_URL";
const API_KEY_ENV: &str = "PACER_LLM_API_KEY";
const MODEL_ENV: &str = "PACER_LLM_MODEL";
const TIMEOUT_ENV: &str = "PACER_LLM_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text-generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("text-generation service returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("text-generation response contained no content")]
    EmptyResponse,
}

/// Seam for the text-generation service, so callers can be exercised with a
/// stub in tests.
pub trait Generate {
    fn generate(
        &self,
        system: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

/// Chat-completions request (OpenAI-compatible wire format).
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions endpoint, configured from
/// the environment (`PACER_LLM_BASE_URL`, `PACER_LLM_API_KEY`,
/// `PACER_LLM_MODEL`, `PACER_LLM_TIMEOUT_SECS`).
#[derive(Clone)]
pub struct GenerationClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GenerationClient {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!(
                "{} is not set; rebalance will always use the deterministic fallback",
                API_KEY_ENV
            );
        }
        let model = std::env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_secs = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }
}

impl Generate for GenerationClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(0.3),
            max_tokens: Some(120),
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::Status(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}
