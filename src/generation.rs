//! Client for a local Ollama server's `/api/generate` endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;

/// Shown to chat users whenever generation fails.
pub const UNAVAILABLE_MESSAGE: &str =
    "Error: Could not generate response. Make sure Ollama is running with 'ollama run gemma3:1b'.";

pub const EMPTY_RESPONSE_MESSAGE: &str = "The model returned an empty response. Please try again.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("generation endpoint returned HTTP {status}")]
    Status { status: reqwest::StatusCode },

    #[error("could not decode generation response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("generation response has no `response` field")]
    MissingResponse,
}

impl GenerationError {
    /// Human-readable remediation text for the chat surface.
    pub fn user_message(&self) -> &'static str {
        UNAVAILABLE_MESSAGE
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl From<&GenerationConfig> for GenerationOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

/// Ollama reads `num_predict`; `max_tokens` is sent as well for servers
/// that expect the OpenAI-style name.
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    max_tokens: u32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Generator {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl Generator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            url: format!("{}/api/generate", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one non-streaming completion request.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                max_tokens: options.max_tokens,
                num_predict: options.max_tokens,
            },
        };

        let started = std::time::Instant::now();
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|source| GenerationError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status { status });
        }

        let body: OllamaResponse = response.json().await.map_err(GenerationError::Decode)?;
        let text = body.response.ok_or(GenerationError::MissingResponse)?;

        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            response_chars = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation complete"
        );
        Ok(text)
    }
}
