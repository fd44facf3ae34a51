use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Settings;
use crate::error::PipelineError;

const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Text-completion service boundary. The pipeline treats it as a black box:
/// prompt in, text out, transient failures possible.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32)
        -> Result<String>;
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.llm_base_url.clone(),
            model: settings.llm_model.clone(),
            api_key: settings.llm_api_key.clone(),
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Single non-streaming chat completion attempt.
    async fn chat(
        &self,
        messages: &[Message],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("completion request failed")?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("failed to read completion response")?;
        if !status.is_success() {
            return Err(anyhow!("completion service returned {}: {}", status, text));
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).context("failed to parse completion JSON")?;

        // choices[0].message.content may be null on refusals
        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .to_string();

        Ok(content)
    }
}

#[async_trait]
impl Completion for LlmClient {
    /// Completion with bounded retry. Empty content counts as a failed
    /// attempt; exhausted retries surface as a transient error so the caller
    /// moves on to the next record instead of stalling the loop.
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let messages = vec![Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];

        let mut last_err = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.chat(&messages, max_tokens, temperature).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => {
                    warn!(attempt, "completion returned empty content");
                    last_err = "empty completion content".to_string();
                }
                Err(e) => {
                    warn!(attempt, error = %e, "completion attempt failed");
                    last_err = e.to_string();
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(attempt as u64 * 2)).await;
            }
        }

        Err(PipelineError::Transient(last_err).into())
    }
}
