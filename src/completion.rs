//! Completion provider implementations.
//!
//! - **[`DisabledCompletion`]**: returns errors; used when no model is configured.
//! - **[`ChatCompletionProvider`]**: OpenAI-compatible `/chat/completions`.
//!   The `groq` preset points it at Groq and reads `GROQ_API_KEY`.
//! - **[`OllamaCompletion`]**: a local Ollama instance's `/api/generate`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use docgate_core::completion::{CompletionOptions, CompletionProvider};
use std::sync::Arc;

use crate::config::CompletionConfig;
use crate::http::{self, join_url};

const OPENAI_URL: &str = "https://api.openai.com/v1";
const GROQ_URL: &str = "https://api.groq.com/openai/v1";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Instantiate the provider named by `config.provider`.
pub fn create_provider(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "openai" => Ok(Arc::new(ChatCompletionProvider::new(
            config,
            OPENAI_URL,
            "OPENAI_API_KEY",
        )?)),
        "groq" => Ok(Arc::new(ChatCompletionProvider::new(
            config,
            GROQ_URL,
            "GROQ_API_KEY",
        )?)),
        "ollama" => Ok(Arc::new(OllamaCompletion::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

pub struct DisabledCompletion;

#[async_trait]
impl CompletionProvider for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String> {
        Err(docgate_core::retry::permanent(anyhow::anyhow!(
            "Completion provider is disabled"
        )))
    }
}

/// Chat model behind an OpenAI-compatible API.
pub struct ChatCompletionProvider {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
}

impl ChatCompletionProvider {
    pub fn new(config: &CompletionConfig, default_url: &str, default_key_env: &str) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for chat provider"))?;
        let api_key = http::api_key(config.api_key_env.as_deref().unwrap_or(default_key_env))?;

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model,
            url: join_url(
                config.url.as_deref().unwrap_or(default_url),
                "chat/completions",
            ),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": options.temperature,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        let json =
            http::post_json(&self.client, "Completion", &self.url, Some(&self.api_key), &body)
                .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices[0].message.content"))
}

/// Text generation through a local Ollama instance.
pub struct OllamaCompletion {
    client: reqwest::Client,
    model: String,
    url: String,
}

impl OllamaCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for Ollama provider"))?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model,
            url: join_url(config.url.as_deref().unwrap_or(OLLAMA_URL), "api/generate"),
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let mut opts = serde_json::json!({ "temperature": options.temperature });
        if let Some(max_tokens) = options.max_tokens {
            opts["num_predict"] = serde_json::json!(max_tokens);
        }
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": opts,
        });
        let json = http::post_json(&self.client, "Ollama", &self.url, None, &body).await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response"))
    }
}
