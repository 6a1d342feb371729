//! Completion provider abstraction.
//!
//! A [`CompletionProvider`] turns a prompt into text. Implementations make a
//! single attempt per call; retries, backoff and the per-attempt timeout are
//! applied by [`complete_with_retry`] from the [`CompletionOptions`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::retry::{with_retry, RetryPolicy};

/// Per-call generation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Bound on a single attempt.
    pub timeout: Option<Duration>,
    pub max_retries: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
            timeout: Some(Duration::from_secs(60)),
            max_retries: 2,
        }
    }
}

impl CompletionOptions {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.timeout)
    }
}

/// Trait for text completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// The model identifier, used in logs and errors.
    fn model_name(&self) -> &str;

    /// Complete `prompt` in a single attempt.
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}

/// Call `provider` under the retry policy derived from `options`.
pub async fn complete_with_retry(
    provider: &dyn CompletionProvider,
    prompt: &str,
    options: &CompletionOptions,
) -> crate::Result<String> {
    with_retry(&options.retry_policy(), provider.model_name(), || {
        provider.complete(prompt, options)
    })
    .await
}

/// Remove `<think>...</think>` reasoning blocks emitted by some models.
///
/// An unterminated block swallows the rest of the text.
pub fn strip_think(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("<think>") {
        out.push_str(&rest[..open]);
        match rest[open..].find("</think>") {
            Some(close) => rest = &rest[open + close + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}
